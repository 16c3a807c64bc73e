//! ABOUTME: Error handling utilities for RFC 7807 Problem Details responses
//! ABOUTME: Maps core errors and validation failures to standardized format

use crate::models::ProblemDetails;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use validator::ValidationErrors;

/// API error wrapper for RFC 7807 Problem Details
#[derive(Debug)]
pub struct ApiError {
    pub problem: ProblemDetails,
    pub status_code: u16,
}

impl ApiError {
    pub fn new(problem: ProblemDetails) -> Self {
        let status_code = problem.status.unwrap_or(500);
        Self {
            problem,
            status_code,
        }
    }

    /// Create a validation error from validator::ValidationErrors
    pub fn validation(errors: ValidationErrors) -> Self {
        let problem = ProblemDetails::validation_error("Request validation failed").with_extension(
            "errors",
            serde_json::to_value(&errors).unwrap_or_default(),
        );
        Self::new(problem)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(ProblemDetails::validation_error(detail.into()))
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        let problem = ProblemDetails::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.5.4",
            "Not Found",
        )
        .with_status(404)
        .with_detail(detail.into());
        Self::new(problem)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        let problem = ProblemDetails::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.5.8",
            "Conflict",
        )
        .with_status(409)
        .with_detail(detail.into());
        Self::new(problem)
    }

    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        let problem = ProblemDetails::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.6.3",
            "Bad Gateway",
        )
        .with_status(502)
        .with_detail(detail.into());
        Self::new(problem)
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        let problem = ProblemDetails::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.6.4",
            "Service Unavailable",
        )
        .with_status(503)
        .with_detail(detail.into());
        Self::new(problem)
    }

    pub fn internal_server_error(detail: impl Into<String>) -> Self {
        let problem = ProblemDetails::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.6.1",
            "Internal Server Error",
        )
        .with_status(500)
        .with_detail(detail.into());
        Self::new(problem)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.problem.title,
            self.problem
                .detail
                .as_deref()
                .unwrap_or("No details available")
        )
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(self.status_code)
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/problem+json")
            .json(&self.problem)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(errors)
    }
}

impl From<fa_core::Error> for ApiError {
    fn from(error: fa_core::Error) -> Self {
        match error {
            fa_core::Error::NotFound(msg) => Self::not_found(msg),
            fa_core::Error::Validation(msg) => Self::bad_request(msg),
            fa_core::Error::Upstream(msg) => Self::bad_gateway(msg),
            fa_core::Error::Cancelled(msg) => Self::conflict(msg),
            fa_core::Error::Process(msg) => {
                Self::internal_server_error(format!("Process error: {}", msg))
            }
            fa_core::Error::Placement(msg) => {
                Self::internal_server_error(format!("Placement error: {}", msg))
            }
            fa_core::Error::Config(msg) => {
                Self::internal_server_error(format!("Configuration error: {}", msg))
            }
            fa_core::Error::Io(e) => Self::internal_server_error(format!("IO error: {}", e)),
            fa_core::Error::Storage(msg) => {
                Self::internal_server_error(format!("Storage error: {}", msg))
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
