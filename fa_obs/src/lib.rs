//! ABOUTME: Observability services including health checks and metrics
//! ABOUTME: Provides monitoring endpoints for operational visibility

use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    middleware::Logger,
    web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use fa_core::Result;
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, gauge::Gauge, histogram::Histogram},
    registry::Registry,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

/// Readiness gate that can be toggled to indicate service readiness
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    ready: Arc<AtomicBool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics registry for Prometheus
#[derive(Debug)]
pub struct Metrics {
    registry: Arc<Mutex<Registry>>,
    jobs_accepted_total: Counter,
    active_jobs: Gauge,
    job_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let jobs_accepted_total = Counter::default();
        registry.register(
            "jobs_accepted_total",
            "Total number of download jobs accepted",
            jobs_accepted_total.clone(),
        );

        let active_jobs = Gauge::default();
        registry.register(
            "active_jobs",
            "Download jobs currently queued or processing",
            active_jobs.clone(),
        );

        let job_duration_seconds =
            Histogram::new([1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0].into_iter());
        registry.register(
            "job_duration_seconds",
            "Download job duration in seconds",
            job_duration_seconds.clone(),
        );

        Self {
            registry: Arc::new(Mutex::new(registry)),
            jobs_accepted_total,
            active_jobs,
            job_duration_seconds,
        }
    }

    pub fn inc_jobs_accepted(&self) {
        self.jobs_accepted_total.inc();
    }

    pub fn set_active_jobs(&self, count: i64) {
        self.active_jobs.set(count);
    }

    pub fn observe_job_duration(&self, duration: f64) {
        self.job_duration_seconds.observe(duration);
    }

    pub fn encode(&self) -> Result<String> {
        let registry = self.registry.lock().map_err(|e| {
            fa_core::Error::Config(format!("Failed to lock metrics registry: {}", e))
        })?;

        let mut buffer = String::new();
        encode(&mut buffer, &registry)
            .map_err(|e| fa_core::Error::Config(format!("Failed to encode metrics: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state for observability endpoints
#[derive(Debug, Clone)]
pub struct ObsState {
    pub readiness: ReadinessGate,
    pub metrics: Arc<Metrics>,
}

impl ObsState {
    pub fn new() -> Self {
        Self {
            readiness: ReadinessGate::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

impl Default for ObsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health endpoint handler
async fn health() -> ActixResult<HttpResponse> {
    tracing::debug!("Health check requested");
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}

/// Readiness endpoint handler
async fn readiness(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    let is_ready = state.readiness.is_ready();
    tracing::debug!("Readiness check requested, ready: {}", is_ready);

    if is_ready {
        Ok(HttpResponse::Ok().json(json!({
            "status": "ready"
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "not ready"
        })))
    }
}

/// Metrics endpoint handler
async fn metrics(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    tracing::debug!("Metrics scrape requested");

    match state.metrics.encode() {
        Ok(metrics_text) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(metrics_text)),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to encode metrics"
            })))
        }
    }
}

/// Create observability service factory
pub fn create_service(
    state: ObsState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .wrap(Logger::default())
        .service(
            web::scope("")
                .route("/healthz", web::get().to(health))
                .route("/readyz", web::get().to(readiness))
                .route("/metrics", web::get().to(metrics)),
        )
}

/// Start observability server
pub async fn start_server(bind_addr: &str, state: ObsState) -> Result<()> {
    tracing::info!("Starting observability server on {}", bind_addr);

    HttpServer::new(move || create_service(state.clone()))
        .bind(bind_addr)
        .map_err(|e| fa_core::Error::Config(format!("Failed to bind server: {}", e)))?
        .run()
        .await
        .map_err(|e| fa_core::Error::Config(format!("Server error: {}", e)))?;

    Ok(())
}
