//! ABOUTME: Route handler modules for the REST API
//! ABOUTME: Jobs, movie catalog proxies, video search, and public endpoints

pub mod jobs;
pub mod movies;
pub mod public;
pub mod search;
