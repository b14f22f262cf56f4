//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics and domain counters.
//!
//! Request tracing is `tower_http::trace::TraceLayer`, mounted in
//! [`crate::app`].

pub mod metrics;
