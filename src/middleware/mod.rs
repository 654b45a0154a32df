//! Request logging middleware.

pub mod logging;

pub use logging::{request_logging, request_logging_simple};
