//! API middleware stack.
//!
//! Execution order (outermost first): access log, then token capture.

pub mod audit;
pub mod auth;
