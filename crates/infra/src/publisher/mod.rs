//! Event publisher adapters.

pub mod http;

pub use http::{HttpPublisher, HttpPublisherConfig};
