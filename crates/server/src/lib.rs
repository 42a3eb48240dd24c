//! HTTP surface of the songsmith fulfillment service.

pub mod api;
pub mod metrics;
pub mod state;
