//! HTTP-facing boundary for domcast responses.
//!
//! Request routing, authentication and transport stay with the host
//! framework. This crate only runs a named server function with its parsed
//! args and shared context, and turns whatever it returned into a reply.

#[cfg(feature = "axum")]
pub mod adapters;
pub mod handler;
pub mod reply;

#[cfg(feature = "axum")]
pub use adapters::axum::{AxumDomcastAdapter, CallBody};
pub use handler::{Handler, HandlerTable, Outcome};
pub use reply::{JSON_CONTENT_TYPE, Reply, TEXT_CONTENT_TYPE};
