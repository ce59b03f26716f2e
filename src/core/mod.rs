//! Core components of the `numista-rs` client.
//!
//! This module contains the building blocks of the request pipeline:
//! - The main [`NumistaClient`] and its builder.
//! - The [`NumistaError`] taxonomy.
//! - Request descriptors, cache keys and the response envelope.
//! - The cache store, rate limiter and transport seams.

/// Persistent and in-memory response caches.
pub mod cache;
/// The main client (`NumistaClient`), builder, retry policy and credentials.
pub mod client;
/// Time sources used for cache expiry.
pub mod clock;
/// Plain configuration values consumed by the client builder.
pub mod config;
/// The primary error type (`NumistaError`) for the crate.
pub mod error;
/// Sliding-window admission control.
pub mod limiter;
/// The response envelope returned by every pipeline call.
pub mod models;
/// Request descriptors and cache keys.
pub mod request;
/// The HTTP transport seam.
pub mod transport;

// convenient re-exports so most code can just `use crate::core::NumistaClient`
pub use client::{NumistaClient, NumistaClientBuilder};
pub use error::NumistaError;
pub use models::ResponseEnvelope;
pub use request::{CacheKey, Method, RequestDescriptor};
