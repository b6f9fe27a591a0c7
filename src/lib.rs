//! # hue_bridge_rs
//!
//! An async Rust client for Hue-compatible lighting bridges.
//!
//! Bridges expose a JSON REST API under `/api/{token}/...`. This crate wraps
//! that API in a [`RequestPipeline`] that retries transient failures, caches
//! reads per resource type and turns bridge error envelopes into typed
//! [`Error`]s. A [`BridgePool`] coordinates several bridges behind one shared
//! [`ResponseCache`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::str::FromStr;
//! use hue_bridge_rs::{BridgeConfig, Color, Error, LightState, RequestPipeline};
//!
//! async fn paint_desk() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = RequestPipeline::new("192.168.1.20", None, &BridgeConfig::default())?;
//!
//!     // Press the bridge's link button first.
//!     match pipeline.register("my_app", "kitchen").await {
//!         Ok(token) => println!("store this token: {}", token),
//!         Err(Error::LinkButtonPending { .. }) => return Ok(()),
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     let mut state = LightState::new();
//!     state.on(true).color(&Color::from_str("#ff8000")?);
//!     pipeline.set_light_state("1", &state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Colors**: Convert RGB or hex colors to CIE xy with [`Color`] and [`rgb_to_chromaticity`]
//! - **Retries**: Fixed delay schedules for transport failures and busy replies with [`RetryPolicy`]
//! - **Caching**: Per resource type TTLs over memory, filesystem or Redis storage with [`ResponseCache`]
//! - **Registration**: Link button pairing with [`RequestPipeline::register`]
//! - **Pools**: Health checks and broadcasts across bridges with [`BridgePool`]
//! - **History**: Bounded exchange logs for diagnostics with [`MessageHistory`]
//!
//! ## Feature Flags
//!
//! - `cache-redis`: Enable the Redis cache backend ([`CacheBackendKind::Networked`])

mod cache;
mod config;
mod envelope;
mod errors;
mod history;
mod payload;
mod pipeline;
mod pool;
mod resource;
mod retry;
pub mod runtime;
mod types;

// Re-export public API
pub use cache::{
    CacheBackend, CacheEntry, CacheStats, FilesystemBackend, MemoryBackend, ResponseCache,
};
#[cfg(feature = "cache-redis")]
pub use cache::RedisBackend;
pub use config::{BridgeConfig, CacheBackendKind, PoolConfig};
pub use envelope::{BridgeError, LINK_BUTTON_NOT_PRESSED, UNAUTHORIZED_USER};
pub use errors::{CacheError, Error};
pub use history::{HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use payload::LightState;
pub use pipeline::RequestPipeline;
pub use pool::{BridgeEndpoint, BridgePool, HealthReport, HealthStatus};
pub use reqwest::Method;
pub use resource::ResourceType;
pub use retry::{ErrorClass, RetryPolicy, classify};
pub use types::{
    Alert, Brightness, Chromaticity, Color, Effect, Mired, hex_to_chromaticity,
    rgb_to_chromaticity,
};
