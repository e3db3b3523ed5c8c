//! HTTP transport from the Roadwatch agent to the store API
//!
//! # Usage
//!
//! ```ignore
//! use roadwatch_http::{StoreApiAdapter, StoreGateway};
//!
//! let adapter = StoreApiAdapter::new("http://localhost:8000")?;
//! if !adapter.save_data(batch).await {
//!     // delivery failed and was logged; retrying is up to the caller
//! }
//! ```

pub mod client;
pub mod error;

// Re-export main types
pub use client::{StoreApiAdapter, StoreGateway, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
