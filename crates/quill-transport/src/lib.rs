//! # Quill Transport
//!
//! Network edges of a Quill application.
//!
//! ## Features
//!
//! - `server` (default): the signed interaction endpoint ([`endpoint`])
//! - `client` (default): the REST client ([`rest::HttpClient`])
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//!   platform ──POST──▶ endpoint ──verify──▶ Dispatcher ──▶ handlers
//!      ▲                                                     │
//!      └──────────── HttpClient (command sync, deletions) ◀──┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quill_transport::{endpoint, Verifier};
//!
//! let verifier = Verifier::from_hex(&public_key)?;
//! let router = endpoint::router(dispatcher, verifier, "/interactions");
//! let listener = endpoint::bind("0.0.0.0:8080").await?;
//! endpoint::serve(listener, router, shutdown).await?;
//! ```

pub mod error;
pub mod verify;

#[cfg(feature = "server")]
pub mod endpoint;

#[cfg(feature = "client")]
pub mod rest;

pub use error::{InvalidKey, TransportError, TransportResult};
pub use verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER, Verifier};

#[cfg(feature = "client")]
pub use rest::{DEFAULT_API_BASE, HttpClient, HttpClientConfig, RetryConfig};
