//! # Quill Core
//!
//! The wire model and collaborator interfaces shared by every Quill crate.
//!
//! This crate has no opinion about how interactions are routed. It provides:
//!
//! - **Wire model**: [`Interaction`], [`InteractionData`], resolved entities,
//!   command schemas, message components and response payloads, all
//!   `serde`-compatible with the platform's JSON.
//! - **Identifiers**: [`Snowflake`] and the custom-identifier encoding used to
//!   carry invocation references ([`custom_id`]).
//! - **Collaborators**: the [`RestApi`] trait implemented by the outbound REST
//!   client and consumed by the runtime and dispatcher.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ HTTP request │────▶│ Interaction │────▶│ ResponsePayload  │
//! │   (signed)   │     │   (parsed)  │     │ {type, data?}    │
//! └──────────────┘     └─────────────┘     └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_core::{Interaction, InteractionType};
//!
//! let interaction: Interaction = serde_json::from_slice(body)?;
//! if interaction.kind == InteractionType::Ping {
//!     return Ok(ResponsePayload::pong());
//! }
//! ```

#[macro_use]
mod macros;

pub mod custom_id;
pub mod error;
pub mod id;
pub mod model;
pub mod rest;

pub use custom_id::{CustomId, REFERENCE_DELIMITER, join_custom_id, split_custom_id};
pub use error::{ModelError, ModelResult};
pub use id::Snowflake;
pub use model::*;
pub use rest::{RestApi, RestError, RestResult};
