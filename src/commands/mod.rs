//! Command Dispatch Layer
//!
//! This module sits between the connection loop and the backing store.
//! Parsed commands arrive here, get executed against the configured
//! collaborators, and come back as protocol responses for the
//! connection layer to write.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Count stats  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Getter / Setter │  (router module)
//! │    / Deleter    │
//! └─────────────────┘
//! ```
//!
//! The collaborators are object-safe async traits so the dispatch layer
//! never learns what actually backs a key. In this gateway all three are
//! implemented by the mapping router; tests plug in in-memory fakes.

pub mod handler;

pub use handler::CommandHandler;

use crate::protocol::{Item, Response};
use async_trait::async_trait;

/// Error returned by [`Deleter::delete`] when the key does not exist.
/// The not-found/deleted distinction is the only one the protocol
/// observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("key not found")]
pub struct NotFound;

/// Retrieval collaborator.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Looks up `key`. `None` is a miss; any response, including a
    /// client error, counts as a hit and is written before the closing
    /// `END`.
    async fn get(&self, key: &str) -> Option<Response>;
}

/// Storage collaborator.
#[async_trait]
pub trait Setter: Send + Sync {
    /// Stores `item`. `None` means stored; a response overrides the
    /// default `STORED` acknowledgement.
    async fn set(&self, item: Item) -> Option<Response>;
}

/// Deletion collaborator.
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, key: &str) -> Result<(), NotFound>;
}
