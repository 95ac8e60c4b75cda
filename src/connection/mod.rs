//! Client Connection Management
//!
//! One async task per accepted client. The accept loop lives in
//! `main.rs`; it hands each stream to [`handle_connection`], which owns
//! the connection until `quit`, EOF or a transport error.
//!
//! Requests on a connection are processed strictly in order and each
//! response is flushed before the next line is read. No ordering is
//! promised across connections.

pub mod handler;

pub use handler::{handle_connection, ConnectionHandler};
