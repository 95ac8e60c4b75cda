//! # SQLCache - A Memcached Gateway for MySQL Tables
//!
//! SQLCache speaks the memcached ASCII text protocol on the front and
//! translates retrievals into parameterized row lookups on the back.
//! Any application that already embeds a memcached client can read from
//! indexed SQL tables with no client-side change, and gets connection
//! multiplexing for free.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SQLCache                            │
//! │                                                             │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────────┐       │
//! │  │ TCP Server │──>│ Connection │──>│ CommandHandler │       │
//! │  │ (Listener) │   │  Handler   │   └───────┬────────┘       │
//! │  └────────────┘   └────────────┘           │                │
//! │                                            ▼                │
//! │  ┌────────────┐   ┌──────────────────────────────────────┐  │
//! │  │  Protocol  │   │            MappingRouter             │  │
//! │  │   Parser   │   │  default ──> SELECT ... FROM t1 ...  │  │
//! │  └────────────┘   │  users   ──> SELECT ... FROM t2 ...  │  │
//! │                   └──────────────────┬───────────────────┘  │
//! │                                      ▼                      │
//! │                              MySQL connection pool          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Namespacing
//!
//! One server can front several tables. A key of the form
//! `@@users.42` routes to the mapping named `users` with sub-key `42`;
//! a plain key routes to the mapping named `default`.
//!
//! ## Supported Commands
//!
//! - `get` / `gets` / `gat` / `gats` (single key; `gat` never touches
//!   expiration, the store is read-only)
//! - `set` (accepted for client compatibility; the gateway discards the
//!   payload)
//! - `delete` (always `NOT_FOUND`)
//! - `stats`, `version`, `quit`
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parser and response serialization
//! - [`connection`]: per-client framing loop
//! - [`commands`]: dispatch plus the `Getter`/`Setter`/`Deleter` seams
//! - [`router`]: key namespacing and prepared SELECT registry
//! - [`stats`]: counters and samples behind the `stats` command
//! - [`config`]: TOML configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod router;
pub mod stats;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Deleter, Getter, NotFound, Setter};
pub use config::Config;
pub use connection::{handle_connection, ConnectionHandler};
pub use protocol::{parse_command, Command, Item, ParseError, Response, SetArgs};
pub use router::{MappingRouter, RouterError};
pub use stats::{Counter, Stats};

/// The default port the gateway listens on (same as memcached).
pub const DEFAULT_PORT: u16 = 11211;

/// Version string reported by the `version` command and the `stats`
/// `version` entry.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
