//! Memcached ASCII Protocol Implementation
//!
//! This module implements the subset of the memcached text protocol the
//! gateway speaks. All framing is line-oriented with `\r\n` terminators,
//! except `set` data blocks which are raw bytes of a declared length.
//!
//! ## Modules
//!
//! - `types`: the `Item` value unit and the `Response` sum type with its
//!   wire serialization
//! - `parser`: request-line tokenizer producing `Command` values
//!
//! ## Example
//!
//! ```
//! use sqlcache::protocol::{parse_command, Command, Response};
//!
//! let cmd = parse_command(b"get user:7").unwrap();
//! assert_eq!(cmd, Command::Get { key: "user:7".to_string() });
//!
//! let miss = Response::End;
//! assert_eq!(miss.to_bytes(), b"END\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_command, parse_set_args, Command, ParseError, ParseResult, SetArgs};
pub use types::{Item, Response, CRLF, RELATIVE_EXPIRY_CUTOFF};
