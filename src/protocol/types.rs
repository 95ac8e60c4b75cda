//! Memcached ASCII Protocol Response Types
//!
//! This module defines the response side of the memcached text protocol:
//! the [`Item`] value unit and the [`Response`] sum type with a single
//! serialization routine.
//!
//! ## Wire Format
//!
//! Every response token is line-oriented and terminated with CRLF:
//!
//! - Stored: `STORED\r\n`
//! - Deleted: `DELETED\r\n`
//! - Not found: `NOT_FOUND\r\n`
//! - End of retrieval: `END\r\n`
//! - Generic error: `ERROR\r\n`
//! - Server error: `SERVER_ERROR\r\n`
//! - Client error: `CLIENT_ERROR <reason>\r\n`
//! - Version: `VERSION <version>\r\n`
//! - Value: `VALUE <key> <flags> <bytes>\r\n<data>\r\n`
//! - Stats: `STAT <name> <value>\r\n` repeated, then `END\r\n`
//!
//! A retrieval hit is a `VALUE` block followed by `END`; a miss is `END`
//! alone. The dispatcher emits the trailing `END` itself, so serializing
//! an [`Item`] produces only the `VALUE` block.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

/// The CRLF terminator used throughout the protocol.
pub const CRLF: &[u8] = b"\r\n";

/// Expiration values up to this many seconds (30 days) are relative
/// offsets from the current time; larger values are absolute epoch
/// seconds.
pub const RELATIVE_EXPIRY_CUTOFF: i64 = 60 * 60 * 24 * 30;

/// A single memcached value unit.
///
/// Items are ephemeral: one is built per request and dropped after its
/// response is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Item {
    /// Client-visible key, echoed verbatim in the `VALUE` header.
    pub key: String,
    /// Opaque 32-bit number stored with the item and echoed on retrieval.
    pub flags: u32,
    /// Absolute expiration in epoch seconds; `0` means no expiration.
    pub expires: i64,
    /// Raw value bytes.
    pub value: Bytes,
}

impl Item {
    /// Creates an item with no flags and no expiration.
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Normalizes a client-supplied `exptime` into the stored absolute
    /// expiration. `0` stays `0`; values up to 30 days are offsets from
    /// now; anything larger is already an epoch timestamp.
    pub fn set_expires(&mut self, exptime: i64) {
        if exptime == 0 {
            self.expires = 0;
        } else if exptime <= RELATIVE_EXPIRY_CUTOFF {
            self.expires = unix_now() + exptime;
        } else {
            self.expires = exptime;
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A protocol response unit.
///
/// One command may produce several units (a retrieval hit is an `Item`
/// followed by `End`); the connection layer serializes them back to back
/// into a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A retrieval hit: `VALUE` header plus payload.
    Item(Item),
    /// `STORED\r\n`
    Stored,
    /// `DELETED\r\n`
    Deleted,
    /// `NOT_FOUND\r\n`
    NotFound,
    /// `END\r\n`
    End,
    /// `ERROR\r\n`
    Error,
    /// `SERVER_ERROR\r\n`
    ServerError,
    /// `CLIENT_ERROR <reason>\r\n`
    ClientError(String),
    /// `VERSION <version>\r\n`
    Version(String),
    /// One `STAT <name> <value>\r\n` line per entry, then `END\r\n`.
    Stats(Vec<(&'static str, String)>),
}

impl Response {
    /// Serializes the response into `buf` in wire format.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Item(item) => {
                buf.extend_from_slice(
                    format!("VALUE {} {} {}\r\n", item.key, item.flags, item.value.len())
                        .as_bytes(),
                );
                buf.extend_from_slice(&item.value);
                buf.extend_from_slice(CRLF);
            }
            Response::Stored => buf.extend_from_slice(b"STORED\r\n"),
            Response::Deleted => buf.extend_from_slice(b"DELETED\r\n"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::End => buf.extend_from_slice(b"END\r\n"),
            Response::Error => buf.extend_from_slice(b"ERROR\r\n"),
            Response::ServerError => buf.extend_from_slice(b"SERVER_ERROR\r\n"),
            Response::ClientError(reason) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                buf.extend_from_slice(reason.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Version(version) => {
                buf.extend_from_slice(b"VERSION ");
                buf.extend_from_slice(version.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Stats(entries) => {
                for (name, value) in entries {
                    buf.extend_from_slice(format!("STAT {name} {value}\r\n").as_bytes());
                }
                buf.extend_from_slice(b"END\r\n");
            }
        }
    }

    /// Serializes the response into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serialize() {
        let response = Response::Item(Item {
            key: "@@foo.k".to_string(),
            flags: 0,
            expires: 0,
            value: Bytes::from("bar"),
        });
        assert_eq!(response.to_bytes(), b"VALUE @@foo.k 0 3\r\nbar\r\n");
    }

    #[test]
    fn test_item_serialize_flags_and_binary() {
        let response = Response::Item(Item {
            key: "k".to_string(),
            flags: 42,
            expires: 0,
            value: Bytes::from(&b"a\x00b"[..]),
        });
        assert_eq!(response.to_bytes(), b"VALUE k 42 3\r\na\x00b\r\n");
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(Response::Stored.to_bytes(), b"STORED\r\n");
        assert_eq!(Response::Deleted.to_bytes(), b"DELETED\r\n");
        assert_eq!(Response::NotFound.to_bytes(), b"NOT_FOUND\r\n");
        assert_eq!(Response::End.to_bytes(), b"END\r\n");
        assert_eq!(Response::Error.to_bytes(), b"ERROR\r\n");
        assert_eq!(Response::ServerError.to_bytes(), b"SERVER_ERROR\r\n");
    }

    #[test]
    fn test_client_error_serialize() {
        let response = Response::ClientError("bad key format".to_string());
        assert_eq!(response.to_bytes(), b"CLIENT_ERROR bad key format\r\n");
    }

    #[test]
    fn test_version_serialize() {
        let response = Response::Version("0.0.0".to_string());
        assert_eq!(response.to_bytes(), b"VERSION 0.0.0\r\n");
    }

    #[test]
    fn test_stats_serialize() {
        let response = Response::Stats(vec![
            ("pid", "42".to_string()),
            ("uptime", "7".to_string()),
        ]);
        assert_eq!(
            response.to_bytes(),
            b"STAT pid 42\r\nSTAT uptime 7\r\nEND\r\n"
        );
    }

    #[test]
    fn test_empty_value_serialize() {
        let response = Response::Item(Item::new("k", ""));
        assert_eq!(response.to_bytes(), b"VALUE k 0 0\r\n\r\n");
    }

    #[test]
    fn test_set_expires_zero() {
        let mut item = Item::new("k", "v");
        item.set_expires(0);
        assert_eq!(item.expires, 0);
    }

    #[test]
    fn test_set_expires_relative() {
        let mut item = Item::new("k", "v");
        item.set_expires(60);
        let now = unix_now();
        assert!(item.expires >= now + 59 && item.expires <= now + 61);
    }

    #[test]
    fn test_set_expires_absolute() {
        let mut item = Item::new("k", "v");
        item.set_expires(RELATIVE_EXPIRY_CUTOFF + 1);
        assert_eq!(item.expires, RELATIVE_EXPIRY_CUTOFF + 1);
    }
}
