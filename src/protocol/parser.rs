//! Memcached ASCII Protocol Request Parser
//!
//! Parses a single request line (already stripped of its CRLF
//! terminator) into a [`Command`]. Tokens are separated by ASCII spaces;
//! runs of spaces are treated as a single separator, so parsing does not
//! depend on inter-token whitespace width.
//!
//! ## Grammar
//!
//! ```text
//! get    <key>                               retrieval
//! gets   <key>                               retrieval (alias)
//! gat    <key>                               retrieval (no touch applied)
//! gats   <key>                               retrieval (alias)
//! set    <key> <flags> <exptime> <bytes> [noreply]
//! delete <key>
//! stats
//! version
//! quit
//! ```
//!
//! The `set` data block that follows the header line is read by the
//! connection layer, not here.
//!
//! Retrieval keys are everything after the verb, trimmed; a remainder
//! that still contains spaces is treated as one key, matching deployed
//! gateway behavior.

use thiserror::Error;

/// Errors produced while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The verb is unknown or the line is too short to hold one.
    #[error("unrecognized command")]
    Unrecognized,

    /// The verb parsed but its arguments are invalid. The reason is
    /// echoed to the client in a `CLIENT_ERROR` response.
    #[error("{0}")]
    Client(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `get`, `gets`, `gat` or `gats`. Expiration is never refreshed on
    /// the `gat` forms; the backing store is read-only.
    Get { key: String },
    /// `set` header; the data block follows on the wire.
    Set(SetArgs),
    /// `delete <key>`
    Delete { key: String },
    /// `stats`
    Stats,
    /// `version`
    Version,
    /// `quit`
    Quit,
}

/// Arguments of a `set` header line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetArgs {
    pub key: String,
    pub flags: u32,
    pub exptime: i64,
    /// Declared length of the data block that follows, not counting its
    /// trailing CRLF.
    pub bytes: usize,
    /// Suppresses the response; the server must not write anything.
    pub noreply: bool,
}

/// Parses one stripped request line into a [`Command`].
pub fn parse_command(line: &[u8]) -> ParseResult<Command> {
    if line.len() < 3 {
        return Err(ParseError::Unrecognized);
    }

    let line = std::str::from_utf8(line)
        .map_err(|_| ParseError::Client("command line is not valid utf-8".to_string()))?;

    let (verb, rest) = match line.split_once(' ') {
        Some((verb, rest)) => (verb, rest),
        None => (line, ""),
    };

    match verb {
        "get" | "gets" | "gat" | "gats" => Ok(Command::Get {
            key: rest.trim().to_string(),
        }),
        "set" => parse_set_args(rest).map(Command::Set),
        "delete" => Ok(Command::Delete {
            key: rest.trim().to_string(),
        }),
        "stats" => Ok(Command::Stats),
        "version" => Ok(Command::Version),
        "quit" => Ok(Command::Quit),
        _ => Err(ParseError::Unrecognized),
    }
}

/// Parses the remainder of a `set` line: exactly four tokens, or five
/// where the fifth is the literal `noreply`.
pub fn parse_set_args(arguments: &str) -> ParseResult<SetArgs> {
    let fields: Vec<&str> = arguments.split_ascii_whitespace().collect();

    let noreply = match fields.len() {
        4 => false,
        5 if fields[4] == "noreply" => true,
        5 => {
            return Err(ParseError::Client(
                "last set argument must be empty or noreply".to_string(),
            ))
        }
        _ => {
            return Err(ParseError::Client(
                "set has incorrect number of arguments".to_string(),
            ))
        }
    };

    let flags = fields[1]
        .parse()
        .map_err(|e| ParseError::Client(format!("could not parse flags: {e}")))?;
    let exptime = fields[2]
        .parse()
        .map_err(|e| ParseError::Client(format!("could not parse exptime: {e}")))?;
    let bytes = fields[3]
        .parse()
        .map_err(|e| ParseError::Client(format!("could not parse data block size: {e}")))?;

    Ok(SetArgs {
        key: fields[0].to_string(),
        flags,
        exptime,
        bytes,
        noreply,
    })
}
