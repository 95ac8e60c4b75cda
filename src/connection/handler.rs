//! Per-Connection Request Loop
//!
//! Each accepted client gets its own handler task running this loop:
//!
//! ```text
//! ACCEPTED ──▶ READ_LINE ──valid──▶ DISPATCH ──▶ WRITE_RESP ──▶ READ_LINE
//!                 │                    │
//!                 │ set data block     └── quit / EOF / io error ──▶ CLOSED
//!                 ▼
//!             READ_BLOCK ──▶ DISPATCH
//! ```
//!
//! A malformed line is answered with its error token and the loop keeps
//! going; only `quit`, EOF and transport errors end the session. The
//! handler owns both halves of the stream exclusively. Nothing else may
//! write to the connection, which is why `noreply` sets run elsewhere
//! and produce no output here.

use crate::commands::CommandHandler;
use crate::protocol::{parse_command, Command, Item, ParseError, Response, SetArgs, CRLF};
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Read buffer capacity. Sized so a typical `set` data block arrives in
/// one read.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Drives the protocol for one client connection.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    addr: SocketAddr,
    commands: CommandHandler,
    /// Reused line buffer.
    line: Vec<u8>,
}

impl ConnectionHandler {
    /// Takes ownership of the stream and records the new connection in
    /// the statistics registry.
    pub fn new(stream: TcpStream, addr: SocketAddr, commands: CommandHandler) -> Self {
        let stats = commands.stats();
        stats.total_connections.incr(1);
        stats.curr_connections.incr(1);

        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, read_half),
            writer: BufWriter::new(write_half),
            addr,
            commands,
            line: Vec::new(),
        }
    }

    /// Runs the request loop to completion and releases the connection.
    pub async fn run(mut self) -> io::Result<()> {
        info!(client = %self.addr, "client connected");

        let result = self.serve().await;
        match &result {
            Ok(()) => info!(client = %self.addr, "client disconnected"),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
        }

        self.commands.stats().curr_connections.decr(1);
        result
    }

    async fn serve(&mut self) -> io::Result<()> {
        loop {
            if !self.fill_line().await? {
                return Ok(());
            }

            match parse_command(&self.line) {
                Ok(Command::Quit) => return Ok(()),
                Ok(Command::Get { key }) => {
                    let responses = self.commands.get(&key).await;
                    self.write_responses(&responses).await?;
                }
                Ok(Command::Set(args)) => self.set(args).await?,
                Ok(Command::Delete { key }) => {
                    let responses = self.commands.delete(&key).await;
                    self.write_responses(&responses).await?;
                }
                Ok(Command::Stats) => {
                    let response = self.commands.server_stats();
                    self.write_responses(&[response]).await?;
                }
                Ok(Command::Version) => {
                    let response = self.commands.version();
                    self.write_responses(&[response]).await?;
                }
                Err(err) => {
                    warn!(client = %self.addr, error = %err, "rejected command line");
                    self.write_responses(&[error_response(err)]).await?;
                }
            }
        }
    }

    /// Reads the next request line into `self.line`, stripped of its
    /// terminator. Returns `false` when the session is over: EOF, or a
    /// bare terminator with no command on it.
    async fn fill_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line).await?;
        if n == 0 {
            return Ok(false);
        }
        while matches!(self.line.last(), Some(b'\n' | b'\r')) {
            self.line.pop();
        }
        Ok(!self.line.is_empty())
    }

    /// Reads the `set` data block and dispatches the completed item.
    /// Framing problems in the block are answered inline; the session
    /// continues as long as the transport is alive.
    async fn set(&mut self, args: SetArgs) -> io::Result<()> {
        let Some(total) = args.bytes.checked_add(CRLF.len()) else {
            return self
                .write_responses(&[Response::ClientError(
                    "data block size out of range".to_string(),
                )])
                .await;
        };

        let mut block = vec![0u8; total];
        match self.reader.read_exact(&mut block).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(client = %self.addr, declared = args.bytes, "data block ended early");
                return self
                    .write_responses(&[Response::ClientError(
                        "payload is smaller than provided payload size".to_string(),
                    )])
                    .await;
            }
            Err(e) => return Err(e),
        }

        if &block[args.bytes..] != CRLF {
            return self
                .write_responses(&[Response::ClientError(
                    "data block does not end with \\r\\n".to_string(),
                )])
                .await;
        }
        block.truncate(args.bytes);

        let mut item = Item {
            key: args.key,
            flags: args.flags,
            expires: 0,
            value: Bytes::from(block),
        };
        item.set_expires(args.exptime);

        let responses = self.commands.set(item, args.noreply).await;
        if responses.is_empty() {
            // noreply: nothing goes back on the wire.
            return Ok(());
        }
        self.write_responses(&responses).await
    }

    /// Serializes the response units back to back and flushes them as
    /// one write, completing the command.
    async fn write_responses(&mut self, responses: &[Response]) -> io::Result<()> {
        let mut buf = Vec::new();
        for response in responses {
            response.write_to(&mut buf);
        }
        self.writer.write_all(&buf).await?;
        self.writer.flush().await
    }
}

fn error_response(err: ParseError) -> Response {
    match err {
        ParseError::Unrecognized => Response::Error,
        ParseError::Client(reason) => Response::ClientError(reason),
    }
}

/// Convenience entry point: builds a [`ConnectionHandler`] and runs it,
/// swallowing the per-connection error after logging.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, commands: CommandHandler) {
    let handler = ConnectionHandler::new(stream, addr, commands);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "connection ended with error");
    }
}
