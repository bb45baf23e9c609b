//! Console Module
//!
//! The read-execute-respond loop behind the `patchkv` binary. It reads one
//! command per line from any async reader (stdin, a script file, an
//! in-memory buffer), runs it through a [`CommandHandler`] and writes the
//! reply in redis-cli style.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Console created over (reader, writer)
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  read line ─> split_line     │
//!    │      │                       │
//!    │      ▼                       │
//!    │  CommandHandler::execute     │
//!    │      │                       │
//!    │      ▼                       │
//!    │  write reply, loop back      │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. End of input or QUIT
//! ```
//!
//! Blank lines and lines starting with `#` are skipped, so scripts can be
//! commented.

use crate::commands::{split_line, CommandHandler, Reply};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

/// Counters for one console session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleStats {
    pub lines_read: u64,
    pub commands_processed: u64,
    /// Commands answered with an error reply
    pub errors: u64,
    pub bytes_written: u64,
}

/// Errors that end a console session.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Console<R, W> {
    reader: R,
    writer: W,
    handler: CommandHandler,
    stats: ConsoleStats,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, handler: CommandHandler) -> Self {
        Self {
            reader,
            writer,
            handler,
            stats: ConsoleStats::default(),
        }
    }

    /// Runs until end of input or `QUIT`, returning the session counters.
    pub async fn run(mut self) -> Result<ConsoleStats, ConsoleError> {
        info!("Console session started");

        let result = self.main_loop().await;

        if self.handler.in_multi() {
            debug!("Session ended inside MULTI, queued commands discarded");
        }
        match &result {
            Ok(()) => info!(
                commands = self.stats.commands_processed,
                errors = self.stats.errors,
                "Console session ended"
            ),
            Err(e) => warn!(error = %e, "Console session failed"),
        }
        result.map(|()| self.stats)
    }

    async fn main_loop(&mut self) -> Result<(), ConsoleError> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.reader.read_until(b'\n', &mut line).await? == 0 {
                return Ok(());
            }
            self.stats.lines_read += 1;

            let text = match std::str::from_utf8(&line) {
                Ok(text) => text.trim(),
                Err(_) => {
                    self.stats.commands_processed += 1;
                    self.stats.errors += 1;
                    self.send(&Reply::error("ERR command line is not valid UTF-8"))
                        .await?;
                    continue;
                }
            };
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let reply = match split_line(text) {
                Ok(args) if is_quit(&args) => {
                    self.send(&Reply::ok()).await?;
                    return Ok(());
                }
                Ok(args) => self.handler.execute(&args),
                Err(e) => Reply::error(format!("ERR {}", e)),
            };

            self.stats.commands_processed += 1;
            if reply.is_error() {
                self.stats.errors += 1;
            }
            self.send(&reply).await?;
        }
    }

    async fn send(&mut self, reply: &Reply) -> Result<(), ConsoleError> {
        let text = format!("{}\n", reply);
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        self.stats.bytes_written += text.len() as u64;
        trace!(bytes = text.len(), "Sent reply");
        Ok(())
    }
}

fn is_quit(args: &[String]) -> bool {
    matches!(args, [cmd] if cmd.eq_ignore_ascii_case("QUIT") || cmd.eq_ignore_ascii_case("EXIT"))
}
