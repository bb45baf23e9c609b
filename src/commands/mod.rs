//! Command Handler Module
//!
//! The console command layer: it turns a line of text into arguments,
//! executes them against the document store and the leaderboards, and
//! renders the reply.
//!
//! ## Architecture
//!
//! ```text
//! Console line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  split_line     │  (line)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - MULTI queue  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ DocumentStore / │
//! │ Leaderboards    │
//! └────────┬────────┘
//!          │
//!          ▼
//!       Reply        (reply)
//! ```

pub mod handler;
pub mod line;
pub mod reply;

pub use handler::CommandHandler;
pub use line::{split_line, LineError};
pub use reply::Reply;
