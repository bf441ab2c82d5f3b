// bcli/src/lib.rs

//! A serialized async driver for an external `bitcoin-cli` process.
//!
//! Every call is dispatched through a single-flight, FIFO-ordered
//! queue backed by one Tokio task, so only ever one `bitcoin-cli`
//! child is running at a time. Completions are delivered through a
//! [`Cancelled`](error::BcliError::Cancelled)-safe model: a caller
//! that drops its [`Anchor`] before a request finishes simply never
//! hears back, the same as a dangling callback pointer that was never
//! called.

mod anchor;
mod db;
mod driver;
mod error;
mod parse;
mod spawn;

pub use anchor::{Anchor, WeakAnchor};
pub use db::{Database, NoopDatabase};
pub use driver::BcliDriver;
pub use error::BcliError;
pub use parse::{EstimateMode, SendRawTxOutcome, TxOut};
