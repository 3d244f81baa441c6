//! eventrelay - append-only event relay with ordered fan-out
//!
//! A broadcaster records every event in an append-only log, stamps it with a
//! global sequence, and delivers it to a fixed set of subscribers. Each
//! subscriber folds events into its own view and can rebuild that view at
//! any time from the replay feed.

pub mod bus;
pub mod client;
pub mod config;
pub mod event;
pub mod handlers;
pub mod producer;
pub mod projectors;
pub mod replay;
pub mod storage;
pub mod subscriber;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;
