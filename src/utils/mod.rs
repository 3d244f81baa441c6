//! Shared helpers for binaries and HTTP clients.

pub mod bootstrap;
pub mod retry;
