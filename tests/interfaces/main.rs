//! Interface tests for the relay using Cucumber.
//!
//! These scenarios describe the observable behaviour of submit, deliver and
//! replay end to end. Select a storage backend via environment variable:
//!
//! ```bash
//! # In-memory (default)
//! cargo test --test interfaces
//!
//! # SQLite
//! STORAGE_BACKEND=sqlite cargo test --test interfaces --features sqlite
//! ```

mod backend;
mod steps;

use cucumber::World;
use steps::relay::RelayWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Relay Interface Tests ===\n");
    RelayWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/relay.feature")
        .await;
}
