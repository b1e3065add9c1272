//! Test doubles and fixtures shared by the scenario suites.
//!
//! Nothing here touches the network or the real filesystem.

mod fake_executor;
pub mod fixtures;
mod flaky_store;

pub use fake_executor::{ExecCall, FakeExecutor, FakeResponse};
pub use fixtures::{test_credentials, TEST_KEY_PEM, TEST_KEY_SECRET};
pub use flaky_store::FlakyStore;
