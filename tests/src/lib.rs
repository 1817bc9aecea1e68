//! # Probe Test Suite
//!
//! Cross-crate scenarios that drive a real hub with several modules.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Hub/module helpers shared by scenarios
//! └── integration/
//!     ├── request_response.rs  # Paired events between modules
//!     ├── shared_state.rs      # "As of" reads across modules
//!     ├── lifecycle.rs         # Boot, unregistration, shutdown
//!     └── concurrency.rs       # Publishers and registrations on many threads
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All scenarios
//! cargo test -p probe-tests
//!
//! # By category
//! cargo test -p probe-tests integration::shared_state::
//!
//! # Benchmarks
//! cargo bench -p probe-tests
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod integration;
