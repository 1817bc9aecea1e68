//! # Integration Scenarios
//!
//! Each file builds a hub, registers a few modules and checks what they
//! observe through listeners and shared state.

pub mod concurrency;
pub mod lifecycle;
