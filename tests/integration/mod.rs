//! Integration test suite for signed-launcher.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **pipeline**: the update pipeline through the public library API
//! - **binary**: the `signed-launcher` executable against a local release server

#[path = "../common/mod.rs"]
mod common;

mod binary;
mod pipeline;
