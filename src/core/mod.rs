//! Shared types for the launcher binary.

pub mod error;

pub use error::{ErrorContext, LauncherError, user_friendly_error};
