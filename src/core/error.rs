//! Error presentation for the launcher binary.
//!
//! Library code returns typed errors ([`ConfigError`], [`UpdateError`]). At the
//! binary boundary they are wrapped in [`LauncherError`], carried through
//! `anyhow`, and finally turned into an [`ErrorContext`] by
//! [`user_friendly_error`]: the error itself, optional details, and an
//! actionable suggestion, printed in colour to stderr.
//!
//! ```rust,no_run
//! use signed_launcher::core::error::{LauncherError, user_friendly_error};
//!
//! let error = anyhow::Error::new(LauncherError::Other {
//!     message: "something broke".to_string(),
//! });
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::update::{ErrorKind, UpdateError};

/// Top-level failures of one launcher invocation.
#[derive(Error, Debug)]
pub enum LauncherError {
    /// Configuration could not be loaded, or the override names nothing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The update pipeline failed; nothing was launched.
    #[error("Update failed at step '{node}'")]
    Update {
        node: &'static str,
        #[source]
        source: UpdateError,
    },

    /// The executable could not be started.
    #[error("Failed to launch {}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Other {
        message: String,
    },
}

/// An error with optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: LauncherError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: LauncherError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Turn any error reaching `main` into something a user can act on.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<LauncherError>() {
        Ok(launcher) => return create_error_context(launcher),
        Err(error) => error,
    };
    let error = match error.downcast::<ConfigError>() {
        Ok(config) => return create_error_context(LauncherError::Config(config)),
        Err(error) => error,
    };

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(LauncherError::Other {
        message,
    })
}

fn create_error_context(error: LauncherError) -> ErrorContext {
    let (details, suggestion) = match &error {
        LauncherError::Config(config) => config_hints(config),
        LauncherError::Update {
            source, ..
        } => (Some(source_chain(source)), Some(update_suggestion(source).to_string())),
        LauncherError::Launch {
            source, ..
        } => (
            Some(source.to_string()),
            Some(
                "Check that the executable exists in install_dir and is built for this platform"
                    .to_string(),
            ),
        ),
        LauncherError::Other {
            ..
        } => (None, None),
    };

    ErrorContext {
        error,
        suggestion,
        details,
    }
}

fn config_hints(config: &ConfigError) -> (Option<String>, Option<String>) {
    match config {
        ConfigError::NotFound {
            ..
        } => (
            None,
            Some(format!(
                "Create {} or pass --config <path> (or set {})",
                crate::config::DEFAULT_CONFIG_FILE,
                crate::config::CONFIG_ENV
            )),
        ),
        ConfigError::Parse {
            source, ..
        } => (
            Some(source.to_string()),
            Some("Check the TOML syntax and field names of the configuration file".to_string()),
        ),
        ConfigError::Read {
            source, ..
        } => (Some(source.to_string()), None),
        ConfigError::Invalid {
            ..
        } => (None, Some("Fix the configuration value and run the launcher again".to_string())),
        ConfigError::UnknownPlatform {
            ..
        } => (None, Some("Use os=<platform> with a platform listed under [platforms]".to_string())),
    }
}

fn source_chain(error: &UpdateError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(&format!(": {cause_text}"));
        }
        source = cause.source();
    }
    message
}

fn update_suggestion(error: &UpdateError) -> &'static str {
    match error.kind() {
        ErrorKind::Transport => {
            "Check your network connection and that the release and key URLs are reachable"
        }
        ErrorKind::Parse => "Check that release_url points at a release-listing JSON endpoint",
        ErrorKind::Resolution => {
            "Check that the release publishes the executable and its .sig asset exactly once"
        }
        ErrorKind::Verification => {
            "The download was not signed by the trusted key and was discarded. Contact the publisher before retrying"
        }
        ErrorKind::Persistence => "Check that install_dir exists and is writable",
        ErrorKind::Internal => "Run again with --verbose and report the log",
    }
}
