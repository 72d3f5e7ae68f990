//! signed-launcher entry point.
//!
//! Parses arguments, runs the update, and exits with the launched process's
//! exit code. Errors are reported through
//! [`user_friendly_error`](signed_launcher::core::error::user_friendly_error)
//! and exit with status 1.

use clap::Parser;
use signed_launcher::cli;
use signed_launcher::core::error::user_friendly_error;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
