//! Running the installed executable.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::error::LauncherError;

/// Run `executable` with `args`, wait for it, and return its exit code.
///
/// The path is made absolute first so the child is never looked up on
/// `PATH`. Standard streams are inherited.
pub async fn launch(executable: &Path, args: &[String]) -> Result<i32, LauncherError> {
    let launch_error = |source| LauncherError::Launch {
        path: executable.to_path_buf(),
        source,
    };

    let program = std::path::absolute(executable).map_err(launch_error)?;
    debug!(executable = %program.display(), ?args, "Run process");

    let status = Command::new(&program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(launch_error)?;

    let code = exit_code(status);
    if code == 0 {
        info!("child process exited with code {code}");
    } else {
        warn!("child process exited with code {code}");
    }
    Ok(code)
}

/// Exit code of the child; signals map to `128 + signal` as shells report them.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
