//! Running external conversion tools.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::error::ConverterError;

/// Captured output of a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args` and waits for it.
///
/// The child is killed when the returned future is dropped, so a timeout
/// around this call cancels the tool as well. A non-zero exit status is a
/// conversion failure carrying stderr.
pub async fn run_tool<I, S>(
    tool: &str,
    program: &Path,
    args: I,
    cwd: Option<&Path>,
) -> Result<ToolOutput, ConverterError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(tool, command = ?command.as_std(), "Running tool");

    let output = command.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConverterError::tool_not_found(tool, program)
        } else {
            ConverterError::Io(e)
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(ConverterError::conversion_failed(
            format!("{} exited with code: {:?}", tool, output.status.code()),
            Some(stderr),
        ));
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Whether `program` can be started. Only spawn errors count; the exit
/// status of the probe is ignored.
pub async fn tool_available(program: &Path, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .is_ok()
}
