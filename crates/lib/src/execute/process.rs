//! External command execution.
//!
//! Commands run with an explicit argument vector and an explicit environment:
//! the ambient environment is cleared, so callers pass everything the command
//! needs. Output is streamed line by line to tracing and buffered so failures
//! carry their own diagnostics.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::execute::types::ExecuteError;

#[derive(Debug, Clone, Copy)]
enum OutputStream {
  Stdout,
  Stderr,
}

/// Execute a command and return its combined stdout/stderr output.
///
/// # Arguments
///
/// * `argv` - Program followed by its arguments (no shell interpretation)
/// * `env` - The complete environment of the child
/// * `dir` - Optional working directory (defaults to the current directory)
/// * `cancel` - Cancelling the token kills the child
///
/// # Errors
///
/// - `EmptyCommand` if `argv` is empty
/// - `Spawn` if the program cannot be started
/// - `CmdFailed` with the buffered output on a nonzero exit
/// - `Cancelled` if the token fires before the child exits
pub async fn run_command(
  argv: &[String],
  env: &BTreeMap<String, String>,
  dir: Option<&Path>,
  cancel: &CancellationToken,
) -> Result<String, ExecuteError> {
  let (program, args) = argv.split_first().ok_or(ExecuteError::EmptyCommand)?;
  let cmd = argv.join(" ");

  let mut command = Command::new(program);
  command
    .args(args)
    .env_clear()
    .envs(env)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
  if let Some(dir) = dir {
    command.current_dir(dir);
  }

  debug!(cmd = %cmd, env = ?env, working_dir = ?dir, "running");

  let mut child = command.spawn().map_err(|source| ExecuteError::Spawn {
    program: program.clone(),
    source,
  })?;

  let stdout = child.stdout.take();
  let stderr = child.stderr.take();
  let combined = Mutex::new(String::new());

  let status = {
    let finished = async {
      let (out, err) = tokio::join!(
        pump(stdout, OutputStream::Stdout, &cmd, &combined),
        pump(stderr, OutputStream::Stderr, &cmd, &combined),
      );
      out?;
      err?;
      child.wait().await
    };

    tokio::select! {
      status = finished => Some(status),
      _ = cancel.cancelled() => None,
    }
  };

  let Some(status) = status else {
    warn!(cmd = %cmd, "cancelled, killing process");
    // The child may already have exited on its own
    let _ = child.kill().await;
    return Err(ExecuteError::Cancelled);
  };

  let status = status?;
  let output = combined.into_inner().unwrap_or_else(PoisonError::into_inner);

  if !status.success() {
    debug!(cmd = %cmd, code = ?status.code(), "failed");
    return Err(ExecuteError::CmdFailed {
      cmd,
      code: status.code(),
      output,
    });
  }

  Ok(output)
}

/// Forward one output stream to tracing and the combined buffer.
async fn pump<R>(reader: Option<R>, stream: OutputStream, cmd: &str, combined: &Mutex<String>) -> std::io::Result<()>
where
  R: AsyncRead + Unpin,
{
  let Some(reader) = reader else {
    return Ok(());
  };

  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();

  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      return Ok(());
    }

    let line = String::from_utf8_lossy(&buf);
    let line = line.trim_end_matches(['\r', '\n']);
    match stream {
      OutputStream::Stdout => info!(cmd = %cmd, "{line}"),
      OutputStream::Stderr => warn!(cmd = %cmd, "{line}"),
    }

    let mut combined = combined.lock().unwrap_or_else(PoisonError::into_inner);
    combined.push_str(line);
    combined.push('\n');
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{shell_cmd, touch_file};
  use std::time::{Duration, Instant};
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn argv(cmd: (&str, Vec<String>)) -> Vec<String> {
    let (program, args) = cmd;
    std::iter::once(program.to_string()).chain(args).collect()
  }

  fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut env = BTreeMap::from([("PATH".to_string(), "/usr/bin:/bin".to_string())]);
    env.extend(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    env
  }

  #[tokio::test]
  async fn captures_stdout_and_stderr() {
    let output = run_command(
      &argv(shell_cmd("echo out; echo err 1>&2")),
      &env(&[]),
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.contains(&"out"));
    assert!(lines.contains(&"err"));
  }

  #[tokio::test]
  #[traced_test]
  async fn output_lines_are_logged() {
    run_command(
      &argv(shell_cmd("echo streamed-stdout-line; echo streamed-stderr-line 1>&2")),
      &env(&[]),
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(logs_contain("streamed-stdout-line"));
    assert!(logs_contain("streamed-stderr-line"));
    logs_assert(|lines: &[&str]| {
      let at_level = |level: &str, text: &str| lines.iter().any(|l| l.contains(level) && l.contains(text));
      if at_level("INFO", "streamed-stdout-line") && at_level("WARN", "streamed-stderr-line") {
        Ok(())
      } else {
        Err("stdout should log at info and stderr at warn".to_string())
      }
    });
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn environment_is_explicit() {
    // HOME is set for the test process but must not reach the child
    let output = run_command(
      &argv(shell_cmd("echo \"[$HOME][$MY_VAR]\"")),
      &env(&[("MY_VAR", "mine")]),
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(output.trim(), "[][mine]");
  }

  #[tokio::test]
  async fn runs_in_working_directory() {
    let temp_dir = TempDir::new().unwrap();

    run_command(
      &argv(touch_file("cwd_marker")),
      &env(&[]),
      Some(temp_dir.path()),
      &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(temp_dir.path().join("cwd_marker").exists());
  }

  #[tokio::test]
  async fn failure_carries_output_and_code() {
    let err = run_command(
      &argv(shell_cmd("echo broken; exit 3")),
      &env(&[]),
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
      ExecuteError::CmdFailed { code, output, .. } => {
        assert_eq!(code, Some(3));
        assert_eq!(output.trim(), "broken");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn missing_program_is_spawn_error() {
    let err = run_command(
      &["binsmith-definitely-missing-program".to_string()],
      &env(&[]),
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecuteError::Spawn { ref program, .. } if program == "binsmith-definitely-missing-program"));
  }

  #[tokio::test]
  async fn empty_argv_is_rejected() {
    let err = run_command(&[], &env(&[]), None, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ExecuteError::EmptyCommand));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn cancellation_kills_process() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(100)).await;
      trigger.cancel();
    });

    let started = Instant::now();
    let err = run_command(&argv(shell_cmd("sleep 30")), &env(&[]), None, &cancel)
      .await
      .unwrap_err();

    assert!(matches!(err, ExecuteError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
  }
}
