//! Test utilities for binsmith-lib.
//!
//! Cross-platform command helpers plus a recording [`Builder`] for exercising
//! the executor without a real toolchain.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::build::TargetOptions;
use crate::builders::Builder;
use crate::config::{BuildDefinition, ConfigError};
use crate::context::Context;
use crate::execute::ExecuteError;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to create a marker file in the current directory.
#[cfg(unix)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  ("/usr/bin/touch", vec![filename.to_string()])
}

#[cfg(windows)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  (
    "powershell.exe",
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", filename),
    ],
  )
}

/// Write an executable `/bin/sh` script into `dir` and return its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Builder that records its calls instead of compiling.
///
/// Each successful call writes a placeholder file at the target's output path.
#[derive(Debug)]
pub struct RecordingBuilder {
  name: &'static str,
  default_targets: bool,
  delay: Option<Duration>,
  fail_on: Vec<String>,
  panic_on: Vec<String>,
  calls: Mutex<Vec<String>>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl RecordingBuilder {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      default_targets: true,
      delay: None,
      fail_on: Vec::new(),
      panic_on: Vec::new(),
      calls: Mutex::new(Vec::new()),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    }
  }

  /// Sleep this long in every call. Cancellation interrupts the sleep.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Leave `targets` as configured instead of defaulting to `native`.
  pub fn without_default_targets(mut self) -> Self {
    self.default_targets = false;
    self
  }

  pub fn failing_on(mut self, target: &str) -> Self {
    self.fail_on.push(target.to_string());
    self
  }

  pub fn panicking_on(mut self, target: &str) -> Self {
    self.panic_on.push(target.to_string());
    self
  }

  /// Recorded calls as `<id>:<target>`, in call order.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  /// Highest number of calls that were running at the same time.
  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }

  async fn run(&self, ctx: &Context, build: &BuildDefinition, options: &TargetOptions) -> Result<(), ExecuteError> {
    if let Some(delay) = self.delay {
      tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = ctx.cancel.cancelled() => return Err(ExecuteError::Cancelled),
      }
    }
    if self.panic_on.contains(&options.target) {
      panic!("forced panic on {}", options.target);
    }
    if self.fail_on.contains(&options.target) {
      return Err(ExecuteError::Builder {
        lang: self.name.to_string(),
        message: format!("forced failure of {}:{}", build.id, options.target),
      });
    }
    if let Some(parent) = options.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&options.path, b"binary").await?;
    Ok(())
  }
}

#[async_trait]
impl Builder for RecordingBuilder {
  fn name(&self) -> &'static str {
    self.name
  }

  fn with_defaults(&self, mut build: BuildDefinition) -> Result<BuildDefinition, ConfigError> {
    if self.default_targets && build.targets.is_empty() {
      build.targets = vec!["native".to_string()];
    }
    Ok(build)
  }

  async fn build(&self, ctx: &Context, build: &BuildDefinition, options: &TargetOptions) -> Result<(), ExecuteError> {
    self.calls.lock().unwrap().push(format!("{}:{}", build.id, options.target));
    let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(current, Ordering::SeqCst);

    let result = self.run(ctx, build, options).await;

    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}
