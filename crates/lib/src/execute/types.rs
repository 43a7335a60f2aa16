//! Types for build execution.
//!
//! This module defines the error types and the run report produced by the
//! executor.

use std::fmt;

use thiserror::Error;

use crate::build::TargetOptions;
use crate::template::TemplateError;

/// The phase a hook runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
  Pre,
  Post,
}

impl fmt::Display for HookPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HookPhase::Pre => write!(f, "pre"),
      HookPhase::Post => write!(f, "post"),
    }
  }
}

/// Step of module proxying that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStep {
  Template,
  CreateDir,
  WriteEntryPoint,
  WriteManifest,
  CopyLockfile,
  Tidy,
}

impl fmt::Display for ProxyStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let step = match self {
      ProxyStep::Template => "resolving proxy templates",
      ProxyStep::CreateDir => "creating proxy directory",
      ProxyStep::WriteEntryPoint => "writing main.go",
      ProxyStep::WriteManifest => "writing go.mod",
      ProxyStep::CopyLockfile => "copying go.sum",
      ProxyStep::Tidy => "running go mod tidy",
    };
    f.write_str(step)
  }
}

/// Errors that can occur while executing builds.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// A template could not be expanded.
  #[error("template error: {0}")]
  Template(#[from] TemplateError),

  /// A command could not be started.
  #[error("failed to start {program}: {source}")]
  Spawn { program: String, source: std::io::Error },

  /// A command exited unsuccessfully. Carries the combined output.
  #[error("command {cmd:?} failed with exit code {code:?}: {output:?}")]
  CmdFailed {
    cmd: String,
    code: Option<i32>,
    output: String,
  },

  /// A command line was empty.
  #[error("empty command")]
  EmptyCommand,

  /// A hook command line could not be split into words.
  #[error("invalid hook command {cmd:?}: {message}")]
  HookParse { cmd: String, message: String },

  /// A hook environment entry is not `KEY=VALUE`.
  #[error("invalid environment entry {0:?}, expected KEY=VALUE")]
  InvalidEnvEntry(String),

  /// A pre or post hook failed.
  #[error("{phase} hook failed: {source}")]
  Hook {
    phase: HookPhase,
    #[source]
    source: Box<ExecuteError>,
  },

  /// Proxying a build's module failed.
  #[error("failed to proxy module for build {build} while {step}: {source}")]
  Proxy {
    build: String,
    step: ProxyStep,
    #[source]
    source: Box<ExecuteError>,
  },

  /// A builder reported a failure of its own.
  #[error("{lang} builder: {message}")]
  Builder { lang: String, message: String },

  /// No builder is registered for a build's language.
  #[error("no builder registered for language '{0}'")]
  UnknownLanguage(String),

  /// The host platform has no target identifier.
  #[error("unsupported host platform for single-target builds")]
  UnsupportedHost,

  /// The run was cancelled before this work finished.
  #[error("cancelled")]
  Cancelled,

  /// A target task panicked.
  #[error("build task panicked: {0}")]
  TaskPanicked(String),

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl ExecuteError {
  /// Whether this error (or the error it wraps) is a cancellation.
  pub fn is_cancelled(&self) -> bool {
    match self {
      ExecuteError::Cancelled => true,
      ExecuteError::Hook { source, .. } | ExecuteError::Proxy { source, .. } => source.is_cancelled(),
      _ => false,
    }
  }
}

/// A target that finished building.
#[derive(Debug, Clone)]
pub struct Artifact {
  pub build_id: String,
  pub options: TargetOptions,
}

/// A failure of one target task, or of a whole build when `target` is `None`
/// (proxying failed before any task was scheduled).
#[derive(Debug)]
pub struct BuildFailure {
  pub build_id: String,
  pub target: Option<String>,
  pub error: ExecuteError,
}

impl fmt::Display for BuildFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.target {
      Some(target) => write!(f, "build {} ({}): {}", self.build_id, target, self.error),
      None => write!(f, "build {}: {}", self.build_id, self.error),
    }
  }
}

/// Result of one run over all configured builds.
#[derive(Debug, Default)]
pub struct RunReport {
  /// Builds excluded because `skip` is set.
  pub skipped: Vec<String>,

  /// Targets that finished (pre hooks, build and post hooks all succeeded).
  pub artifacts: Vec<Artifact>,

  /// Every failure, in completion order.
  pub failures: Vec<BuildFailure>,
}

impl RunReport {
  /// Returns true if nothing failed.
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }

  /// Whether any failure was caused by cancellation.
  pub fn was_cancelled(&self) -> bool {
    self.failures.iter().any(|f| f.error.is_cancelled())
  }

  /// Convert into a `Result`, failing when any task failed.
  ///
  /// # Errors
  ///
  /// Returns [`RunFailed`] carrying the whole report, successes included.
  pub fn into_result(self) -> Result<RunReport, RunFailed> {
    if self.is_success() {
      Ok(self)
    } else {
      Err(RunFailed { report: self })
    }
  }
}

/// Aggregate failure of a run.
#[derive(Debug, Error)]
#[error("{} build task(s) failed: {}", .report.failures.len(), summarize(&.report.failures))]
pub struct RunFailed {
  pub report: RunReport,
}

fn summarize(failures: &[BuildFailure]) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
