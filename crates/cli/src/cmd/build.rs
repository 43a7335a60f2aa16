//! Implementation of the `binsmith build` command.
//!
//! Loads the project file, applies defaults and runs every selected target.
//! Ctrl-C and the run timeout both cancel the run: queued targets never start
//! and running subprocesses are killed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use binsmith_lib::build::{TargetOptions, apply_defaults};
use binsmith_lib::execute::{self, RunReport};

use crate::output::{
  OutputFormat, format_elapsed, print_error, print_info, print_json, print_mapping, print_stat, print_success, print_warning,
};

/// Options of one `build` invocation.
pub struct BuildArgs {
  pub config: PathBuf,
  pub parallelism: Option<usize>,
  pub skip_post_hooks: bool,
  pub single_target: bool,
  pub ids: Vec<String>,
  pub version: Option<String>,
  pub commit: Option<String>,
  pub timeout: Duration,
}

#[derive(Serialize)]
struct ArtifactSummary<'a> {
  id: &'a str,
  #[serde(flatten)]
  options: &'a TargetOptions,
}

#[derive(Serialize)]
struct FailureSummary<'a> {
  id: &'a str,
  target: Option<&'a str>,
  error: String,
}

#[derive(Serialize)]
struct RunSummary<'a> {
  success: bool,
  elapsed_ms: u128,
  skipped: &'a [String],
  artifacts: Vec<ArtifactSummary<'a>>,
  failures: Vec<FailureSummary<'a>>,
}

pub fn cmd_build(args: &BuildArgs, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let mut ctx = super::load_context(&args.config)?;
  if let Some(version) = &args.version {
    ctx = ctx.with_version(version);
    ctx.tag = version.clone();
  }
  if let Some(commit) = &args.commit {
    ctx.commit = commit.clone();
  }
  ctx.date = humantime::format_rfc3339_seconds(SystemTime::now()).to_string();
  if let Some(parallelism) = args.parallelism {
    ctx = ctx.with_parallelism(parallelism);
  }
  ctx.skip_post_hooks = args.skip_post_hooks;
  ctx.single_target = args.single_target;
  ctx.build_ids = args.ids.clone();

  apply_defaults(&mut ctx).context("Invalid configuration")?;
  for id in &ctx.build_ids {
    if !ctx.project.builds.iter().any(|b| &b.id == id) {
      anyhow::bail!("no build with ID '{id}'");
    }
  }

  info!(
    builds = ctx.project.builds.len(),
    parallelism = ctx.parallelism,
    timeout = %humantime::format_duration(args.timeout),
    "starting build"
  );

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let timeout = args.timeout;
  let report = rt.block_on(async move {
    let watcher = tokio::spawn(watch(ctx.cancel.clone(), timeout));
    let report = execute::run(Arc::new(ctx)).await;
    watcher.abort();
    report
  });

  print_report(&report, start.elapsed(), output)?;
  report.into_result()?;
  Ok(())
}

/// Cancel `cancel` on Ctrl-C or once `timeout` has elapsed.
async fn watch(cancel: CancellationToken, timeout: Duration) {
  tokio::select! {
    Ok(()) = tokio::signal::ctrl_c() => {
      warn!("interrupted, cancelling build");
      cancel.cancel();
    }
    _ = tokio::time::sleep(timeout) => {
      warn!(timeout = %humantime::format_duration(timeout), "timed out, cancelling build");
      cancel.cancel();
    }
    _ = cancel.cancelled() => {}
  }
}

fn print_report(report: &RunReport, elapsed: Duration, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    let summary = RunSummary {
      success: report.is_success(),
      elapsed_ms: elapsed.as_millis(),
      skipped: &report.skipped,
      artifacts: report
        .artifacts
        .iter()
        .map(|a| ArtifactSummary {
          id: &a.build_id,
          options: &a.options,
        })
        .collect(),
      failures: report
        .failures
        .iter()
        .map(|f| FailureSummary {
          id: &f.build_id,
          target: f.target.as_deref(),
          error: f.error.to_string(),
        })
        .collect(),
    };
    return print_json(&summary);
  }

  println!();
  for artifact in &report.artifacts {
    print_mapping(
      &format!("{} ({})", artifact.build_id, artifact.options.target),
      &artifact.options.path.display().to_string(),
    );
  }
  for id in &report.skipped {
    print_warning(&format!("build {id} skipped"));
  }
  for failure in &report.failures {
    print_error(&failure.to_string());
  }

  println!();
  if report.artifacts.is_empty() && report.failures.is_empty() {
    print_info("Nothing to build");
  } else if report.is_success() {
    print_success("Build complete!");
  } else if report.was_cancelled() {
    print_error("Build cancelled");
  } else {
    print_error("Build failed");
  }
  print_stat("Built", &report.artifacts.len().to_string());
  print_stat("Failed", &report.failures.len().to_string());
  print_stat("Skipped", &report.skipped.len().to_string());
  print_stat("Duration", &format_elapsed(elapsed));

  Ok(())
}
