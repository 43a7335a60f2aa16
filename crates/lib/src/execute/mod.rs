//! Concurrent build execution.
//!
//! A run proxies every proxied build first, then fans out one task per
//! (build, target) pair. All tasks of all builds share one semaphore of
//! `ctx.parallelism` permits, and each task holds its permit from its first
//! step to its last:
//!
//! ```text
//! pending -> options resolved -> pre hooks -> built -> post hooks -> done
//!                  \________________\___________\__________\-> failed
//! ```
//!
//! A failing task does not cancel its siblings. Every task is joined and
//! every failure is collected in the [`RunReport`].

mod hooks;
mod process;
mod types;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::build::{options_for_target, proxy};
use crate::config::BuildDefinition;
use crate::context::Context;
use crate::platform;

pub use hooks::run_hooks;
pub use process::run_command;
pub use types::*;

/// Run every selected build of `ctx.project`.
///
/// The project must already have been through
/// [`apply_defaults`](crate::build::apply_defaults).
pub async fn run(ctx: Arc<Context>) -> RunReport {
  let mut report = RunReport::default();
  let mut builds = Vec::new();

  for build in ctx
    .project
    .builds
    .iter()
    .filter(|b| ctx.build_ids.is_empty() || ctx.build_ids.contains(&b.id))
  {
    if build.skip {
      info!(id = %build.id, "skip is set");
      report.skipped.push(build.id.clone());
      continue;
    }

    match prepare(&ctx, build.clone()).await {
      Ok(build) => builds.push(Arc::new(build)),
      Err(error) => {
        error!(id = %build.id, error = %error, "build preparation failed");
        report.failures.push(BuildFailure {
          build_id: build.id.clone(),
          target: None,
          error,
        });
      }
    }
  }

  let semaphore = Arc::new(Semaphore::new(ctx.parallelism));
  let mut join_set = JoinSet::new();
  let mut scheduled = Scheduled::new();

  for build in &builds {
    debug!(id = %build.id, targets = build.targets.len(), "scheduling targets");
    for target in &build.targets {
      let handle = join_set.spawn(guarded_target(
        ctx.clone(),
        build.clone(),
        target.clone(),
        semaphore.clone(),
      ));
      scheduled.insert(handle.id(), (build.id.clone(), target.clone()));
    }
  }

  while let Some(joined) = join_set.join_next_with_id().await {
    match joined {
      Ok((task_id, (build_id, target, Ok(artifact)))) => {
        scheduled.remove(&task_id);
        debug!(id = %build_id, target = %target, "target finished");
        report.artifacts.push(artifact);
      }
      Ok((task_id, (build_id, target, Err(error)))) => {
        scheduled.remove(&task_id);
        if error.is_cancelled() {
          warn!(id = %build_id, target = %target, "target cancelled");
        } else {
          error!(id = %build_id, target = %target, error = %error, "target failed");
        }
        report.failures.push(BuildFailure {
          build_id,
          target: Some(target),
          error,
        });
      }
      Err(e) => record_lost_task(&mut report, &mut scheduled, e),
    }
  }

  info!(
    built = report.artifacts.len(),
    failed = report.failures.len(),
    skipped = report.skipped.len(),
    "build run complete"
  );

  report
}

/// Narrow to the host target when asked, then proxy.
async fn prepare(ctx: &Context, mut build: BuildDefinition) -> Result<BuildDefinition, ExecuteError> {
  if ctx.single_target {
    let host = platform::host_target().ok_or(ExecuteError::UnsupportedHost)?;
    debug!(id = %build.id, target = %host, "building for host only");
    build.targets = vec![host];
  }
  proxy(ctx, build).await
}

type TaskOutcome = (String, String, Result<Artifact, ExecuteError>);

/// (build ID, target) of every outer task still being joined.
type Scheduled = HashMap<task::Id, (String, String)>;

/// Record an outer task that ended without an outcome as a failure of its
/// (build, target).
fn record_lost_task(report: &mut RunReport, scheduled: &mut Scheduled, e: JoinError) {
  let Some((build_id, target)) = scheduled.remove(&e.id()) else {
    error!(error = %e, "unknown build task aborted");
    return;
  };
  error!(id = %build_id, target = %target, error = %e, "build task aborted");
  report.failures.push(BuildFailure {
    build_id,
    target: Some(target),
    error: ExecuteError::TaskPanicked(e.to_string()),
  });
}

/// Acquire a permit, then run the target on its own task so a panic is
/// attributed to this (build, target) pair.
async fn guarded_target(
  ctx: Arc<Context>,
  build: Arc<BuildDefinition>,
  target: String,
  semaphore: Arc<Semaphore>,
) -> TaskOutcome {
  let build_id = build.id.clone();

  let permit = tokio::select! {
    biased;
    _ = ctx.cancel.cancelled() => None,
    permit = semaphore.acquire_owned() => permit.ok(),
  };
  let Some(permit) = permit else {
    return (build_id, target, Err(ExecuteError::Cancelled));
  };

  let inner = {
    let target = target.clone();
    tokio::spawn(async move { run_target(&ctx, &build, &target).await })
  };
  let result = match inner.await {
    Ok(result) => result,
    Err(e) if e.is_panic() => Err(ExecuteError::TaskPanicked(panic_message(e.into_panic()))),
    Err(e) => Err(ExecuteError::TaskPanicked(e.to_string())),
  };
  drop(permit);

  (build_id, target, result)
}

async fn run_target(ctx: &Context, build: &BuildDefinition, target: &str) -> Result<Artifact, ExecuteError> {
  let options = options_for_target(ctx, build, target)?;
  let builder = ctx
    .builders
    .get(&build.lang)
    .ok_or_else(|| ExecuteError::UnknownLanguage(build.lang.clone()))?;

  run_hooks(ctx, &options, &build.env, &build.hooks.pre, HookPhase::Pre).await?;
  builder.build(ctx, build, &options).await?;
  if ctx.skip_post_hooks {
    debug!(id = %build.id, target = %target, "skipping post hooks");
  } else {
    run_hooks(ctx, &options, &build.env, &build.hooks.post, HookPhase::Post).await?;
  }

  Ok(Artifact {
    build_id: build.id.clone(),
    options,
  })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
