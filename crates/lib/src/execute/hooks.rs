//! Pre and post build hooks.

use std::collections::BTreeMap;

use tracing::info;

use crate::build::TargetOptions;
use crate::config::Hook;
use crate::context::{Context, Env};
use crate::execute::process::run_command;
use crate::execute::types::{ExecuteError, HookPhase};
use crate::template::Template;

/// Run `hooks` in order for one target.
///
/// Each hook sees the base environment, then `build_env`, then its own `env`
/// entries. Entries are templated one at a time so later entries can refer
/// to earlier ones through `{{ .Env.NAME }}`. The hook's `dir` and `cmd` are
/// templated last, against the accumulated environment.
///
/// # Errors
///
/// The first failing hook aborts the phase. Its error is wrapped in
/// [`ExecuteError::Hook`] tagged with `phase`.
pub async fn run_hooks(
  ctx: &Context,
  opts: &TargetOptions,
  build_env: &BTreeMap<String, String>,
  hooks: &[Hook],
  phase: HookPhase,
) -> Result<(), ExecuteError> {
  for hook in hooks {
    run_hook(ctx, opts, build_env, hook)
      .await
      .map_err(|source| ExecuteError::Hook {
        phase,
        source: Box::new(source),
      })?;
  }
  Ok(())
}

async fn run_hook(ctx: &Context, opts: &TargetOptions, build_env: &Env, hook: &Hook) -> Result<(), ExecuteError> {
  let mut env = ctx.env.clone();
  env.extend(build_env.iter().map(|(k, v)| (k.clone(), v.clone())));

  for entry in &hook.env {
    let entry = template(ctx, opts, &env).apply(entry)?;
    let (key, value) = entry
      .split_once('=')
      .ok_or_else(|| ExecuteError::InvalidEnvEntry(entry.clone()))?;
    env.insert(key.to_string(), value.to_string());
  }

  let template = template(ctx, opts, &env);
  let dir = template.apply(&hook.dir)?;
  let cmd = template.apply(&hook.cmd)?;

  let argv = shell_words::split(&cmd).map_err(|e| ExecuteError::HookParse {
    cmd: cmd.clone(),
    message: e.to_string(),
  })?;
  if argv.is_empty() {
    return Err(ExecuteError::HookParse {
      cmd,
      message: "command is empty".to_string(),
    });
  }

  info!(hook = %cmd, target = %opts.target, "running hook");
  run_command(&argv, &env, Some(&ctx.resolve_dir(&dir)), &ctx.cancel).await?;
  Ok(())
}

fn template(ctx: &Context, opts: &TargetOptions, env: &Env) -> Template {
  Template::new(ctx).with_build_options(opts).with_env(env)
}
