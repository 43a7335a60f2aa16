//! Module proxying.
//!
//! A proxied build compiles an external package instead of the project's own
//! source. A throwaway module is materialized under the dist directory that
//! blank-imports the package and pins it at the configured version:
//!
//! ```text
//! <dist>/build_<id>/
//!   main.go   // +build main / package main / import _ "<path>"
//!   go.mod    // module <project_name> / require <path> <version>
//!   go.sum    // copied from the project root
//! ```
//!
//! `<gobinary> mod tidy` then resolves the module, and the build is rewritten
//! to compile `<path>` from inside that directory.

use std::path::Path;

use tracing::{debug, info};

use crate::config::BuildDefinition;
use crate::context::Context;
use crate::execute::{ExecuteError, ProxyStep, run_command};
use crate::template::Template;

/// Materialize the proxy module of `build` and point the build at it.
///
/// Builds without a proxy path are returned unchanged.
///
/// # Errors
///
/// Returns [`ExecuteError::Proxy`] naming the step that failed. No target of
/// the build may be scheduled after an error.
pub async fn proxy(ctx: &Context, mut build: BuildDefinition) -> Result<BuildDefinition, ExecuteError> {
  let Some(config) = build.proxy.as_ref().filter(|_| build.is_proxied()) else {
    return Ok(build);
  };

  let id = build.id.clone();
  let fail = |step: ProxyStep| {
    let id = id.clone();
    move |source: ExecuteError| ExecuteError::Proxy {
      build: id,
      step,
      source: Box::new(source),
    }
  };

  let template = Template::new(ctx)
    .with_env(&build.env)
    .with_extra_fields([("Id", build.id.as_str())]);
  let path = template
    .apply(&config.path)
    .map_err(ExecuteError::from)
    .map_err(fail(ProxyStep::Template))?;
  let version = template
    .apply(&config.version)
    .map_err(ExecuteError::from)
    .map_err(fail(ProxyStep::Template))?;

  let dir = ctx.dist_dir().join(format!("build_{}", build.id));
  info!(id = %build.id, path = %path, version = %version, dir = %dir.display(), "proxying module");

  tokio::fs::create_dir_all(&dir)
    .await
    .map_err(ExecuteError::from)
    .map_err(fail(ProxyStep::CreateDir))?;

  write(&dir.join("main.go"), entry_point(&path))
    .await
    .map_err(fail(ProxyStep::WriteEntryPoint))?;
  write(&dir.join("go.mod"), manifest(&ctx.project.project_name, &path, &version))
    .await
    .map_err(fail(ProxyStep::WriteManifest))?;

  tokio::fs::copy(ctx.root.join("go.sum"), dir.join("go.sum"))
    .await
    .map_err(ExecuteError::from)
    .map_err(fail(ProxyStep::CopyLockfile))?;

  let gobinary = if build.gobinary.is_empty() { "go" } else { &build.gobinary };
  let argv = vec![gobinary.to_string(), "mod".to_string(), "tidy".to_string()];
  let mut env = ctx.env.clone();
  env.extend(build.env.clone());
  let output = run_command(&argv, &env, Some(&dir), &ctx.cancel)
    .await
    .map_err(fail(ProxyStep::Tidy))?;
  debug!(id = %build.id, output = %output, "go mod tidy finished");

  build.dir = dir.to_string_lossy().to_string();
  build.main = path;
  Ok(build)
}

fn entry_point(path: &str) -> String {
  format!("// +build main\npackage main\n\nimport _ \"{path}\"\n")
}

fn manifest(module: &str, path: &str, version: &str) -> String {
  format!("module {module}\n\nrequire {path} {version}\n")
}

async fn write(path: &Path, content: String) -> Result<(), ExecuteError> {
  tokio::fs::write(path, content).await?;
  Ok(())
}
