//! End-to-end runs through the public API: load, default, execute.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use binsmith_lib::build::{TargetOptions, apply_defaults};
use binsmith_lib::builders::{Builder, BuilderRegistry};
use binsmith_lib::config::{BuildDefinition, ConfigError, Project};
use binsmith_lib::context::Context;
use binsmith_lib::execute::{self, ExecuteError};
use tempfile::TempDir;

/// Writes `<id> <target> <version>` to the output path.
struct EchoBuilder;

#[async_trait]
impl Builder for EchoBuilder {
  fn name(&self) -> &'static str {
    "echo"
  }

  fn with_defaults(&self, mut build: BuildDefinition) -> Result<BuildDefinition, ConfigError> {
    if build.targets.is_empty() {
      build.targets = vec!["linux_amd64".to_string(), "windows_amd64".to_string()];
    }
    Ok(build)
  }

  async fn build(&self, ctx: &Context, build: &BuildDefinition, options: &TargetOptions) -> Result<(), ExecuteError> {
    if let Some(parent) = options.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let content = format!("{} {} {}", build.id, options.target, ctx.version);
    tokio::fs::write(&options.path, content).await?;
    Ok(())
  }
}

fn context(yaml: &str, root: &std::path::Path) -> Context {
  let project = Project::from_yaml(yaml).unwrap();
  let mut builders = BuilderRegistry::empty();
  builders.register(Arc::new(EchoBuilder));
  Context::new(project, root)
    .with_env(BTreeMap::from([("PATH".to_string(), "/usr/bin:/bin".to_string())]))
    .with_builders(builders)
    .with_version("2.0.0")
}

#[tokio::test]
async fn project_file_to_artifacts() {
  let temp_dir = TempDir::new().unwrap();
  let root = temp_dir.path();
  let mut ctx = context(
    r#"
project_name: demo
builds:
  - lang: echo
    binary: "demo-{{ .Os }}"
  - id: skipped
    lang: echo
    skip: true
"#,
    root,
  );

  apply_defaults(&mut ctx).unwrap();
  let report = execute::run(Arc::new(ctx)).await.into_result().unwrap();

  assert_eq!(report.skipped, vec!["skipped"]);
  assert_eq!(report.artifacts.len(), 2);

  let linux = root.join("dist/demo_linux_amd64/demo-linux");
  let windows = root.join("dist/demo_windows_amd64/demo-windows.exe");
  assert_eq!(std::fs::read_to_string(linux).unwrap(), "demo linux_amd64 2.0.0");
  assert_eq!(std::fs::read_to_string(windows).unwrap(), "demo windows_amd64 2.0.0");
}

#[tokio::test]
async fn output_paths_are_absolute_and_unique() {
  let temp_dir = TempDir::new().unwrap();
  let mut ctx = context(
    r#"
project_name: demo
builds:
  - id: one
    lang: echo
  - id: two
    lang: echo
"#,
    temp_dir.path(),
  );

  apply_defaults(&mut ctx).unwrap();
  let report = execute::run(Arc::new(ctx)).await;

  assert!(report.is_success());
  let mut paths: Vec<_> = report.artifacts.iter().map(|a| a.options.path.clone()).collect();
  assert!(paths.iter().all(|p| p.is_absolute()));
  paths.sort();
  paths.dedup();
  assert_eq!(paths.len(), 4);
}

#[test]
fn duplicate_ids_fail_before_running() {
  let temp_dir = TempDir::new().unwrap();
  let mut ctx = context(
    r#"
project_name: demo
builds:
  - id: same
    lang: echo
  - id: same
    lang: echo
  - id: same
    lang: echo
"#,
    temp_dir.path(),
  );

  let err = apply_defaults(&mut ctx).unwrap_err();

  assert_eq!(
    err.to_string(),
    "found builds with duplicate IDs: 'same' (3 times), please fix your config"
  );
}

#[tokio::test]
#[cfg(unix)]
async fn failing_hook_is_task_local() {
  let temp_dir = TempDir::new().unwrap();
  let mut ctx = context(
    r#"
project_name: demo
builds:
  - id: hooked
    lang: echo
    targets: [linux_amd64]
    hooks:
      pre: "false"
  - id: plain
    lang: echo
    targets: [linux_amd64]
"#,
    temp_dir.path(),
  );

  apply_defaults(&mut ctx).unwrap();
  let err = execute::run(Arc::new(ctx)).await.into_result().unwrap_err();

  assert!(err.to_string().starts_with("1 build task(s) failed: build hooked (linux_amd64): pre hook failed"));
  assert_eq!(err.report.artifacts.len(), 1);
  assert_eq!(err.report.artifacts[0].build_id, "plain");
}
