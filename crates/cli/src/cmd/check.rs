//! Implementation of the `binsmith check` command.

use std::path::Path;

use anyhow::{Context, Result};

use binsmith_lib::build::apply_defaults;

use crate::output::{OutputFormat, print_json, print_stat, print_success};

/// Validate a project file: parse it and run the defaulting pass.
pub fn cmd_check(config: &Path, output: OutputFormat) -> Result<()> {
  let mut ctx = super::load_context(config)?;
  apply_defaults(&mut ctx).context("Invalid configuration")?;

  let builds = &ctx.project.builds;
  if output.is_json() {
    let items: Vec<_> = builds
      .iter()
      .map(|b| serde_json::json!({ "id": b.id, "lang": b.lang, "skip": b.skip, "targets": b.targets }))
      .collect();
    print_json(&serde_json::json!({ "valid": true, "builds": items }))?;
  } else {
    print_success(&format!("{} is valid", config.display()));
    for build in builds {
      let targets = if build.skip {
        "skipped".to_string()
      } else {
        build.targets.join(", ")
      };
      print_stat(&build.id, &targets);
    }
  }

  Ok(())
}
