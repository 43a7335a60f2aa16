mod build;
mod check;

use std::path::Path;

use anyhow::{Context as _, Result};

use binsmith_lib::config::Project;
use binsmith_lib::context::Context;

pub use build::{BuildArgs, cmd_build};
pub use check::cmd_check;

/// Load a project file into a fresh run context.
///
/// The project root is the directory holding the file.
fn load_context(config: &Path) -> Result<Context> {
  let path = dunce::canonicalize(config).with_context(|| format!("Config file not found: {}", config.display()))?;
  let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
  let project = Project::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
  Ok(Context::new(project, root))
}
