//! Per-run state shared by every stage of the pipe.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::builders::BuilderRegistry;
use crate::config::Project;

/// Environment as an ordered name → value map.
pub type Env = BTreeMap<String, String>;

/// Everything one run needs: the project, its root directory, the base
/// environment, run metadata and scheduling settings.
///
/// The project is mutated by the defaulting pass only; afterwards the context
/// is shared read-only (usually behind an `Arc`) by all target tasks.
#[derive(Debug, Clone)]
pub struct Context {
  pub project: Project,

  /// Directory relative paths (dist, build dirs, hook dirs) resolve against.
  pub root: PathBuf,

  /// Base environment for every hook and builder subprocess.
  pub env: Env,

  pub version: String,
  pub tag: String,
  pub commit: String,
  pub date: String,

  /// Maximum number of target tasks in flight across all builds.
  pub parallelism: usize,

  /// Skip post-build hooks.
  pub skip_post_hooks: bool,

  /// Build only for the host platform.
  pub single_target: bool,

  /// Restrict the run to these build IDs (empty means all).
  pub build_ids: Vec<String>,

  /// Cancelling this token stops pending tasks and kills running subprocesses.
  pub cancel: CancellationToken,

  pub builders: BuilderRegistry,
}

impl Context {
  /// Create a context with the process environment as base environment.
  ///
  /// Project-level `env` entries are layered over the process environment.
  /// Process variables whose name or value is not valid UTF-8 are left out.
  pub fn new(project: Project, root: impl Into<PathBuf>) -> Self {
    let mut env = process_env();
    env.extend(parse_env_entries(&project.env));

    Self {
      project,
      root: root.into(),
      env,
      version: String::new(),
      tag: String::new(),
      commit: String::new(),
      date: String::new(),
      parallelism: num_cpus(),
      skip_post_hooks: false,
      single_target: false,
      build_ids: Vec::new(),
      cancel: CancellationToken::new(),
      builders: BuilderRegistry::default(),
    }
  }

  /// Replace the base environment.
  pub fn with_env(mut self, env: Env) -> Self {
    self.env = env;
    self
  }

  pub fn with_version(mut self, version: &str) -> Self {
    self.version = version.to_string();
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
    self.builders = builders;
    self
  }

  /// Resolve a possibly relative directory against the project root.
  ///
  /// An empty path resolves to the root itself.
  pub fn resolve_dir(&self, dir: impl AsRef<Path>) -> PathBuf {
    let dir = dir.as_ref();
    if dir.as_os_str().is_empty() {
      self.root.clone()
    } else {
      self.root.join(dir)
    }
  }

  /// The dist directory, resolved against the project root.
  pub fn dist_dir(&self) -> PathBuf {
    self.resolve_dir(&self.project.dist)
  }
}

/// Parse `KEY=VALUE` entries, ignoring entries without `=`.
pub fn parse_env_entries(entries: &[String]) -> impl Iterator<Item = (String, String)> + '_ {
  entries
    .iter()
    .filter_map(|entry| entry.split_once('='))
    .map(|(k, v)| (k.to_string(), v.to_string()))
}

fn process_env() -> Env {
  std::env::vars_os()
    .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
      (Ok(name), Ok(value)) => Some((name, value)),
      (name, _) => {
        debug!(name = ?name, "skipping non-UTF-8 environment variable");
        None
      }
    })
    .collect()
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
