use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

/// A whole project file: run-level settings plus the build definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Project {
  pub project_name: String,
  /// Output directory, relative to the project root unless absolute.
  pub dist: PathBuf,
  /// Project-level `KEY=VALUE` entries layered over the process environment.
  pub env: Vec<String>,
  pub builds: Vec<BuildDefinition>,
  /// Single-build shorthand, used when `builds` is empty.
  pub build: Option<BuildDefinition>,
}

/// One logical compilation unit before platform expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildDefinition {
  pub id: String,
  pub lang: String,
  /// Binary name template.
  pub binary: String,
  /// Platform identifiers, usually `<os>_<arch>`.
  pub targets: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub hooks: Hooks,
  pub proxy: Option<ProxyConfig>,
  /// Source directory the builder runs in.
  pub dir: String,
  /// Entry point handed to the builder.
  pub main: String,
  pub skip: bool,
  #[serde(deserialize_with = "one_or_many")]
  pub flags: Vec<String>,
  #[serde(deserialize_with = "one_or_many")]
  pub ldflags: Vec<String>,
  pub goos: Vec<String>,
  pub goarch: Vec<String>,
  pub goarm: Vec<String>,
  pub gobinary: String,
}

impl BuildDefinition {
  /// Whether this build wraps an external package instead of local source.
  pub fn is_proxied(&self) -> bool {
    self.proxy.as_ref().is_some_and(|p| !p.path.is_empty())
  }
}

/// External package a proxied build wraps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
  /// Import path template.
  pub path: String,
  /// Version template.
  pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Hooks {
  #[serde(deserialize_with = "one_or_many")]
  pub pre: Vec<Hook>,
  #[serde(deserialize_with = "one_or_many")]
  pub post: Vec<Hook>,
}

/// A command run before or after the build step of every target.
///
/// Written either as a bare command string or as a table with `cmd`, `dir`
/// and `env`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HookRepr")]
pub struct Hook {
  pub cmd: String,
  pub dir: String,
  /// Templated `KEY=VALUE` entries.
  pub env: Vec<String>,
}

impl Hook {
  pub fn new(cmd: &str) -> Self {
    Self {
      cmd: cmd.to_string(),
      ..Default::default()
    }
  }

  pub fn with_dir(mut self, dir: &str) -> Self {
    self.dir = dir.to_string();
    self
  }

  pub fn with_env(mut self, entry: &str) -> Self {
    self.env.push(entry.to_string());
    self
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HookRepr {
  Cmd(String),
  Full {
    cmd: String,
    #[serde(default)]
    dir: String,
    #[serde(default)]
    env: Vec<String>,
  },
}

impl From<HookRepr> for Hook {
  fn from(repr: HookRepr) -> Self {
    match repr {
      HookRepr::Cmd(cmd) => Hook {
        cmd,
        ..Default::default()
      },
      HookRepr::Full { cmd, dir, env } => Hook { cmd, dir, env },
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
  Many(Vec<T>),
  One(T),
}

/// Accept either a single value or a list of values.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Ok(match OneOrMany::deserialize(deserializer)? {
    OneOrMany::Many(values) => values,
    OneOrMany::One(value) => vec![value],
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn proxied_requires_a_path() {
    let mut build = BuildDefinition::default();
    assert!(!build.is_proxied());

    build.proxy = Some(ProxyConfig::default());
    assert!(!build.is_proxied());

    build.proxy = Some(ProxyConfig {
      path: "golang.org/x/tools".to_string(),
      version: "v0.1.0".to_string(),
    });
    assert!(build.is_proxied());
  }

  #[test]
  fn hook_builder_sets_fields() {
    let hook = Hook::new("make gen").with_dir("tools").with_env("A=1");

    assert_eq!(hook.cmd, "make gen");
    assert_eq!(hook.dir, "tools");
    assert_eq!(hook.env, vec!["A=1"]);
  }
}
