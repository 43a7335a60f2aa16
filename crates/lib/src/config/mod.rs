//! Project configuration loading.
//!
//! A project file is YAML (`.binsmith.yml` by default):
//!
//! ```yaml
//! project_name: tool
//! builds:
//!   - id: cli
//!     binary: "tool-{{ .Os }}"
//!     env:
//!       CGO_ENABLED: "0"
//!     hooks:
//!       pre: go generate ./...
//!       post:
//!         - cmd: upx {{ .Path }}
//!           env: [UPX_LEVEL=9]
//! ```

mod types;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use types::*;

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = ".binsmith.yml";

/// Configuration and defaulting errors. All of them abort before any build starts.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to parse config: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("found {kind} with duplicate IDs: {}, please fix your config", .ids.join(", "))]
  DuplicateIds { kind: String, ids: Vec<String> },

  #[error("no builds configured: set either `builds` or `build`")]
  NoBuilds,

  #[error("missing required field `{0}`")]
  MissingField(&'static str),

  #[error("no builder registered for language '{0}'")]
  UnknownLanguage(String),

  #[error("invalid {lang} build '{id}': {message}")]
  InvalidBuild { lang: String, id: String, message: String },
}

impl Project {
  /// Parse a project from YAML text.
  ///
  /// # Errors
  ///
  /// Returns `Parse` if the text is not a valid project document.
  pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
  }

  /// Load a project file from disk.
  ///
  /// # Errors
  ///
  /// Returns `Read` if the file cannot be read and `Parse` if it is not valid.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_yaml(&content)
  }
}
