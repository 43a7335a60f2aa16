//! Pluggable per-language builders.
//!
//! A builder fills language-specific defaults (for example the target list)
//! and compiles one target once its options are fully resolved. Builders are
//! registered by language tag in a [`BuilderRegistry`] when a run starts.

mod go;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::build::TargetOptions;
use crate::config::{BuildDefinition, ConfigError};
use crate::context::Context;
use crate::execute::ExecuteError;

pub use go::{GoBuilder, VALID_TARGETS};

/// Trait for language builder implementations.
#[async_trait]
pub trait Builder: Send + Sync {
  /// Language tag this builder is registered under.
  fn name(&self) -> &'static str;

  /// Fill language-specific defaults. Must be idempotent.
  fn with_defaults(&self, build: BuildDefinition) -> Result<BuildDefinition, ConfigError>;

  /// Compile one target to `options.path`.
  async fn build(&self, ctx: &Context, build: &BuildDefinition, options: &TargetOptions) -> Result<(), ExecuteError>;
}

/// Registry mapping language tags to builders.
#[derive(Clone)]
pub struct BuilderRegistry {
  builders: BTreeMap<String, Arc<dyn Builder>>,
}

impl BuilderRegistry {
  /// Create a registry with no builders.
  pub fn empty() -> Self {
    Self {
      builders: BTreeMap::new(),
    }
  }

  /// Register a builder, replacing any builder with the same name.
  pub fn register(&mut self, builder: Arc<dyn Builder>) {
    self.builders.insert(builder.name().to_string(), builder);
  }

  /// Get the builder for a language tag.
  pub fn get(&self, lang: &str) -> Option<Arc<dyn Builder>> {
    self.builders.get(lang).cloned()
  }

  /// Registered language tags, sorted.
  pub fn languages(&self) -> impl Iterator<Item = &str> {
    self.builders.keys().map(String::as_str)
  }
}

impl Default for BuilderRegistry {
  /// A registry with every builder shipped in this crate.
  fn default() -> Self {
    let mut registry = Self::empty();
    registry.register(Arc::new(GoBuilder::new()));
    registry
  }
}

impl fmt::Debug for BuilderRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.languages()).finish()
  }
}
