//! Identifier registry for the defaulting pass.

use std::collections::BTreeMap;

use crate::config::ConfigError;

/// Counts assigned IDs of one kind of definition so duplicates can be reported.
///
/// Scoped to a single defaulting pass; create a fresh registry per run.
#[derive(Debug)]
pub struct IdRegistry {
  kind: &'static str,
  counts: BTreeMap<String, usize>,
}

impl IdRegistry {
  pub fn new(kind: &'static str) -> Self {
    Self {
      kind,
      counts: BTreeMap::new(),
    }
  }

  /// Record one use of `id`.
  pub fn inc(&mut self, id: &str) {
    *self.counts.entry(id.to_string()).or_default() += 1;
  }

  /// Fail if any ID was recorded more than once.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateIds` listing every duplicated ID with its count.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let ids: Vec<String> = self
      .counts
      .iter()
      .filter(|(_, count)| **count > 1)
      .map(|(id, count)| format!("'{id}' ({count} times)"))
      .collect();

    if ids.is_empty() {
      Ok(())
    } else {
      Err(ConfigError::DuplicateIds {
        kind: self.kind.to_string(),
        ids,
      })
    }
  }
}
