//! Preparing build definitions for execution.
//!
//! - [`defaults`] fills unset fields and validates IDs
//! - [`proxy`] materializes wrapper modules for proxied builds
//! - [`options`] resolves per-target output options

pub mod defaults;
mod ids;
pub mod options;
pub mod proxy;

pub use defaults::{DEFAULT_DIST, DEFAULT_LANG, apply_defaults, build_with_defaults, expand_env};
pub use ids::IdRegistry;
pub use options::{TargetOptions, ext_for, options_for_target, split_target};
pub use proxy::proxy;
