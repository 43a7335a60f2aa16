//! binsmith-lib: build orchestration for multi-platform binaries.
//!
//! A project declares logical builds; each expands into per-platform targets
//! that are compiled concurrently with optional hooks around every target:
//!
//! - [`config`]: the project file
//! - [`build`]: defaulting, module proxying and per-target options
//! - [`builders`]: pluggable per-language compilers
//! - [`execute`]: the bounded concurrent executor
//! - [`template`]: `{{ .Field }}` substitution in configuration values

pub mod build;
pub mod builders;
pub mod config;
pub mod context;
pub mod execute;
pub mod platform;
pub mod template;

#[cfg(test)]
mod util;
