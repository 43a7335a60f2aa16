//! Per-target build options.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::config::BuildDefinition;
use crate::context::Context;
use crate::execute::ExecuteError;
use crate::template::Template;

/// Resolved options for one (build, target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOptions {
  pub target: String,
  pub os: String,
  pub arch: String,
  pub ext: String,
  /// Binary file name, extension included.
  pub name: String,
  /// Absolute output path.
  pub path: PathBuf,
}

/// Resolve the options of `build` for `target`.
///
/// The binary name template can reference `.Os`, `.Arch`, `.Target` and
/// `.Ext`. The output path is `<dist>/<id>_<target>/<name><ext>`.
///
/// # Errors
///
/// Returns `Template` if the binary name cannot be expanded, `Io` if the path
/// cannot be made absolute.
pub fn options_for_target(ctx: &Context, build: &BuildDefinition, target: &str) -> Result<TargetOptions, ExecuteError> {
  let (os, arch) = split_target(target);
  let mut opts = TargetOptions {
    target: target.to_string(),
    os,
    arch,
    ext: ext_for(target, &build.flags).to_string(),
    name: String::new(),
    path: PathBuf::new(),
  };

  let binary = Template::new(ctx).with_build_options(&opts).apply(&build.binary)?;
  let name = format!("{binary}{}", opts.ext);
  let path = std::path::absolute(ctx.dist_dir().join(format!("{}_{target}", build.id)).join(&name))?;

  info!(binary = %path.display(), "building");
  opts.name = name;
  opts.path = path;
  Ok(opts)
}

/// Split an `<os>_<arch>` identifier at its first underscore.
///
/// Identifiers without an underscore yield two empty strings.
pub fn split_target(target: &str) -> (String, String) {
  match target.split_once('_') {
    Some((os, arch)) => (os.to_string(), arch.to_string()),
    None => (String::new(), String::new()),
  }
}

/// File extension for a target's binary.
pub fn ext_for(target: &str, flags: &[String]) -> &'static str {
  if target.contains("windows") {
    for flag in flags {
      match flag.as_str() {
        "-buildmode=c-shared" => return ".dll",
        "-buildmode=c-archive" => return ".lib",
        _ => {}
      }
    }
    return ".exe";
  }
  if target == "js_wasm" {
    return ".wasm";
  }
  ""
}
