//! Defaulting pass over the configured builds.

use std::path::PathBuf;

use tracing::debug;

use crate::build::ids::IdRegistry;
use crate::config::{BuildDefinition, ConfigError};
use crate::context::{Context, Env};

/// Language used when a build does not name one.
pub const DEFAULT_LANG: &str = "go";

/// Dist directory used when the project does not name one.
pub const DEFAULT_DIST: &str = "dist";

/// Fill unset fields of every build in `ctx.project` and validate the result.
///
/// When the explicit build list is empty the single-build shorthand is
/// defaulted and becomes the only build.
///
/// # Errors
///
/// - `NoBuilds` if neither `builds` nor `build` is configured
/// - `DuplicateIds` if two builds share an ID after defaulting
/// - `MissingField`, `UnknownLanguage`, `InvalidBuild` from per-build defaulting
pub fn apply_defaults(ctx: &mut Context) -> Result<(), ConfigError> {
  if ctx.project.dist.as_os_str().is_empty() {
    ctx.project.dist = PathBuf::from(DEFAULT_DIST);
  }

  let mut ids = IdRegistry::new("builds");
  let configured = std::mem::take(&mut ctx.project.builds);

  let builds = if configured.is_empty() {
    let single = ctx.project.build.clone().ok_or(ConfigError::NoBuilds)?;
    vec![build_with_defaults(ctx, single)?]
  } else {
    configured
      .into_iter()
      .map(|build| build_with_defaults(ctx, build))
      .collect::<Result<Vec<_>, _>>()?
  };

  for build in &builds {
    ids.inc(&build.id);
  }
  ctx.project.builds = builds;

  ids.validate()
}

/// Default a single build definition.
///
/// # Errors
///
/// Returns `MissingField` if `id` or `binary` must be derived but the project
/// has no name, `UnknownLanguage` if no builder handles `lang`, and
/// `InvalidBuild` if a build that is not skipped ends up without targets.
pub fn build_with_defaults(ctx: &Context, mut build: BuildDefinition) -> Result<BuildDefinition, ConfigError> {
  if build.lang.is_empty() {
    build.lang = DEFAULT_LANG.to_string();
  }
  if build.binary.is_empty() {
    build.binary = project_name(ctx)?;
  }
  if build.id.is_empty() {
    build.id = project_name(ctx)?;
  }
  for value in build.env.values_mut() {
    *value = expand_env(value, &ctx.env);
  }

  let builder = ctx
    .builders
    .get(&build.lang)
    .ok_or_else(|| ConfigError::UnknownLanguage(build.lang.clone()))?;

  debug!(id = %build.id, lang = %build.lang, "applying builder defaults");
  let build = builder.with_defaults(build)?;
  if !build.skip && build.targets.is_empty() {
    return Err(ConfigError::InvalidBuild {
      lang: build.lang,
      id: build.id,
      message: "no targets".to_string(),
    });
  }
  Ok(build)
}

fn project_name(ctx: &Context) -> Result<String, ConfigError> {
  if ctx.project.project_name.is_empty() {
    return Err(ConfigError::MissingField("project_name"));
  }
  Ok(ctx.project.project_name.clone())
}

/// Expand `${VAR}` and `$VAR` references against `env`.
///
/// Follows shell rules: a `$` followed by a digit or one of `*#$@!?-` names a
/// one-character variable, unknown variables expand to the empty string, and
/// malformed braces (`${}`, an unclosed `${`) are dropped. A `$` that does not
/// start a reference is kept as is.
pub fn expand_env(value: &str, env: &Env) -> String {
  let mut result = String::with_capacity(value.len());
  let mut rest = value;

  while let Some(pos) = rest.find('$') {
    result.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];
    match reference(after) {
      Reference::Name(name, width) => {
        result.push_str(env.get(name).map(String::as_str).unwrap_or_default());
        rest = &after[width..];
      }
      Reference::Malformed(width) => rest = &after[width..],
      Reference::Literal => {
        result.push('$');
        rest = after;
      }
    }
  }

  result.push_str(rest);
  result
}

enum Reference<'a> {
  /// Variable name and the number of bytes the reference spans after `$`.
  Name(&'a str, usize),
  Malformed(usize),
  Literal,
}

fn reference(s: &str) -> Reference<'_> {
  let bytes = s.as_bytes();
  match bytes.first() {
    None => Reference::Literal,
    Some(b'{') => {
      if bytes.len() > 2 && is_special_var(bytes[1]) && bytes[2] == b'}' {
        return Reference::Name(&s[1..2], 3);
      }
      match s[1..].find('}') {
        Some(0) => Reference::Malformed(2),
        Some(end) => Reference::Name(&s[1..end + 1], end + 2),
        None => Reference::Malformed(1),
      }
    }
    Some(&b) if is_special_var(b) => Reference::Name(&s[..1], 1),
    Some(_) => {
      let len = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
      if len == 0 {
        Reference::Literal
      } else {
        Reference::Name(&s[..len], len)
      }
    }
  }
}

fn is_special_var(b: u8) -> bool {
  matches!(b, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || b.is_ascii_digit()
}
