//! Template parsing and substitution for configuration values.
//!
//! Binary names, hook commands, hook directories, environment entries, ldflags
//! and proxy coordinates may reference values that are only known once a run
//! (or a single target) is being processed. This module parses such strings
//! and substitutes resolved values.
//!
//! # Expression Formats
//!
//! - `{{ .Field }}` - a named field (`ProjectName`, `Version`, `Os`, `Target`, ...)
//! - `{{ .Env.NAME }}` - a variable from the environment carried by the template
//!
//! Whitespace inside the braces is ignored. A single `{` or `}` passes through
//! unchanged, so shell snippets like `${HOME}` work without escaping.
//!
//! # Example
//!
//! ```
//! use binsmith_lib::template::{parse, Placeholder, Segment};
//!
//! let segments = parse("bin/{{ .Os }}-{{ .Env.CC }}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("bin/".to_string()),
//!     Segment::Placeholder(Placeholder::Field("Os".to_string())),
//!     Segment::Literal("-".to_string()),
//!     Segment::Placeholder(Placeholder::Env("CC".to_string())),
//! ]);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::build::TargetOptions;
use crate::context::Context;

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `{{ .Name }}` - a named field
  Field(String),

  /// `{{ .Env.NAME }}` - an environment variable
  Env(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no expressions)
  Literal(String),

  /// An expression to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during template parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed template expression at position {0}")]
  Unclosed(usize),

  #[error("malformed template expression: {0}")]
  Malformed(String),

  #[error("unresolved field '.{0}'")]
  UnresolvedField(String),

  #[error("unresolved environment variable '.Env.{0}'")]
  UnresolvedEnv(String),
}

/// Trait for resolving expression values during substitution.
pub trait Resolver {
  /// Resolve a named field.
  fn resolve_field(&self, name: &str) -> Result<&str, TemplateError>;

  /// Resolve an environment variable.
  fn resolve_env(&self, key: &str) -> Result<&str, TemplateError>;
}

/// Parse a string containing template expressions into segments.
///
/// # Errors
///
/// Returns an error if an expression is unclosed or malformed.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(start) = rest.find("{{") {
    literal.push_str(&rest[..start]);

    let body = &rest[start + 2..];
    let end = body.find("}}").ok_or(TemplateError::Unclosed(offset + start))?;

    // Flush accumulated literal
    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Placeholder(parse_expression(&body[..end])?));

    let consumed = start + 2 + end + 2;
    offset += consumed;
    rest = &rest[consumed..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside an expression (everything between `{{` and `}}`).
fn parse_expression(content: &str) -> Result<Placeholder, TemplateError> {
  let trimmed = content.trim();
  let path = trimmed
    .strip_prefix('.')
    .ok_or_else(|| TemplateError::Malformed(format!("expected a field reference in '{trimmed}'")))?;

  let (name, placeholder) = match path.split_once('.') {
    Some(("Env", key)) => (key, Placeholder::Env(key.to_string())),
    Some(_) => return Err(TemplateError::Malformed(format!("unknown namespace in '{trimmed}'"))),
    None => (path, Placeholder::Field(path.to_string())),
  };

  if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return Err(TemplateError::Malformed(format!("invalid name in '{trimmed}'")));
  }

  Ok(placeholder)
}

/// Substitute all expressions in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or if any expression cannot be resolved.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute expressions in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Field(name)) => result.push_str(resolver.resolve_field(name)?),
      Segment::Placeholder(Placeholder::Env(key)) => result.push_str(resolver.resolve_env(key)?),
    }
  }

  Ok(result)
}

/// Template context for one resolution step.
///
/// Starts from the run metadata and base environment of a [`Context`] and can be
/// layered with per-target build options, an environment overlay, and
/// arbitrary extra fields. Later layers override earlier ones.
#[derive(Debug, Clone)]
pub struct Template {
  fields: BTreeMap<String, String>,
  env: BTreeMap<String, String>,
}

impl Template {
  /// Create a template context carrying run-level fields and the base environment.
  pub fn new(ctx: &Context) -> Self {
    let fields = [
      ("ProjectName", ctx.project.project_name.as_str()),
      ("Version", ctx.version.as_str()),
      ("Tag", ctx.tag.as_str()),
      ("Commit", ctx.commit.as_str()),
      ("Date", ctx.date.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Self {
      fields,
      env: ctx.env.clone(),
    }
  }

  /// Add the fields of a target's build options.
  pub fn with_build_options(mut self, opts: &TargetOptions) -> Self {
    let path = opts.path.to_string_lossy().to_string();
    for (key, value) in [
      ("Target", opts.target.as_str()),
      ("Os", opts.os.as_str()),
      ("Arch", opts.arch.as_str()),
      ("Ext", opts.ext.as_str()),
      ("Name", opts.name.as_str()),
      ("Path", path.as_str()),
    ] {
      self.fields.insert(key.to_string(), value.to_string());
    }
    self
  }

  /// Overlay environment variables; existing keys are replaced.
  pub fn with_env<'a>(mut self, env: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
    for (key, value) in env {
      self.env.insert(key.clone(), value.clone());
    }
    self
  }

  /// Add extra named fields; existing fields with the same name are replaced.
  pub fn with_extra_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    for (key, value) in fields {
      self.fields.insert(key.into(), value.into());
    }
    self
  }

  /// Expand every expression in `input`.
  ///
  /// # Errors
  ///
  /// Returns a [`TemplateError`] on malformed or unresolved expressions.
  pub fn apply(&self, input: &str) -> Result<String, TemplateError> {
    substitute(input, self)
  }
}

impl Resolver for Template {
  fn resolve_field(&self, name: &str) -> Result<&str, TemplateError> {
    self
      .fields
      .get(name)
      .map(|s| s.as_str())
      .ok_or_else(|| TemplateError::UnresolvedField(name.to_string()))
  }

  fn resolve_env(&self, key: &str) -> Result<&str, TemplateError> {
    self
      .env
      .get(key)
      .map(|s| s.as_str())
      .ok_or_else(|| TemplateError::UnresolvedEnv(key.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::path::PathBuf;

  use crate::config::Project;

  struct TestResolver {
    fields: HashMap<String, String>,
    env: HashMap<String, String>,
  }

  impl TestResolver {
    fn new() -> Self {
      Self {
        fields: HashMap::new(),
        env: HashMap::new(),
      }
    }

    fn with_field(mut self, name: &str, value: &str) -> Self {
      self.fields.insert(name.to_string(), value.to_string());
      self
    }

    fn with_env(mut self, key: &str, value: &str) -> Self {
      self.env.insert(key.to_string(), value.to_string());
      self
    }
  }

  impl Resolver for TestResolver {
    fn resolve_field(&self, name: &str) -> Result<&str, TemplateError> {
      self
        .fields
        .get(name)
        .map(|s| s.as_str())
        .ok_or_else(|| TemplateError::UnresolvedField(name.to_string()))
    }

    fn resolve_env(&self, key: &str) -> Result<&str, TemplateError> {
      self
        .env
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| TemplateError::UnresolvedEnv(key.to_string()))
    }
  }

  mod parsing {
    use super::*;

    #[test]
    fn plain_text_is_single_literal() {
      assert_eq!(parse("hello").unwrap(), vec![Segment::Literal("hello".to_string())]);
    }

    #[test]
    fn empty_input_has_no_segments() {
      assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn whitespace_inside_braces_is_ignored() {
      assert_eq!(
        parse("{{.Os}}{{   .Arch  }}").unwrap(),
        vec![
          Segment::Placeholder(Placeholder::Field("Os".to_string())),
          Segment::Placeholder(Placeholder::Field("Arch".to_string())),
        ]
      );
    }

    #[test]
    fn shell_variables_pass_through() {
      assert_eq!(
        parse("echo ${HOME} $PATH {").unwrap(),
        vec![Segment::Literal("echo ${HOME} $PATH {".to_string())]
      );
    }

    #[test]
    fn unclosed_expression_reports_position() {
      assert_eq!(parse("ab{{ .Os").unwrap_err(), TemplateError::Unclosed(2));
    }

    #[test]
    fn missing_dot_is_malformed() {
      assert!(matches!(parse("{{ Os }}"), Err(TemplateError::Malformed(_))));
    }

    #[test]
    fn unknown_namespace_is_malformed() {
      assert!(matches!(parse("{{ .Git.Tag }}"), Err(TemplateError::Malformed(_))));
    }

    #[test]
    fn empty_env_key_is_malformed() {
      assert!(matches!(parse("{{ .Env. }}"), Err(TemplateError::Malformed(_))));
    }
  }

  mod substitution {
    use super::*;

    #[test]
    fn substitutes_fields_and_env() {
      let resolver = TestResolver::new().with_field("Os", "linux").with_env("CC", "clang");

      let result = substitute("{{ .Os }}/{{ .Env.CC }}", &resolver).unwrap();

      assert_eq!(result, "linux/clang");
    }

    #[test]
    fn unresolved_field_fails() {
      let resolver = TestResolver::new();

      let err = substitute("{{ .Missing }}", &resolver).unwrap_err();

      assert_eq!(err, TemplateError::UnresolvedField("Missing".to_string()));
    }

    #[test]
    fn unresolved_env_fails() {
      let resolver = TestResolver::new();

      let err = substitute("{{ .Env.NOPE }}", &resolver).unwrap_err();

      assert_eq!(err, TemplateError::UnresolvedEnv("NOPE".to_string()));
    }
  }

  mod context {
    use super::*;

    fn ctx() -> Context {
      let project = Project {
        project_name: "tool".to_string(),
        ..Default::default()
      };
      Context::new(project, PathBuf::from("/work"))
        .with_env(BTreeMap::from([("GOFLAGS".to_string(), "-mod=mod".to_string())]))
        .with_version("1.2.3")
    }

    #[test]
    fn run_fields_resolve() {
      let template = Template::new(&ctx());

      assert_eq!(template.apply("{{ .ProjectName }}-{{ .Version }}").unwrap(), "tool-1.2.3");
    }

    #[test]
    fn build_options_resolve() {
      let opts = TargetOptions {
        target: "linux_arm64".to_string(),
        os: "linux".to_string(),
        arch: "arm64".to_string(),
        ext: String::new(),
        name: "tool".to_string(),
        path: PathBuf::from("/work/dist/tool_linux_arm64/tool"),
      };

      let template = Template::new(&ctx()).with_build_options(&opts);

      assert_eq!(
        template.apply("{{ .Name }}_{{ .Os }}_{{ .Arch }} -> {{ .Path }}").unwrap(),
        "tool_linux_arm64 -> /work/dist/tool_linux_arm64/tool"
      );
    }

    #[test]
    fn env_overlay_overrides_base() {
      let overlay = BTreeMap::from([("GOFLAGS".to_string(), "-trimpath".to_string())]);

      let template = Template::new(&ctx()).with_env(&overlay);

      assert_eq!(template.apply("{{ .Env.GOFLAGS }}").unwrap(), "-trimpath");
    }

    #[test]
    fn extra_fields_override_run_fields() {
      let template = Template::new(&ctx()).with_extra_fields([("Version", "v0.1.0"), ("Proxy", "example.com/x")]);

      assert_eq!(template.apply("{{ .Proxy }}@{{ .Version }}").unwrap(), "example.com/x@v0.1.0");
    }
  }
}
