//! Go builder.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Builder;
use crate::build::TargetOptions;
use crate::config::{BuildDefinition, ConfigError};
use crate::context::Context;
use crate::execute::{ExecuteError, run_command};
use crate::template::Template;

/// `GOOS_GOARCH` pairs accepted by the Go toolchain.
pub const VALID_TARGETS: &[&str] = &[
  "aix_ppc64",
  "android_386",
  "android_amd64",
  "android_arm",
  "android_arm64",
  "darwin_amd64",
  "darwin_arm64",
  "dragonfly_amd64",
  "freebsd_386",
  "freebsd_amd64",
  "freebsd_arm",
  "freebsd_arm64",
  "illumos_amd64",
  "js_wasm",
  "linux_386",
  "linux_amd64",
  "linux_arm",
  "linux_arm64",
  "linux_mips",
  "linux_mips64",
  "linux_mips64le",
  "linux_mipsle",
  "linux_ppc64",
  "linux_ppc64le",
  "linux_riscv64",
  "linux_s390x",
  "netbsd_386",
  "netbsd_amd64",
  "netbsd_arm",
  "netbsd_arm64",
  "openbsd_386",
  "openbsd_amd64",
  "openbsd_arm",
  "openbsd_arm64",
  "plan9_386",
  "plan9_amd64",
  "plan9_arm",
  "solaris_amd64",
  "windows_386",
  "windows_amd64",
  "windows_arm",
  "windows_arm64",
];

const DEFAULT_LDFLAGS: &str = "-s -w -X main.version={{ .Version }} -X main.commit={{ .Commit }} -X main.date={{ .Date }}";

/// Builds Go binaries with `go build`, cross-compiling through `GOOS`/`GOARCH`.
#[derive(Debug, Default)]
pub struct GoBuilder;

impl GoBuilder {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl Builder for GoBuilder {
  fn name(&self) -> &'static str {
    "go"
  }

  fn with_defaults(&self, mut build: BuildDefinition) -> Result<BuildDefinition, ConfigError> {
    if build.gobinary.is_empty() {
      build.gobinary = "go".to_string();
    }
    if build.main.is_empty() {
      build.main = ".".to_string();
    }
    if build.dir.is_empty() {
      build.dir = ".".to_string();
    }
    if build.ldflags.is_empty() {
      build.ldflags = vec![DEFAULT_LDFLAGS.to_string()];
    }
    if build.goos.is_empty() {
      build.goos = vec!["linux".to_string(), "darwin".to_string()];
    }
    if build.goarch.is_empty() {
      build.goarch = vec!["amd64".to_string(), "386".to_string()];
    }
    if build.goarm.is_empty() {
      build.goarm = vec!["6".to_string()];
    }
    if build.targets.is_empty() {
      build.targets = matrix(&build);
    }
    if build.targets.is_empty() && !build.skip {
      return Err(ConfigError::InvalidBuild {
        lang: self.name().to_string(),
        id: build.id,
        message: "no valid goos/goarch combination".to_string(),
      });
    }
    Ok(build)
  }

  async fn build(&self, ctx: &Context, build: &BuildDefinition, options: &TargetOptions) -> Result<(), ExecuteError> {
    let target = GoTarget::parse(&options.target).ok_or_else(|| ExecuteError::Builder {
      lang: self.name().to_string(),
      message: format!("invalid target '{}', expected GOOS_GOARCH[_GOARM]", options.target),
    })?;

    let template = Template::new(ctx).with_build_options(options).with_env(&build.env);

    let mut argv = vec![build.gobinary.clone(), "build".to_string()];
    for flag in &build.flags {
      argv.push(template.apply(flag)?);
    }
    if !build.ldflags.is_empty() {
      let ldflags = build
        .ldflags
        .iter()
        .map(|flag| template.apply(flag))
        .collect::<Result<Vec<_>, _>>()?;
      argv.push(format!("-ldflags={}", ldflags.join(" ")));
    }
    argv.push("-o".to_string());
    argv.push(options.path.to_string_lossy().to_string());
    argv.push(build.main.clone());

    let mut env = ctx.env.clone();
    env.extend(build.env.clone());
    env.insert("GOOS".to_string(), target.goos.to_string());
    env.insert("GOARCH".to_string(), target.goarch.to_string());
    if let Some(goarm) = target.goarm {
      env.insert("GOARM".to_string(), goarm.to_string());
    }

    debug!(id = %build.id, target = %options.target, "invoking go build");
    run_command(&argv, &env, Some(&ctx.resolve_dir(&build.dir)), &ctx.cancel).await?;
    Ok(())
  }
}

/// Expand goos × goarch (× goarm for arm) into valid target identifiers.
fn matrix(build: &BuildDefinition) -> Vec<String> {
  let mut targets = Vec::new();
  for goos in &build.goos {
    for goarch in &build.goarch {
      let pair = format!("{goos}_{goarch}");
      if !VALID_TARGETS.contains(&pair.as_str()) {
        warn!(id = %build.id, target = %pair, "skipping invalid build target");
        continue;
      }
      if goarch == "arm" {
        targets.extend(build.goarm.iter().map(|goarm| format!("{pair}_{goarm}")));
      } else {
        targets.push(pair);
      }
    }
  }
  targets
}

#[derive(Debug, PartialEq, Eq)]
struct GoTarget<'a> {
  goos: &'a str,
  goarch: &'a str,
  goarm: Option<&'a str>,
}

impl<'a> GoTarget<'a> {
  fn parse(target: &'a str) -> Option<Self> {
    let mut parts = target.split('_');
    let goos = parts.next().filter(|s| !s.is_empty())?;
    let goarch = parts.next().filter(|s| !s.is_empty())?;
    let goarm = parts.next();
    if parts.next().is_some() {
      return None;
    }
    Some(Self { goos, goarch, goarm })
  }
}
