//! Host platform detection.
//!
//! Single-target runs build only for the machine they run on. The host is
//! named the way build targets are: `<GOOS>_<GOARCH>`.

pub mod arch;
pub mod os;

use std::fmt;

use arch::Arch;
use os::Os;

/// An operating system and CPU architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// Detect the current platform.
  ///
  /// Returns `None` if the OS or architecture has no Go name.
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Os::current()?,
      arch: Arch::current()?,
    })
  }

  /// Target identifier, e.g. `darwin_arm64`.
  pub fn target(&self) -> String {
    format!("{}_{}", self.os, self.arch)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.target())
  }
}

/// Target identifier of the host, if it has one.
pub fn host_target() -> Option<String> {
  Platform::current().map(|p| p.target())
}
