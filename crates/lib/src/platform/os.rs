use std::fmt;

/// Operating systems with a Go `GOOS` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  Darwin,
  Windows,
  FreeBsd,
  NetBsd,
  OpenBsd,
}

impl Os {
  /// The operating system this process runs on.
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::OS)
  }

  /// Map a Rust `target_os` name to its `GOOS` counterpart.
  pub fn from_rust(os: &str) -> Option<Self> {
    match os {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      "netbsd" => Some(Self::NetBsd),
      "openbsd" => Some(Self::OpenBsd),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
      Self::Windows => "windows",
      Self::FreeBsd => "freebsd",
      Self::NetBsd => "netbsd",
      Self::OpenBsd => "openbsd",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn macos_is_darwin() {
    assert_eq!(Os::from_rust("macos"), Some(Os::Darwin));
    assert_eq!(Os::Darwin.as_str(), "darwin");
  }

  #[test]
  fn unknown_os_is_none() {
    assert_eq!(Os::from_rust("haiku"), None);
  }
}
