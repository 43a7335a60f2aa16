use std::fmt;

/// CPU architectures with a Go `GOARCH` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  Amd64,
  Arm64,
  I386,
  Arm,
  Riscv64,
}

impl Arch {
  /// The architecture this process runs on.
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::ARCH)
  }

  /// Map a Rust `target_arch` name to its `GOARCH` counterpart.
  pub fn from_rust(arch: &str) -> Option<Self> {
    match arch {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "x86" => Some(Self::I386),
      "arm" => Some(Self::Arm),
      "riscv64" => Some(Self::Riscv64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::I386 => "386",
      Self::Arm => "arm",
      Self::Riscv64 => "riscv64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rust_names_map_to_go_names() {
    assert_eq!(Arch::from_rust("x86_64"), Some(Arch::Amd64));
    assert_eq!(Arch::from_rust("aarch64"), Some(Arch::Arm64));
    assert_eq!(Arch::I386.as_str(), "386");
    assert_eq!(Arch::from_rust("sparc64"), None);
  }
}
