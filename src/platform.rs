//! Platform detection: operating system, Linux distribution, package manager.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux (and other Unix-likes that are not macOS).
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Macos => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Package managers recognised in the platform snapshot, in detection order.
const PACKAGE_MANAGERS: &[&str] = &["pacman", "apt", "dnf", "zypper", "brew", "winget"];

/// Platform information for the current system.
///
/// Recorded verbatim in the state file so a later run can tell which machine
/// wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// Distribution identifier from `/etc/os-release` (`ID=`), Linux only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<String>,
    /// First package manager found on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        let os = Self::detect_os();
        let distro = if os == Os::Linux {
            std::fs::read_to_string("/etc/os-release")
                .ok()
                .and_then(|content| parse_os_release_id(&content))
        } else {
            None
        };
        let package_manager = PACKAGE_MANAGERS
            .iter()
            .find(|pm| which::which(pm).is_ok())
            .map(|pm| (*pm).to_string());
        Self {
            os,
            distro,
            package_manager,
        }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self {
            os,
            distro: None,
            package_manager: None,
        }
    }

    /// Whether a bundle restricted to `platforms` applies here.
    ///
    /// An empty list means "every platform".  Entries are matched
    /// case-insensitively against the OS name and the distro identifier.
    #[must_use]
    pub fn matches(&self, platforms: &[String]) -> bool {
        if platforms.is_empty() {
            return true;
        }
        let os = self.os.to_string();
        platforms.iter().any(|p| {
            p.eq_ignore_ascii_case(&os)
                || self
                    .distro
                    .as_deref()
                    .is_some_and(|d| p.eq_ignore_ascii_case(d))
        })
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else {
            Os::Linux
        }
    }
}

/// Extract the `ID=` value from `/etc/os-release` content.
fn parse_os_release_id(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ID=")?;
        let value = value.trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_ascii_lowercase())
    })
}
