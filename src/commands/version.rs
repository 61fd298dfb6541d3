//! Command: print version information.

/// Version string, preferring the build-time `DOTLINK_VERSION`.
#[must_use]
pub fn version_string() -> String {
    let version = option_env!("DOTLINK_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    format!("dotlink {version}")
}

/// Print the dotlink version to stdout.
pub fn run() {
    println!("{}", version_string());
}
