use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI entry point for the dotfiles link manager.
#[derive(Parser, Debug)]
#[command(
    name = "dotlink",
    about = "Link dotfiles bundles into your home directory and keep them in sync",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Dotfiles repository root (default: $DOTFILES_DIR, then the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Home directory to link into (default: $HOME)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Process bundles one at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,

    /// Maximum number of bundles processed at once
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Link or unlink individual bundles
    Stow(StowOpts),
    /// Bring managed bundles back in line with the repository
    Sync(SyncOpts),
    /// Record bundles that are already linked by hand as managed
    Adopt(AdoptOpts),
    /// Report drift without changing anything
    Status(StatusOpts),
    /// Remove every managed link and forget all state
    Uninstall(UninstallOpts),
    /// Print version information
    Version,
}

/// How destination conflicts are resolved.
#[derive(Args, Debug, Clone, Default)]
pub struct ConflictOpts {
    /// Move conflicting files aside (`<name>.dotlink.bak`) and link over them
    #[arg(long, conflicts_with = "interactive")]
    pub backup: bool,

    /// Ask what to do about each conflict
    #[arg(short, long)]
    pub interactive: bool,
}

/// Options for the `stow` subcommand.
#[derive(Args, Debug)]
pub struct StowOpts {
    #[command(subcommand)]
    pub action: StowAction,
}

/// `stow` actions.
#[derive(Subcommand, Debug)]
pub enum StowAction {
    /// Link bundles and start managing them
    Add(StowAddOpts),
    /// Unlink bundles and stop managing them
    Remove(StowRemoveOpts),
    /// Relink every managed bundle
    Refresh(StowRefreshOpts),
}

/// Options for `stow add`.
#[derive(Args, Debug, Clone)]
pub struct StowAddOpts {
    /// Bundles to link
    #[arg(required = true)]
    pub bundles: Vec<String>,

    #[command(flatten)]
    pub conflicts: ConflictOpts,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for `stow remove`.
#[derive(Args, Debug, Clone)]
pub struct StowRemoveOpts {
    /// Bundles to unlink
    #[arg(required = true)]
    pub bundles: Vec<String>,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for `stow refresh`.
#[derive(Args, Debug, Clone)]
pub struct StowRefreshOpts {
    #[command(flatten)]
    pub conflicts: ConflictOpts,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for the `sync` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SyncOpts {
    /// Only sync this bundle
    pub bundle: Option<String>,

    #[command(flatten)]
    pub conflicts: ConflictOpts,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for the `adopt` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AdoptOpts {
    /// Also adopt partially linked bundles
    #[arg(short, long)]
    pub force: bool,

    /// Show what would be adopted without saving
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for the `status` subcommand.
#[derive(Args, Debug, Clone)]
pub struct StatusOpts {
    /// Compare cached file counts only; never inspect destinations
    #[arg(short, long)]
    pub quick: bool,
}

/// Options for the `uninstall` subcommand.
#[derive(Args, Debug, Clone)]
pub struct UninstallOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

impl Command {
    /// Short name used for the log file.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match self {
            Self::Stow(_) => "stow",
            Self::Sync(_) => "sync",
            Self::Adopt(_) => "adopt",
            Self::Status(_) => "status",
            Self::Uninstall(_) => "uninstall",
            Self::Version => "version",
        }
    }
}
