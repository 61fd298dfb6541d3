#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]
//! Integration tests for the command-line surface.
//!
//! These tests pin the subcommand tree so that renames and removals are
//! deliberate.

use clap::{CommandFactory, Parser};

use dotlink::cli::{Cli, Command, StowAction};

// ---------------------------------------------------------------------------
// Snapshot: subcommand tree
// ---------------------------------------------------------------------------

/// Snapshot of every subcommand path in declaration order.
///
/// Any addition, removal, or rename of a subcommand will cause this test to
/// fail, prompting a deliberate snapshot update.
#[test]
fn subcommand_names() {
    let cli = Cli::command();
    let mut names = Vec::new();
    for sub in cli.get_subcommands() {
        names.push(sub.get_name().to_string());
        for nested in sub.get_subcommands() {
            names.push(format!("{} {}", sub.get_name(), nested.get_name()));
        }
    }
    insta::assert_snapshot!("subcommand_names", names.join("\n"));
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn global_flags_apply_after_subcommand() {
    let cli = Cli::parse_from([
        "dotlink",
        "stow",
        "add",
        "zsh",
        "--root",
        "/tmp/dotfiles",
        "--home",
        "/tmp/home",
        "-j",
        "2",
        "-v",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.global.jobs, Some(2));
    assert_eq!(
        cli.global.root.as_deref(),
        Some(std::path::Path::new("/tmp/dotfiles"))
    );
    assert!(matches!(
        cli.command,
        Command::Stow(ref opts) if matches!(opts.action, StowAction::Add(_))
    ));
}

#[test]
fn zero_jobs_is_rejected() {
    assert!(Cli::try_parse_from(["dotlink", "-j", "0", "status"]).is_err());
}
