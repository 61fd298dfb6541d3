#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]
//! Integration tests for the `sync` and `status` commands.

mod common;

use common::{TestEnv, snapshot};
use dotlink::cli::{ConflictOpts, StatusOpts, StowAddOpts, SyncOpts};
use dotlink::commands::{status, stow, sync};
use dotlink::logging::EntryStatus;

fn stow_add(env: &TestEnv, bundles: &[&str]) {
    let opts = StowAddOpts {
        bundles: bundles.iter().map(ToString::to_string).collect(),
        conflicts: ConflictOpts::default(),
        dry_run: false,
    };
    stow::add(&env.setup(), &opts, &env.logger()).expect("stow add");
}

fn sync_opts() -> SyncOpts {
    SyncOpts {
        bundle: None,
        conflicts: ConflictOpts::default(),
        dry_run: false,
    }
}

#[test]
fn sync_links_new_files_and_prunes_dangling_links() {
    let env = TestEnv::new().bundle("zsh", &[".zshrc", ".zprofile"]);
    stow_add(&env, &["zsh"]);

    std::fs::remove_file(env.repo().join("zsh").join(".zprofile")).unwrap();
    env.write_source("zsh", ".zshenv", "env");

    sync::sync(&env.setup(), &sync_opts(), &env.logger()).expect("sync");

    assert!(env.is_link(".zshrc"));
    assert!(env.is_link(".zshenv"));
    assert!(!env.is_link(".zprofile"));
    assert_eq!(env.state().symlink_counts.get("zsh"), Some(&2));
}

#[test]
fn sync_prune_only_updates_recorded_count() {
    let env = TestEnv::new().bundle("git", &[".gitconfig", ".gitignore_global"]);
    stow_add(&env, &["git"]);
    std::fs::remove_file(env.repo().join("git").join(".gitignore_global")).unwrap();

    sync::sync(&env.setup(), &sync_opts(), &env.logger()).expect("sync");

    assert!(!env.is_link(".gitignore_global"));
    assert!(env.is_link(".gitconfig"));
    assert_eq!(env.state().symlink_counts.get("git"), Some(&1));
}

#[test]
fn sync_in_sync_bundle_changes_nothing() {
    let env = TestEnv::new().bundle("zsh", &[".zshrc"]);
    stow_add(&env, &["zsh"]);
    let before = snapshot(&env.home());
    let log = env.logger();

    sync::sync(&env.setup(), &sync_opts(), &log).expect("sync");

    assert_eq!(snapshot(&env.home()), before);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, EntryStatus::Ok);
}

#[test]
fn sync_ignores_unmanaged_bundles() {
    let env = TestEnv::new()
        .bundle("zsh", &[".zshrc"])
        .bundle("git", &[".gitconfig"]);
    stow_add(&env, &["zsh"]);

    sync::sync(&env.setup(), &sync_opts(), &env.logger()).expect("sync");

    assert!(!env.home_path(".gitconfig").exists());
    assert!(!env.state().is_managed("git"));
}

#[test]
fn sync_named_bundle_starts_managing_it() {
    let env = TestEnv::new().bundle("git", &[".gitconfig"]);
    let opts = SyncOpts {
        bundle: Some("git".to_string()),
        ..sync_opts()
    };

    sync::sync(&env.setup(), &opts, &env.logger()).expect("sync git");

    assert!(env.is_link(".gitconfig"));
    assert!(env.state().is_managed("git"));
}

#[test]
fn sync_dry_run_writes_nothing() {
    let env = TestEnv::new().bundle("zsh", &[".zshrc"]);
    stow_add(&env, &["zsh"]);
    env.write_source("zsh", ".zshenv", "env");
    let before = snapshot(&env.home());
    let state_before = std::fs::read_to_string(env.store().path()).unwrap();

    let opts = SyncOpts {
        dry_run: true,
        ..sync_opts()
    };
    sync::sync(&env.setup(), &opts, &env.logger()).expect("sync --dry-run");

    assert_eq!(snapshot(&env.home()), before);
    assert_eq!(
        std::fs::read_to_string(env.store().path()).unwrap(),
        state_before
    );
}

#[test]
fn status_never_mutates() {
    let env = TestEnv::new().bundle("zsh", &[".zshrc", ".zprofile"]);
    stow_add(&env, &["zsh"]);
    std::fs::remove_file(env.home_path(".zprofile")).unwrap();
    let before = snapshot(&env.home());
    let state_before = std::fs::read_to_string(env.store().path()).unwrap();

    for quick in [false, true] {
        status::status(&env.setup(), &StatusOpts { quick }, &env.logger()).expect("status");
    }

    assert_eq!(snapshot(&env.home()), before);
    assert_eq!(
        std::fs::read_to_string(env.store().path()).unwrap(),
        state_before
    );
}
