#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]
//! Integration tests for the `adopt` command.

mod common;

use common::{TestEnv, snapshot};
use dotlink::cli::AdoptOpts;
use dotlink::commands::adopt;
use dotlink::logging::EntryStatus;

const NVIM: &[&str] = &[
    ".config/nvim/init.lua",
    ".config/nvim/lua/keys.lua",
    ".config/nvim/lua/opts.lua",
    ".config/nvim/lua/lsp.lua",
    ".config/nvim/lua/ui.lua",
];

/// Five-file bundle with the first four linked by hand.
fn partially_linked() -> TestEnv {
    let env = TestEnv::new().bundle("nvim", NVIM).bundle("tmux", &[".tmux.conf"]);
    for rel in &NVIM[..4] {
        env.link_by_hand("nvim", rel);
    }
    env
}

#[test]
fn adopt_records_fully_linked_bundles_only() {
    let env = TestEnv::new()
        .bundle("zsh", &[".zshrc", ".zprofile"])
        .bundle("tmux", &[".tmux.conf"]);
    env.link_by_hand("zsh", ".zshrc");
    env.link_by_hand("zsh", ".zprofile");
    let log = env.logger();

    let opts = AdoptOpts {
        force: false,
        dry_run: false,
    };
    adopt::run_with(&env.setup(), &opts, &log).expect("adopt");

    let state = env.state();
    assert!(state.is_managed("zsh"));
    assert!(!state.is_managed("tmux"));
    assert_eq!(state.symlink_counts.get("zsh"), Some(&2));

    let entries = log.entries();
    let tmux = entries.iter().find(|e| e.name == "tmux").unwrap();
    assert_eq!(tmux.status, EntryStatus::Skipped);
}

#[test]
fn adopt_skips_partially_linked_bundle_without_force() {
    let env = partially_linked();
    let log = env.logger();

    let opts = AdoptOpts {
        force: false,
        dry_run: false,
    };
    adopt::run_with(&env.setup(), &opts, &log).expect("adopt");

    // Nothing adopted, so no state file is written.
    assert!(!env.store().exists());
    let entries = log.entries();
    let nvim = entries.iter().find(|e| e.name == "nvim").unwrap();
    assert_eq!(nvim.status, EntryStatus::Skipped);
    assert_eq!(
        nvim.message.as_deref(),
        Some("partially linked (4/5 linked), use --force")
    );
}

#[test]
fn adopt_force_records_partially_linked_bundle_without_linking() {
    let env = partially_linked();
    let before = snapshot(&env.home());

    let opts = AdoptOpts {
        force: true,
        dry_run: false,
    };
    adopt::run_with(&env.setup(), &opts, &env.logger()).expect("adopt --force");

    let state = env.state();
    assert!(state.is_managed("nvim"));
    assert!(!state.is_managed("tmux"));
    assert_eq!(state.symlink_counts.get("nvim"), Some(&5));
    // The missing fifth link is left for `sync` to create.
    assert_eq!(snapshot(&env.home()), before);
    assert!(!env.is_link(NVIM[4]));
}

#[test]
fn adopt_dry_run_writes_no_state() {
    let env = partially_linked();

    let opts = AdoptOpts {
        force: true,
        dry_run: true,
    };
    adopt::run_with(&env.setup(), &opts, &env.logger()).expect("adopt --dry-run");

    assert!(!env.store().exists());
}
