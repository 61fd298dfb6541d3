//! Dotfiles link manager.
//!
//! Maps declared configuration bundles from a dotfiles repository onto
//! symbolic links in the home directory, detects drift between the two, and
//! tracks which bundles are managed so that every run is safe to repeat.
//!
//! The public API is organised into layers:
//!
//! - **[`paths`]**: expand `~` / `$DOTFILES` path expressions safely
//! - **[`config`]**: load declared bundles from `conf/bundles.toml`
//! - **[`resources`]**: single-link primitives (create, remove, back up)
//! - **[`reconcile`]**: inspection, drift, adoption, conflicts, and stowing
//! - **[`state`]**: the persisted record of managed bundles
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod platform;
pub mod reconcile;
pub mod resources;
pub mod state;
