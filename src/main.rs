use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;

use dotlink::cli::{self, Command, StowOpts};
use dotlink::commands;
use dotlink::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return Ok(());
    }

    let command = args.command.log_name();
    logging::init_subscriber(args.verbose, command);
    let log = Arc::new(Logger::for_command(command));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let handler_cancel = Arc::clone(&cancel);
        let handler_log = Arc::clone(&log);
        if let Err(e) = ctrlc::set_handler(move || {
            handler_cancel.store(true, Ordering::SeqCst);
            handler_log.warn("interrupted: finishing bundles in progress, starting no new ones");
        }) {
            log.debug(&format!("cannot install Ctrl-C handler: {e}"));
        }
    }

    match &args.command {
        Command::Stow(StowOpts { action }) => commands::stow::run(&args.global, action, &log, &cancel),
        Command::Sync(opts) => commands::sync::run(&args.global, opts, &log, &cancel),
        Command::Adopt(opts) => commands::adopt::run(&args.global, opts, &log, &cancel),
        Command::Status(opts) => commands::status::run(&args.global, opts, &log, &cancel),
        Command::Uninstall(opts) => commands::uninstall::run(&args.global, opts, &log, &cancel),
        Command::Version => Ok(()),
    }
}
