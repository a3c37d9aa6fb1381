//! tinybackup - Main entry point
//!
//! Schedules, inspects, removes and runs self-rearming backup jobs.

use anyhow::Context as _;
use clap::Parser;
use std::process::ExitCode;
use tinybackup::app::{App, Outcome};
use tinybackup::cli::Args;
use tinybackup::executor::LogrotateExecutor;
use tinybackup::queue::at::AtQueue;
use tinybackup::{utils, Config, Context, TinyBackupError};

fn main() -> ExitCode {
    match try_main() {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("{}: {:#}", tinybackup::app::PROGRAM_NAME, e);
            let code = e
                .downcast_ref::<TinyBackupError>()
                .map(TinyBackupError::exit_code)
                .unwrap_or(3);
            ExitCode::from(code)
        }
    }
}

fn try_main() -> anyhow::Result<Outcome> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.log.level.as_str() };
    utils::logger::init(log_level)?;
    tracing::debug!(?args, "Parsed arguments");

    let config_path = args
        .config
        .as_deref()
        .map(tinybackup::fs::resolve)
        .transpose()?;
    let ctx = Context::new(config, config_path, args.debug, args.noop);

    let queue = AtQueue::new(&ctx.config.queue.at_binary, ctx.queue_name());
    let rotator = LogrotateExecutor::new(&ctx.config.rotation.logrotate_binary);
    let app = App::new(&ctx, &queue, &rotator);
    app.verify()?;

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let invocation = args.into_invocation(ctx.config.rotation.default_keep_revisions, &cwd)?;

    let mut stdout = std::io::stdout().lock();
    let outcome = app.execute(&invocation, &mut stdout)?;
    Ok(outcome)
}
