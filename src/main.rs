//! jake - a make-style build tool
//!
//! Loads `Jakefile.toml`, then invokes the named tasks (or the default
//! task), rebuilding only what is out of date.

use std::process::ExitCode;

use clap::Parser;
use console::style;

use jake::application::Application;
use jake::cli::Cli;
use jake::error::Result;
use jake::watch;

fn main() -> ExitCode {
    // Set up panic handler for nice error messages
    miette::set_panic_hook();

    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(cli.log_directive().parse().unwrap_or_else(|_| tracing::Level::WARN.into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:?}", style("error").red().bold(), miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }

    let mut app = Application::new(cli.options());
    app.load()?;

    if let Some(listing) = cli.listing() {
        print!("{}", app.task_listing(listing));
        return Ok(());
    }

    if cli.watch {
        return watch::watch_and_run(&mut app, &cli.targets);
    }

    app.run(&cli.targets)
}
