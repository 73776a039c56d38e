use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use shared::{domain::ModelField, protocol::topics};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod model;
mod ui;

use config::{load_settings, resolve_log_filter};
use controller::Controller;
use ui::{InputOutcome, ViewError};

#[derive(Parser, Debug)]
#[command(name = "mvc-template", about = "MVC template wired through a pub/sub messenger")]
struct Args {
    /// TOML settings file (defaults to ./mvc.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tracing filter, e.g. "debug" or "messenger=trace".
    #[arg(long)]
    log_filter: Option<String>,
    /// Controller subscribes to no topics.
    #[arg(long)]
    bare: bool,
    /// Run these view commands instead of reading stdin.
    #[arg(long = "exec", value_name = "CMD")]
    exec: Vec<String>,
    /// Print the topic catalogue and exit.
    #[arg(long)]
    list_topics: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_topics {
        print_topics();
        return Ok(());
    }

    let loaded = load_settings(args.config.as_deref())?;
    let mut settings = loaded.settings;
    settings.apply_cli(args.bare);

    let filter = resolve_log_filter(
        args.log_filter.clone(),
        std::env::var("RUST_LOG").ok(),
        &settings,
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&filter).with_context(|| format!("invalid log filter '{filter}'"))?,
        )
        .init();

    for key in &loaded.ignored_env {
        warn!(key, "ignoring invalid environment override");
    }

    let app = Controller::new(&settings, io::stdout()).context("failed to build controller")?;
    app.init();

    if args.exec.is_empty() {
        run_interactive(&app)?;
    } else {
        run_script(&app, &args.exec)?;
    }

    log_summary(&app);
    Ok(())
}

fn log_summary(app: &Controller<io::Stdout>) {
    let model = app.model();
    let view = app.view();
    let history = app.history();
    info!(
        visible = view.is_visible(),
        variable1 = model.value(ModelField::Variable1),
        variable2 = model.value(ModelField::Variable2),
        shown1 = ?view.displayed(ModelField::Variable1),
        shown2 = ?view.displayed(ModelField::Variable2),
        toggled = view.is_toggled(),
        topics = ?app.messenger().topics(),
        messages_logged = history.len(),
        last_message = history.last().map(String::as_str).unwrap_or("-"),
        "session finished"
    );
}

fn run_script(app: &Controller<io::Stdout>, commands: &[String]) -> Result<()> {
    for command in commands {
        let outcome = app
            .view()
            .handle_input(command)
            .with_context(|| format!("command '{command}' failed"))?;
        if outcome == InputOutcome::Quit {
            break;
        }
    }
    Ok(())
}

fn run_interactive(app: &Controller<io::Stdout>) -> Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        match app.view().handle_input(&line) {
            Ok(InputOutcome::Continue) => {}
            Ok(InputOutcome::Quit) => break,
            Err(err @ (ViewError::UnknownCommand(_) | ViewError::InvalidArgument { .. })) => {
                eprintln!("{err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn print_topics() {
    for spec in topics::CATALOGUE {
        let payload = spec
            .payload
            .map(|kind| kind.as_str())
            .unwrap_or("none");
        println!(
            "{:<26} {:<11} {:<7} {}",
            spec.topic,
            spec.sender.as_str(),
            payload,
            spec.summary
        );
    }
}
