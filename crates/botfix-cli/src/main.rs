use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use botfix_cli::runner::default_jobs;
use botfix_cli::{run, CliOptions, HumanReporter, JsonReporter, Reporter};
use botfix_core::{init_tracing, init_tracing_with, BotfixConfig};
use clap::{Arg, ArgAction, Command};

fn command() -> Command {
    Command::new("botfix")
        .version(botfix_core::VERSION)
        .about("Find and repair structural mistakes in decorator-driven Python bots")
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("File or directory to analyze")
                .default_value(".")
                .index(1),
        )
        .arg(
            Arg::new("bot-var")
                .long("bot-var")
                .value_name("NAME")
                .help("Name of the variable holding the bot instance"),
        )
        .arg(
            Arg::new("bot-subclass")
                .long("bot-subclass")
                .value_name("CLASS")
                .help("Custom bot class whose instances mark the bot variable"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file"),
        )
        .arg(
            Arg::new("snippet")
                .long("snippet")
                .help("Treat files as fragments without startup code")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fix")
                .long("fix")
                .help("Write repairs back to the files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-backup")
                .long("no-backup")
                .help("Do not keep a .orig copy of fixed files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit JSON instead of text")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .value_name("N")
                .help("Number of files analyzed concurrently")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("List the roles found in every file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = command().get_matches();

    // Initialize logging
    if matches.get_flag("debug") {
        init_tracing_with("botfix_core=debug,botfix_cli=debug");
    } else {
        init_tracing();
    }

    // Extract command line options
    let mut config = match matches.get_one::<String>("config") {
        Some(file) => BotfixConfig::from_json_file(Path::new(file))
            .with_context(|| format!("Failed to load configuration from {file}"))?,
        None => BotfixConfig::default(),
    };
    if let Some(name) = matches.get_one::<String>("bot-var") {
        config = config.with_bot_variable(name.clone());
    }
    if let Some(class) = matches.get_one::<String>("bot-subclass") {
        config = config.with_bot_subclass(class.clone());
    }

    let path = matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let options = CliOptions {
        path,
        config,
        snippet: matches.get_flag("snippet"),
        fix: matches.get_flag("fix"),
        backup: !matches.get_flag("no-backup"),
        jobs: matches.get_one::<usize>("jobs").copied().unwrap_or_else(default_jobs),
    };

    let outcome = run(&options).await?;

    let reporter: Box<dyn Reporter> = if matches.get_flag("json") {
        Box::new(JsonReporter { pretty: true })
    } else {
        Box::new(HumanReporter::new(matches.get_flag("verbose")))
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    reporter.write_run(&mut out, &outcome.reports, &outcome.summary)?;
    out.flush()?;

    std::process::exit(outcome.exit_code());
}
