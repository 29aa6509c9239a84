//! Chat Backup Exporter - Turn a messaging-app device backup into a static,
//! browsable set of chat documents.
//!
//! The tool reads a backup snapshot's manifest and `SQLite` databases,
//! renders every conversation through HTML templates and copies the
//! referenced media alongside, producing one folder per account plus a
//! top-level index.

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{ExportConfig, Exporter};
use cli::{parse_selectors, Cli, Commands};
use domain::{AppConfig, ExportNotifier};
use infrastructure::{ensure_config_exists, SqliteBackupReader};

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config = match &cli.config {
        Some(path) => infrastructure::config::load_config_from_file(path)?,
        None => infrastructure::load_config()?,
    };

    match cli.command {
        Commands::Export {
            backup,
            output,
            work_dir,
            extension,
            template_set,
            select,
            text_mode,
            newest_first,
            files_in_session,
            no_avatars,
            no_emoji,
            raw_markup,
            workers,
        } => cmd_export(
            &config,
            ExportArgs {
                backup,
                output,
                work_dir,
                extension,
                template_set,
                select,
                text_mode,
                newest_first,
                files_in_session,
                no_avatars,
                no_emoji,
                raw_markup,
                workers,
            },
        ),
        Commands::Preview { backup } => cmd_preview(&config, &backup),
        Commands::InitConfig => {
            ensure_config_exists()?;
            println!(
                "{} Config at {}",
                "✓".green().bold(),
                AppConfig::default_data_dir().join("config.toml").display()
            );
            Ok(())
        }
    }
}

struct ExportArgs {
    backup: PathBuf,
    output: PathBuf,
    work_dir: Option<PathBuf>,
    extension: Option<String>,
    template_set: Option<String>,
    select: Vec<String>,
    text_mode: bool,
    newest_first: bool,
    files_in_session: bool,
    no_avatars: bool,
    no_emoji: bool,
    raw_markup: bool,
    workers: Option<usize>,
}

/// Progress reporting on the terminal.
struct ConsoleNotifier;

impl ExportNotifier for ConsoleNotifier {
    fn on_start(&self) {
        println!("{}", "Export started.".bold());
    }

    fn on_progress(&self, done: u32, total: u32) {
        println!("{} Account {done}/{total} finished", "✓".green());
    }

    fn on_complete(&self, cancelled: bool) {
        if cancelled {
            println!("{}", "Export cancelled.".yellow().bold());
        } else {
            println!("{}", "Export finished.".green().bold());
        }
    }
}

/// Run a full export.
fn cmd_export(app_config: &AppConfig, args: ExportArgs) -> domain::Result<()> {
    let work_dir = args.work_dir.unwrap_or_else(|| app_config.work_dir());

    let mut config = ExportConfig::new(work_dir, args.backup, args.output);
    config.extension = args
        .extension
        .unwrap_or_else(|| app_config.export.extension.clone());
    config.template_set = args
        .template_set
        .unwrap_or_else(|| app_config.export.template_set.clone());
    config.download_workers = args.workers.unwrap_or(app_config.export.download_workers);
    config.filter = parse_selectors(&args.select);

    let reader = SqliteBackupReader::new(&config.backup_dir, app_config.backup.clone());

    let mut exporter = Exporter::new(config, Arc::new(reader));
    exporter.set_notifier(Arc::new(ConsoleNotifier))?;
    exporter.set_text_mode(args.text_mode)?;
    exporter.set_order(!args.newest_first)?;
    exporter.set_files_in_session(args.files_in_session)?;
    exporter.set_skip_avatars(args.no_avatars)?;
    exporter.set_skip_emoji(args.no_emoji)?;
    exporter.set_raw_markup(args.raw_markup)?;

    exporter.start()?;
    exporter.wait_for_completion();

    Ok(())
}

/// List accounts and conversations without exporting.
fn cmd_preview(app_config: &AppConfig, backup: &std::path::Path) -> domain::Result<()> {
    let config = ExportConfig::new(app_config.work_dir(), backup, ".");
    let reader = SqliteBackupReader::new(backup, app_config.backup.clone());
    let exporter = Exporter::new(config, Arc::new(reader));

    let preview = exporter.load_preview()?;

    for (account, conversations) in &preview {
        println!();
        println!("{} ({})", account.label().bold(), account.id.dimmed());

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Conversation", "Messages", "Last activity", ""]);

        for conversation in conversations {
            let last = conversation
                .last_message_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let kind = if conversation.subscription {
                "subscription"
            } else {
                ""
            };
            table.add_row(vec![
                conversation.label().to_string(),
                conversation.record_count.to_string(),
                last,
                kind.to_string(),
            ]);
        }

        println!("{table}");
    }

    println!();
    println!("Total: {} account(s)", preview.len());

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
