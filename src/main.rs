mod audit;
mod cli;
mod commands;
mod config;
mod error;
mod progress;
mod ssh;
mod tasks;
mod ui;

use anyhow::Result;
use audit::{AuditLog, AuditStatus};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::Context;
use config::Settings;
use playbook::StepKind;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            return error::classify(&e).exit_code();
        }
    };

    let audit = open_audit(&cli, &settings);
    let audit_id = audit.as_ref().and_then(|audit_log| {
        let args: Vec<String> = std::env::args().collect();
        audit_log
            .begin(&args)
            .map_err(|e| log::warn!("Failed to record invocation: {e:#}"))
            .ok()
    });

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        yes: cli.yes,
        hosts_path: cli.hosts,
        topology_path: cli.topology,
        settings,
    };

    let result = dispatch(&ctx, cli.command);

    let (status, code, exit) = match &result {
        Ok(()) => (AuditStatus::Success, None, ExitCode::SUCCESS),
        Err(e) => {
            let class = error::classify(e);
            if class.status == AuditStatus::Cancel {
                ui::warn(&e.to_string());
            } else {
                ui::error(&format!("{e:#}"));
            }
            (class.status, class.code, class.exit_code())
        }
    };

    if let (Some(audit_log), Some(id)) = (&audit, audit_id)
        && let Err(e) = audit_log.finish(id, status, code)
    {
        log::warn!("Failed to record invocation result: {e:#}");
    }
    exit
}

/// Audit database, unless disabled or the command only reads locally
fn open_audit(cli: &Cli, settings: &Settings) -> Option<AuditLog> {
    let local_only = matches!(
        cli.command,
        Command::Audit { .. } | Command::Completions { .. }
    );
    if !settings.audit.enabled || local_only {
        return None;
    }
    AuditLog::open(&settings.audit_path())
        .map_err(|e| log::warn!("Audit trail unavailable: {e:#}"))
        .ok()
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Precheck(filter) => commands::precheck::run(ctx, &filter),
        Command::Deploy(filter) => commands::deploy::run(ctx, &filter),
        Command::Start(filter) => commands::lifecycle::run(ctx, &filter, StepKind::StartService),
        Command::Stop(filter) => commands::lifecycle::run(ctx, &filter, StepKind::StopService),
        Command::Restart(filter) => {
            commands::lifecycle::run(ctx, &filter, StepKind::RestartService)
        }
        Command::Upgrade(filter) => commands::upgrade::run(ctx, &filter),
        Command::Clean(args) => commands::clean::run(ctx, &args),
        Command::Status(filter) => commands::status::run(ctx, &filter),
        Command::Exec(args) => commands::exec::run(ctx, &args),
        Command::Enter { id } => commands::enter::run(ctx, &id),
        Command::Client(cmd) => commands::client::run(ctx, &cmd),
        Command::Monitor(cmd) => commands::monitor::run(ctx, &cmd),
        Command::Hosts(cmd) => commands::hosts::run(ctx, &cmd),
        Command::Audit { limit } => commands::audit::run(ctx, limit),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "clusteradm", &mut io::stdout());
            Ok(())
        }
    }
}
