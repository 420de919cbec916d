//! Command-line entry point for the scheduler.
//!
//! # Responsibility
//! - Run one UI request through the API router (JSON on stdin or `--json`).
//! - Import settings and calendar mirrors, and run the diagnostics self-check.
//!
//! Configuration comes from the environment; see `cupsup_core::config`.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use cupsup_api::ApiRouter;
use cupsup_core::db::open_db;
use cupsup_core::{
    check_send_test, init_logging, run_diagnostics, AppConfig, CalendarEvent, DateRange, Settings,
    SettingsProvider, SmsTransport, SqliteCalendarSource, SqliteSettingsRepository, SystemClock,
    TwilioTransport, UnconfiguredTransport,
};
use log::warn;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "cupsup", version, about = "CupsUp shift scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Handle one API request and print the response envelope.
    Request {
        /// Request JSON; read from stdin when omitted.
        #[arg(long)]
        json: Option<String>,
    },
    /// Check settings, roster, calendar, credentials and group numbers.
    Diagnose {
        /// First day of the week to check; defaults to today.
        #[arg(long)]
        week_start: Option<NaiveDate>,
        /// Also send one test SMS to this number (+1##########).
        #[arg(long)]
        send_to: Option<String>,
    },
    /// Replace settings, roster and group numbers from a JSON file.
    ImportSettings { file: PathBuf },
    /// Replace the mirrored calendar events of one week from a JSON file.
    ImportCalendar {
        file: PathBuf,
        #[arg(long)]
        week_start: NaiveDate,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(&config.log_level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &AppConfig) -> Result<ExitCode, String> {
    let conn = open_db(&config.db_path)
        .map_err(|err| format!("cannot open `{}`: {err}", config.db_path.display()))?;

    match command {
        Command::Request { json } => {
            let raw = match json {
                Some(raw) => raw,
                None => read_input()?,
            };
            let transport = build_transport(config);
            let router = ApiRouter::new(&conn, transport.as_ref(), SystemClock);
            println!("{}", router.handle_json(&raw));
            Ok(ExitCode::SUCCESS)
        }
        Command::Diagnose {
            week_start,
            send_to,
        } => {
            let week_start = week_start.unwrap_or_else(|| Local::now().date_naive());
            let mut report = run_diagnostics(&conn, config, week_start);
            if let Some(phone) = send_to {
                let transport = build_transport(config);
                report
                    .checks
                    .push(check_send_test(transport.as_ref(), phone.trim()));
            }
            for check in &report.checks {
                println!("{:<16} {:?}  {}", check.name, check.status, check.detail);
            }
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::ImportSettings { file } => {
            let settings: Settings = read_json(&file)?;
            SqliteSettingsRepository::new(&conn)
                .replace_settings(&settings)
                .map_err(|err| err.to_string())?;
            println!(
                "imported {} employees and {} group numbers",
                settings.employees.len(),
                settings.group_numbers.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::ImportCalendar { file, week_start } => {
            let events: Vec<CalendarEvent> = read_json(&file)?;
            let settings = SqliteSettingsRepository::new(&conn)
                .load_settings()
                .map_err(|err| err.to_string())?;
            let written = SqliteCalendarSource::new(&conn)
                .replace_events(
                    &settings.calendar_id,
                    DateRange::week_from(week_start),
                    &events,
                )
                .map_err(|err| err.to_string())?;
            println!("imported {written} calendar events");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_transport(config: &AppConfig) -> Box<dyn SmsTransport> {
    let Some(credentials) = config.sms_credentials.clone() else {
        warn!("event=transport_init module=cli status=degraded reason=missing_credentials");
        return Box::new(UnconfiguredTransport);
    };
    match TwilioTransport::new(credentials, config.sms_timeout) {
        Ok(transport) => Box::new(transport),
        Err(err) => {
            warn!("event=transport_init module=cli status=degraded error={err}");
            Box::new(UnconfiguredTransport)
        }
    }
}

fn read_input() -> Result<String, String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(|err| format!("cannot read request from stdin: {err}"))?;
    Ok(raw)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read `{}`: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid JSON in `{}`: {err}", path.display()))
}
