//! KKTIX Launcher - configuration and launch front end for the ticket worker
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary crate is a thin host over [`Orchestrator`]. It initializes:
//! - Logging infrastructure (daily file rotation under `Logs/`, optional console output)
//! - The panic hook that records faults in `Logs/unhandled.txt`
//! - Tokio async runtime (saves and the detached worker spawn)
//! - State management ([`StateManager`])
//!
//! # Execution Flow
//!
//! 1. Detect install, per-user and working directories
//! 2. Initialize logging → Logs/kktix-launcher.<date>
//! 3. Load `UserConfig.json` (or create defaults); a corrupt file stops here
//! 4. Run the requested command: `show`, `edit`, `check` or `start`
//! 5. After a successful `start` the worker owns the session and the host exits
//!
//! # Configuration Files
//!
//! - `<install dir>/UserConfig.json`: preferred location
//! - `<local app data>/kktix/UserConfig.json`: fallback when the install dir is read-only

use anyhow::{Context, Result, anyhow};
use camino::Utf8Path;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use kktix_launcher::logging::{self, UNHANDLED_LOG};
use kktix_launcher::models::config::redact;
use kktix_launcher::models::sale_time;
use kktix_launcher::orchestrator::{LaunchOutcome, Orchestrator, StartupOutcome};
use kktix_launcher::{APP_NAME, AppPaths, ConfigModel, Field, StateManager, VERSION};
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "kktix-launcher", version, about = "Edit ticket settings and launch the KKTIX worker")]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Mirror logs to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current settings (password masked)
    Show,

    /// Change one or more settings and save them
    Edit(EditArgs),

    /// Run the full validation and print every problem
    Check,

    /// Validate, save and hand off to the worker
    Start,
}

#[derive(clap::Args, Debug, Default)]
struct EditArgs {
    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    #[arg(long)]
    ticket_name1: Option<String>,

    #[arg(long)]
    ticket_name2: Option<String>,

    #[arg(long)]
    price: Option<String>,

    #[arg(long)]
    quantity: Option<String>,

    #[arg(long)]
    url: Option<String>,

    /// Seat allocation
    #[arg(long, value_enum)]
    seat: Option<Mode>,

    /// Payment step
    #[arg(long, value_enum)]
    payment: Option<Mode>,

    /// RFC 3339, or Taipei-local YYYY/MM/DD HH:MM[:SS]
    #[arg(long)]
    sale_time: Option<String>,

    /// Change only the date (YYYY-MM-DD)
    #[arg(long)]
    sale_date: Option<String>,

    /// Change only the time of day on a 12-hour clock (H:MM[:SS])
    #[arg(long, requires = "meridiem")]
    sale_clock: Option<String>,

    /// AM or PM for `--sale-clock`
    #[arg(long, value_enum, requires = "sale_clock")]
    meridiem: Option<Meridiem>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Auto,
    Manual,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::detect() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive until exit or buffered log lines are lost
    let _log_guard = match logging::setup_logging(&paths.log_dir(), APP_NAME, cli.debug, cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging unavailable ({:#}), logging to console", e);
            let _ = logging::setup_console_logging(cli.debug);
            None
        }
    };
    logging::install_panic_hook(paths.log_dir());

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let log_dir = paths.log_dir();
    guard_boundary(&log_dir, || run(cli, paths))
}

/// Outermost boundary: an error or a panic becomes a logged failure exit,
/// never a raw fault.
fn guard_boundary(log_dir: &Utf8Path, body: impl FnOnce() -> Result<ExitCode>) -> ExitCode {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            tracing::error!("Unhandled error: {:#}", e);
            logging::append_diagnostic(log_dir, UNHANDLED_LOG, &format!("{:#}", e));
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
        // The panic hook has already recorded the details
        Err(_) => ExitCode::FAILURE,
    }
}

fn run(cli: Cli, paths: AppPaths) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("kktix-launcher")
        .build()
        .context("Failed to build tokio runtime")?;

    let state = Arc::new(StateManager::new());
    let orchestrator = Orchestrator::new(paths, state);

    match orchestrator.load_on_startup() {
        StartupOutcome::Fatal { message, .. } => {
            eprintln!("{}", message);
            return Ok(ExitCode::FAILURE);
        }
        StartupOutcome::Ready { origin, warning } => {
            tracing::info!("Config ready ({:?})", origin);
            if let Some(e) = warning {
                eprintln!("Warning: default settings could not be saved: {}", e);
            }
        }
    }

    let code = runtime.block_on(async {
        match cli.command {
            Command::Show => {
                print_config(&orchestrator.state().config());
                print_annotations(&orchestrator);
                Ok(ExitCode::SUCCESS)
            }
            Command::Edit(args) => edit(&orchestrator, args).await,
            Command::Check => match orchestrator.full_check() {
                Ok(()) => {
                    println!("All settings are valid.");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    println!("{}", e);
                    Ok(ExitCode::FAILURE)
                }
            },
            Command::Start => {
                let outcome = orchestrator.validate_and_launch().await;
                if outcome.is_launched() {
                    println!("{}", outcome.user_message());
                    Ok(ExitCode::SUCCESS)
                } else {
                    eprintln!("{}", outcome.user_message());
                    if let LaunchOutcome::WorkerMissing(_) = outcome {
                        eprintln!("See {} for details.", orchestrator.paths().log_dir().join(logging::LAUNCHER_LOG));
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    });

    // The worker is detached; nothing here waits for it
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    tracing::info!("Launcher exiting");
    code
}

async fn edit(orchestrator: &Orchestrator, args: EditArgs) -> Result<ExitCode> {
    let state = orchestrator.state();

    // Parse everything first so a bad value changes nothing
    let sale_time = args
        .sale_time
        .as_deref()
        .map(sale_time::parse_sale_time)
        .transpose()?;
    let sale_date = args
        .sale_date
        .as_deref()
        .map(|d| {
            NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                .with_context(|| format!("Invalid sale date '{}' (expected YYYY-MM-DD)", d))
        })
        .transpose()?;
    let sale_clock = args.sale_clock.as_deref().map(parse_clock).transpose()?;

    state.edit_config(|config| {
        let text_fields = [
            (&mut config.username, args.username),
            (&mut config.password, args.password),
            (&mut config.ticket_name1, args.ticket_name1),
            (&mut config.ticket_name2, args.ticket_name2),
            (&mut config.ticket_price, args.price),
            (&mut config.ticket_quantity, args.quantity),
            (&mut config.ticket_url, args.url),
        ];
        for (slot, value) in text_fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(seat) = args.seat {
            config.is_auto_allocation = seat == Mode::Auto;
        }
        if let Some(payment) = args.payment {
            config.is_auto_payment = payment == Mode::Auto;
        }
        if let Some(sale_time) = sale_time {
            config.sale_time = sale_time;
        }
    });

    if let Some(date) = sale_date {
        state.set_sale_date(date)?;
    }
    if let Some((hour, minute, second)) = sale_clock {
        let is_am = args.meridiem == Some(Meridiem::Am);
        state.set_sale_clock_12h(hour, minute, second, is_am)?;
    }

    let receipt = orchestrator.save().await?;
    println!("Saved to {} ({})", receipt.path, receipt.location);
    print_annotations(orchestrator);
    Ok(ExitCode::SUCCESS)
}

/// `H:MM` or `H:MM:SS`
fn parse_clock(input: &str) -> Result<(u32, u32, u32)> {
    let parts = input
        .trim()
        .split(':')
        .map(|p| p.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| anyhow!("Invalid sale clock '{}' (expected H:MM[:SS])", input))?;

    match parts.as_slice() {
        [h, m] => Ok((*h, *m, 0)),
        [h, m, s] => Ok((*h, *m, *s)),
        _ => Err(anyhow!("Invalid sale clock '{}' (expected H:MM[:SS])", input)),
    }
}

fn print_config(config: &ConfigModel) {
    let mode = |auto: bool| if auto { "auto" } else { "manual" };

    let rows = [
        (Field::Username, config.username.as_str()),
        (Field::Password, redact(&config.password)),
        (Field::TicketName1, config.ticket_name1.as_str()),
        (Field::TicketName2, config.ticket_name2.as_str()),
        (Field::TicketPrice, config.ticket_price.as_str()),
        (Field::TicketQuantity, config.ticket_quantity.as_str()),
        (Field::TicketUrl, config.ticket_url.as_str()),
        (Field::IsAutoAllocation, mode(config.is_auto_allocation)),
        (Field::IsAutoPayment, mode(config.is_auto_payment)),
    ];
    for (field, value) in rows {
        println!("{:<22} {}", field.label(), value);
    }
    println!("{:<22} {}", Field::SaleTime.label(), sale_time::display(&config.sale_time));
}

fn print_annotations(orchestrator: &Orchestrator) {
    let report = orchestrator.inline_check();
    if report.is_valid() {
        println!("\nReady to launch.");
        return;
    }
    println!();
    for (field, message) in report.field_annotations() {
        println!("  ! {}: {}", field, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("7:30").unwrap(), (7, 30, 0));
        assert_eq!(parse_clock(" 12:05:09 ").unwrap(), (12, 5, 9));
        assert!(parse_clock("7").is_err());
        assert!(parse_clock("7:xx").is_err());
    }

    #[test]
    fn test_cli_parses_edit() {
        let cli = Cli::try_parse_from([
            "kktix-launcher",
            "edit",
            "--quantity",
            "2",
            "--seat",
            "manual",
            "--sale-clock",
            "7:30",
            "--meridiem",
            "pm",
        ])
        .unwrap();
        match cli.command {
            Command::Edit(args) => {
                assert_eq!(args.quantity.as_deref(), Some("2"));
                assert_eq!(args.seat, Some(Mode::Manual));
                assert_eq!(args.meridiem, Some(Meridiem::Pm));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_meridiem_requires_sale_clock() {
        assert!(Cli::try_parse_from(["kktix-launcher", "edit", "--meridiem", "pm"]).is_err());
    }

    fn temp_log_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = Utf8PathBuf::try_from(temp_dir.path().join("Logs")).unwrap();
        (temp_dir, log_dir)
    }

    #[test]
    fn test_boundary_turns_panic_into_failure() {
        let (_temp_dir, log_dir) = temp_log_dir();
        let code = guard_boundary(&log_dir, || panic!("boom"));
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::FAILURE));
    }

    #[test]
    fn test_boundary_logs_errors() {
        let (_temp_dir, log_dir) = temp_log_dir();
        let code = guard_boundary(&log_dir, || Err(anyhow!("disk on fire")));
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::FAILURE));

        let log = std::fs::read_to_string(log_dir.join(UNHANDLED_LOG)).unwrap();
        assert!(log.contains("disk on fire"));
    }

    #[test]
    fn test_boundary_passes_success_through() {
        let (_temp_dir, log_dir) = temp_log_dir();
        let code = guard_boundary(&log_dir, || Ok(ExitCode::SUCCESS));
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::SUCCESS));
        assert!(!log_dir.exists());
    }

    #[test]
    fn test_sale_clock_requires_meridiem() {
        assert!(Cli::try_parse_from(["kktix-launcher", "edit", "--sale-clock", "7:30"]).is_err());
    }
}
