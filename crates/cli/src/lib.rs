pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use commands::voucher::VoucherAction;
use offerly_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "offerly",
    about = "Offerly promotion engine operator CLI",
    long_about = "Apply migrations, load demo data, evaluate offers and drive the voucher reservation lifecycle.",
    after_help = "Examples:\n  offerly migrate\n  offerly seed\n  offerly offer --fact cart.json\n  offerly voucher freeze --user 1001 --code DEMO-VIP-0001"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo campaigns and vouchers (idempotent)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Select the best offer for the shopper described by a fact file")]
    Offer {
        #[arg(long, help = "Path to a JSON fact (user, items, environment, totalAmount)")]
        fact: PathBuf,
    },
    #[command(about = "List every voucher whose rule matches the fact, newest first")]
    Applicable {
        #[arg(long, help = "Path to a JSON fact (user, items, environment, totalAmount)")]
        fact: PathBuf,
        #[arg(long, help = "Voucher owner; defaults to the fact's user id")]
        user: Option<i64>,
    },
    #[command(about = "Freeze, use or unfreeze one voucher on behalf of its owner")]
    Voucher {
        #[arg(value_enum)]
        action: VoucherAction,
        #[arg(long)]
        user: i64,
        #[arg(long)]
        code: String,
    },
    #[command(about = "Issue vouchers from a template to one or more users")]
    Issue {
        #[arg(long)]
        template: i64,
        #[arg(long = "user", required = true, num_args = 1..)]
        users: Vec<i64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Offer { fact } => commands::offer::run(fact),
        Command::Applicable { fact, user } => commands::applicable::run(fact, user),
        Command::Voucher { action, user, code } => commands::voucher::run(action, user, code),
        Command::Issue { template, users } => commands::issue::run(template, users),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON payload.
fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};
    use crate::commands::voucher::VoucherAction;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn voucher_subcommand_parses_action_and_owner() {
        let cli = Cli::parse_from([
            "offerly", "voucher", "freeze", "--user", "1001", "--code", "DEMO-VIP-0001",
        ]);

        match cli.command {
            Command::Voucher { action, user, code } => {
                assert_eq!(action, VoucherAction::Freeze);
                assert_eq!(user, 1001);
                assert_eq!(code, "DEMO-VIP-0001");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn issue_accepts_several_users() {
        let cli =
            Cli::parse_from(["offerly", "issue", "--template", "3", "--user", "1", "2", "3"]);

        match cli.command {
            Command::Issue { template, users } => {
                assert_eq!(template, 3);
                assert_eq!(users, vec![1, 2, 3]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
