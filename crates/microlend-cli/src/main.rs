//! Microlend CLI
//!
//! Command-line front end for the microlend stores: sign in, then manage
//! clients, loans and payments against the local backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use microlend_core::{AppStores, Config, LoanStatus, PaymentStatus, Role, Theme};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "microlend")]
#[command(about = "Microlend - field agent client for micro-lending")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session management
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage payments
    #[command(alias = "payment")]
    Payments {
        #[command(subcommand)]
        command: PaymentCommands,
    },
    /// Manage loans
    #[command(alias = "loan")]
    Loans {
        #[command(subcommand)]
        command: LoanCommands,
    },
    /// Manage clients
    #[command(alias = "client")]
    Clients {
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Show or set UI preferences
    Prefs {
        #[command(subcommand)]
        command: Option<PrefsCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create a local account
    Register {
        #[arg(long)]
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// admin or agent
        #[arg(long, default_value = "agent")]
        role: Role,
        /// Prompted for if omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,
        /// Prompted for if omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Show the current session
    Status,
    /// End the remote session and forget the local one
    SignOut,
    /// Forget the local session only
    Logout,
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// List payments
    #[command(alias = "ls")]
    List {
        /// Only payments of this loan (ID or prefix)
        #[arg(short, long)]
        loan: Option<String>,
        /// Only payments matching this text
        #[arg(short, long, conflicts_with = "loan")]
        search: Option<String>,
    },
    /// Show payment details
    Show {
        /// Payment ID (full or prefix)
        id: String,
    },
    /// Record a payment
    #[command(alias = "create")]
    Add {
        /// Loan ID (full or prefix)
        #[arg(short, long)]
        loan: String,
        /// Amount, e.g. 90.50
        #[arg(short, long, allow_hyphen_values = true)]
        amount: String,
        #[arg(long, default_value = "unpaid")]
        status: PaymentStatus,
        #[arg(long)]
        note: Option<String>,
    },
    /// Change the status of a payment
    SetStatus {
        /// Payment ID (full or prefix)
        id: String,
        /// unpaid, paid or overdue
        status: PaymentStatus,
    },
    /// Delete a payment
    #[command(alias = "rm")]
    Delete {
        /// Payment ID (full or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum LoanCommands {
    /// List loans
    #[command(alias = "ls")]
    List {
        /// Only loans of this client (ID or prefix)
        #[arg(short, long)]
        client: Option<String>,
    },
    /// Show loan details
    Show {
        /// Loan ID (full or prefix)
        id: String,
    },
    /// Open a loan
    #[command(alias = "create")]
    Add {
        /// Client ID (full or prefix)
        #[arg(short, long)]
        client: String,
        /// Principal, e.g. 1000
        #[arg(short, long)]
        principal: String,
        /// Flat interest over the term, in percent
        #[arg(short, long, default_value = "10")]
        rate: String,
        /// Term in weeks
        #[arg(short, long, default_value_t = 12)]
        weeks: u16,
    },
    /// Change the status of a loan
    SetStatus {
        /// Loan ID (full or prefix)
        id: String,
        /// pending, active, closed or defaulted
        status: LoanStatus,
    },
    /// Delete a loan
    #[command(alias = "rm")]
    Delete {
        /// Loan ID (full or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List clients
    #[command(alias = "ls")]
    List,
    /// Show client details and loans
    Show {
        /// Client ID (full or prefix)
        id: String,
    },
    /// Register a client
    #[command(alias = "create")]
    Add {
        /// Full name
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete a client
    #[command(alias = "rm")]
    Delete {
        /// Client ID (full or prefix)
        id: String,
    },
    /// Search clients
    Search {
        /// Search query
        query: String,
    },
}

#[derive(Subcommand, Clone)]
enum PrefsCommands {
    /// Show preferences
    Show,
    /// Set preferences
    Set {
        #[arg(long)]
        language: Option<String>,
        /// light, dark or system
        #[arg(long)]
        theme: Option<Theme>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, notification_capacity, update_strategy,
        /// log_level, default_language)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Commands that don't need the stores
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    let command = match cli.command {
        Commands::Auth {
            command:
                AuthCommands::Register {
                    email,
                    name,
                    role,
                    password,
                },
        } => return commands::auth::register(&config, email, name, role, password, &output),
        command => command,
    };

    let stores = AppStores::open_local(&config)?;

    let result = match command {
        Commands::Auth { command } => handle_auth_command(command, &stores, &output).await,
        Commands::Payments { command } => {
            handle_payment_command(command, &stores, &output).await
        }
        Commands::Loans { command } => handle_loan_command(command, &stores, &output).await,
        Commands::Clients { command } => handle_client_command(command, &stores, &output).await,
        Commands::Prefs { command } => match command {
            Some(PrefsCommands::Show) | None => commands::prefs::show(&stores, &output),
            Some(PrefsCommands::Set { language, theme }) => {
                commands::prefs::set(&stores, language, theme, &output)
            }
        },
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    output.print_notifications(&stores.notifications.items());

    result
}

async fn handle_auth_command(
    command: AuthCommands,
    stores: &AppStores,
    output: &Output,
) -> Result<()> {
    match command {
        AuthCommands::Register { .. } => unreachable!(), // Handled before the stores open
        AuthCommands::SignIn { email, password } => {
            commands::auth::sign_in(stores, email, password, output).await
        }
        AuthCommands::Status => commands::auth::status(stores, output).await,
        AuthCommands::SignOut => commands::auth::sign_out(stores, output).await,
        AuthCommands::Logout => commands::auth::logout(stores, output),
    }
}

async fn handle_payment_command(
    command: PaymentCommands,
    stores: &AppStores,
    output: &Output,
) -> Result<()> {
    commands::require_user(stores).await?;

    match command {
        PaymentCommands::List { loan, search } => {
            commands::payments::list(stores, loan, search, output).await
        }
        PaymentCommands::Show { id } => commands::payments::show(stores, id, output).await,
        PaymentCommands::Add {
            loan,
            amount,
            status,
            note,
        } => commands::payments::add(stores, loan, amount, status, note, output).await,
        PaymentCommands::SetStatus { id, status } => {
            commands::payments::set_status(stores, id, status, output).await
        }
        PaymentCommands::Delete { id } => commands::payments::delete(stores, id, output).await,
    }
}

async fn handle_loan_command(
    command: LoanCommands,
    stores: &AppStores,
    output: &Output,
) -> Result<()> {
    commands::require_user(stores).await?;

    match command {
        LoanCommands::List { client } => commands::loans::list(stores, client, output).await,
        LoanCommands::Show { id } => commands::loans::show(stores, id, output).await,
        LoanCommands::Add {
            client,
            principal,
            rate,
            weeks,
        } => commands::loans::add(stores, client, principal, rate, weeks, output).await,
        LoanCommands::SetStatus { id, status } => {
            commands::loans::set_status(stores, id, status, output).await
        }
        LoanCommands::Delete { id } => commands::loans::delete(stores, id, output).await,
    }
}

async fn handle_client_command(
    command: ClientCommands,
    stores: &AppStores,
    output: &Output,
) -> Result<()> {
    let user = commands::require_user(stores).await?;

    match command {
        ClientCommands::List => commands::clients::list(stores, output).await,
        ClientCommands::Show { id } => commands::clients::show(stores, id, output).await,
        ClientCommands::Add {
            name,
            phone,
            address,
        } => commands::clients::add(stores, user.id, name, phone, address, output).await,
        ClientCommands::Delete { id } => commands::clients::delete(stores, id, output).await,
        ClientCommands::Search { query } => commands::clients::search(stores, query, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr, filtered by RUST_LOG or the configured level
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "microlend_core={level},microlend_cli={level}",
            level = config.log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
