mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use zapgate::credential::Role;
use zapgate::signature::ContractInvite;

use commands::Context;
use commands::send::SendArgs;

// ============================================================================
// CLI Types
// ============================================================================

/// Zapgate - WhatsApp gateway session management and message dispatch
#[derive(Parser, Debug)]
#[command(version = zapgate::build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "zapgate.yaml", global = true)]
    config: String,

    /// Role of the operator [admin, manager, user]
    #[arg(long, default_value = "user", global = true)]
    role: Role,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the instance connection state
    Status {
        /// Instance name (defaults to the stored settings)
        #[arg(short, long)]
        instance: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Request a QR code and wait until the instance is paired
    Connect {
        /// Instance name (defaults to the stored settings)
        #[arg(short, long)]
        instance: Option<String>,

        /// Seconds between status checks while waiting
        #[arg(long, default_value_t = 3)]
        poll_seconds: u64,
    },

    /// Log the instance out
    Logout {
        /// Instance name (defaults to the stored settings)
        #[arg(short, long)]
        instance: Option<String>,
    },

    /// Restart the instance and report its state afterwards
    Restart {
        /// Instance name (defaults to the stored settings)
        #[arg(short, long)]
        instance: Option<String>,
    },

    /// Send a text message
    Send {
        /// Phone number or qualified id (e.g. 123456789@g.us)
        #[arg(long)]
        to: String,

        /// Message text (reads one message per line from stdin if omitted)
        #[arg(long)]
        text: Option<String>,

        /// Delay before delivery, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Render link previews
        #[arg(long)]
        link_preview: bool,

        /// Instance name (defaults to the stored settings)
        #[arg(short, long)]
        instance: Option<String>,
    },

    /// Send a contract signature link
    Sign {
        /// Contract identifier used in the signing link
        #[arg(long)]
        contract_id: String,

        /// Contract title shown in the message
        #[arg(long)]
        title: String,

        /// Client name used in the greeting
        #[arg(long)]
        client: String,

        /// Client phone number
        #[arg(long)]
        to: String,
    },

    /// Show or change the stored gateway settings
    Configure {
        /// Gateway base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Client API key for the instance (admin or manager only)
        #[arg(long)]
        api_key: Option<String>,

        /// Instance name
        #[arg(long)]
        instance: Option<String>,
    },

    /// List or render message templates
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },

    /// Print version and build commit
    Version {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum TemplatesAction {
    /// List the available templates
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Render a template with variables
    Render {
        /// Template id (e.g. invoice-created)
        id: String,

        /// Variable as key=value (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version { format } => {
            if format == "json" {
                let info = zapgate::build_info::BuildInfo::default();
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("zapgate {}", zapgate::build_info::version_string());
            }
            Ok(())
        }
        Commands::Templates { action } => match action {
            TemplatesAction::List { format } => commands::templates::list(&format),
            TemplatesAction::Render { id, vars } => commands::templates::render(&id, &vars),
        },
        command => {
            let ctx = Context::load(&cli.config, cli.role).await?;
            match command {
                Commands::Status { instance, format } => {
                    commands::status::run(&ctx, instance, &format).await
                }
                Commands::Connect {
                    instance,
                    poll_seconds,
                } => commands::connect::run(&ctx, instance, poll_seconds).await,
                Commands::Logout { instance } => commands::logout::run(&ctx, instance).await,
                Commands::Restart { instance } => commands::restart::run(&ctx, instance).await,
                Commands::Send {
                    to,
                    text,
                    delay_ms,
                    link_preview,
                    instance,
                } => {
                    let args = SendArgs {
                        to,
                        text,
                        delay_ms,
                        link_preview,
                        instance,
                    };
                    commands::send::run(&ctx, args).await
                }
                Commands::Sign {
                    contract_id,
                    title,
                    client,
                    to,
                } => {
                    let invite = ContractInvite {
                        contract_id,
                        title,
                        client_name: client,
                        phone: to,
                    };
                    commands::sign::run(&ctx, invite).await
                }
                Commands::Configure {
                    base_url,
                    api_key,
                    instance,
                } => commands::configure::run(&ctx, base_url, api_key, instance).await,
                Commands::Version { .. } | Commands::Templates { .. } => Ok(()),
            }
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Log to stderr so stdout carries only command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
