//! Agri market CLI
//!
//! Command-line client for the market server: price forecasts, market
//! history questions, exports, dashboard data and leaf diagnosis.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{account, disease, forecast, market, status};
use std::path::PathBuf;

/// Agri Market Intelligence CLI
#[derive(Parser)]
#[command(name = "agm")]
#[command(author, version, about = "CLI for Agri Market Intelligence", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via AGM_API_URL env var)
    #[arg(long, env = "AGM_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forecast weekly prices for a commodity
    Predict {
        /// Commodity name, e.g. Tomato
        commodity: String,

        /// Number of weeks to forecast (server default if not specified)
        #[arg(long, short)]
        weeks: Option<usize>,
    },

    /// List commodities with price bands
    Commodities,

    /// Ask the market assistant about recorded prices
    Chat {
        /// Question, e.g. "highest price of onion in madurai"
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Download market history as CSV, JSON or Excel
    Export {
        #[arg(long)]
        state: Option<String>,

        #[arg(long, short)]
        district: Option<String>,

        #[arg(long, short)]
        commodity: Option<String>,

        /// File format (csv, json or excel)
        #[arg(long, default_value = "csv")]
        file_format: String,

        /// Output file path (server-suggested name if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Dashboard chart data
    #[command(subcommand)]
    Dashboard(DashboardCommands),

    /// Diagnose a plant disease from a leaf image
    Diagnose {
        /// Path to a PNG, JPEG or WebP image
        image: PathBuf,
    },

    /// Create an account
    Signup {
        #[arg(long, short)]
        username: String,

        #[arg(long, short)]
        email: Option<String>,

        #[arg(long, env = "AGM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and remember the session
    Login {
        #[arg(long, short)]
        username: String,

        #[arg(long, env = "AGM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the saved session
    Logout,

    /// Show server health
    Health,
}

#[derive(Subcommand)]
pub enum DashboardCommands {
    /// Show price series and top districts
    Show {
        /// Commodity (first in the history if not specified)
        #[arg(long, short)]
        commodity: Option<String>,

        /// District (first in the history if not specified)
        #[arg(long, short)]
        district: Option<String>,
    },

    /// List available commodities and districts
    Options,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url.as_deref());
    if cli.verbose {
        output::print_info(&format!("Using API at {}", api_url));
    }

    // Initialize client
    let client = client::ApiClient::new(&api_url)?.with_token(config.session_token.clone());

    // Execute command
    match cli.command {
        Commands::Predict { commodity, weeks } => {
            forecast::predict(&client, &commodity, weeks, cli.format).await?;
        }
        Commands::Commodities => {
            forecast::list_commodities(&client, cli.format).await?;
        }
        Commands::Chat { message } => {
            market::chat(&client, &message.join(" "), cli.format).await?;
        }
        Commands::Export {
            state,
            district,
            commodity,
            file_format,
            output,
        } => {
            let query = client::ExportQuery {
                state,
                district,
                commodity,
                format: file_format,
            };
            market::export(&client, query, output).await?;
        }
        Commands::Dashboard(dashboard_cmd) => match dashboard_cmd {
            DashboardCommands::Show { commodity, district } => {
                market::show_dashboard(&client, commodity, district, cli.format).await?;
            }
            DashboardCommands::Options => {
                market::show_options(&client, cli.format).await?;
            }
        },
        Commands::Diagnose { image } => {
            disease::diagnose(&client, &image, cli.format).await?;
        }
        Commands::Signup {
            username,
            email,
            password,
        } => {
            account::signup(&client, username, email, password).await?;
        }
        Commands::Login { username, password } => {
            account::login(&client, &mut config, &username, &password).await?;
        }
        Commands::Logout => {
            account::logout(&client, &mut config).await?;
        }
        Commands::Health => {
            status::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
