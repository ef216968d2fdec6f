//! DrowsyGuard - Main Entry Point

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cli::{init_logging, AdminAction, App, AppConfig, SimulationPlan};
use driver_auth::RegistrationForm;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "drowsy-guard", about = "Driver drowsiness monitoring", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Credentials {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database and the default admin account
    Init,
    /// Register a new driver
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        license_no: String,
        #[arg(long)]
        place: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Check driver credentials and show journey status
    Login(Credentials),
    /// Show a driver's journey history
    Report {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        json: bool,
    },
    /// Run a journey over a replayed frame stream
    Simulate {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long, default_value_t = 300)]
        frames: u32,
        /// Classify every n-th frame as drowsy (0 = never)
        #[arg(long, default_value_t = 30)]
        drowsy_every: u32,
        #[arg(long, default_value_t = 33)]
        frame_interval_ms: u64,
    },
    /// Complete journeys left active by a crash
    Recover,
    /// Administration (requires admin credentials)
    Admin {
        #[command(flatten)]
        credentials: Credentials,
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AdminCommand {
    Stats,
    Drivers,
    Journeys,
    DeleteDriver { id: i64 },
    DeleteJourney { id: i64 },
}

impl From<AdminCommand> for AdminAction {
    fn from(command: AdminCommand) -> Self {
        match command {
            AdminCommand::Stats => AdminAction::Stats,
            AdminCommand::Drivers => AdminAction::Drivers,
            AdminCommand::Journeys => AdminAction::Journeys,
            AdminCommand::DeleteDriver { id } => AdminAction::DeleteDriver(id),
            AdminCommand::DeleteJourney { id } => AdminAction::DeleteJourney(id),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config.log)?;

    info!("=== DrowsyGuard v{} ===", env!("CARGO_PKG_VERSION"));
    let app = App::connect(config).await?;

    let output = match cli.command {
        Command::Init => app.init().await?,
        Command::Register {
            name,
            age,
            gender,
            license_no,
            place,
            phone,
            username,
            password,
        } => {
            let form = RegistrationForm {
                name,
                age,
                gender,
                license_no,
                place,
                phone,
                username,
                password,
            };
            app.register(&form).await?
        }
        Command::Login(c) => app.login_status(&c.username, &c.password).await?,
        Command::Report { credentials, json } => {
            app.report(&credentials.username, &credentials.password, json)
                .await?
        }
        Command::Simulate {
            credentials,
            frames,
            drowsy_every,
            frame_interval_ms,
        } => {
            let plan = SimulationPlan {
                frames,
                drowsy_every,
                frame_interval: Duration::from_millis(frame_interval_ms),
            };
            app.simulate(&credentials.username, &credentials.password, &plan)
                .await?
        }
        Command::Recover => app.recover().await?,
        Command::Admin {
            credentials,
            action,
        } => {
            app.admin(&credentials.username, &credentials.password, &action.into())
                .await?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}
