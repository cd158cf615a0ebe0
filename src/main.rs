//! campus-client - drive the campus library connectivity layer from a terminal

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_library_core::{
    config::{AppConfig, LoggingConfig},
    models::{DataSource, PushState},
    services::push::HeadlessPlatform,
    AppError, ClientContext,
};

#[derive(Parser)]
#[command(name = "campus-client", version)]
#[command(about = "Campus library client: server discovery, session and push state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved server, session and push registration
    Status,

    /// Sign in with email and password
    Login {
        email: String,
        password: String,
    },

    /// Sign out; safe to repeat
    Logout,

    /// Manage the backend address
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },

    /// Choose between demo data and the live backend
    DataSource {
        /// `demo` or `live`
        source: DataSource,
    },
}

#[derive(Subcommand)]
enum ServerAction {
    /// Use a specific host (IP or hostname, optional port)
    Set { address: String },

    /// Forget the saved address and rediscover
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    tracing::debug!("campus-client v{}", env!("CARGO_PKG_VERSION"));

    let platform = Arc::new(HeadlessPlatform::new(config.push.platform));
    let ctx = ClientContext::open(config, platform)
        .await
        .context("Failed to open client state")?;
    let report = ctx.startup().await;

    match cli.command {
        Commands::Status => {
            println!("Server:      {}", report.endpoint);
            match report.user {
                Some(user) => println!("Signed in:   {} <{}>", user.name, user.email),
                None => println!("Signed in:   no"),
            }
            println!("Push:        {}", describe_push(report.push_state));
            println!("Data source: {}", describe_source(ctx.data_source().await));
        }
        Commands::Login { email, password } => match ctx.services.auth.login(&email, &password).await {
            Ok(session) => println!("Signed in as {} <{}>", session.user.name, session.user.email),
            Err(AppError::InvalidCredentials(msg)) => anyhow::bail!("Login rejected: {}", msg),
            Err(e) => return Err(e).context("Login failed"),
        },
        Commands::Logout => {
            ctx.services.auth.logout().await?;
            println!("Signed out");
        }
        Commands::Server { action } => match action {
            ServerAction::Set { address } => {
                let endpoint = ctx
                    .services
                    .discovery
                    .set_manual(&address)
                    .await
                    .with_context(|| format!("Could not use {}", address))?;
                println!("Server set to {}", endpoint);
            }
            ServerAction::Reset => {
                let endpoint = ctx.services.discovery.reset().await;
                println!("Server reset, now using {}", endpoint);
            }
        },
        Commands::DataSource { source } => {
            ctx.set_data_source(source).await?;
            println!("Data source set to {}", describe_source(source));
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "campus_library_core={level},campus_client={level}",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn describe_push(state: PushState) -> &'static str {
    match state {
        PushState::NoToken => "not registered",
        PushState::LocalToken => "registered, not yet synced",
        PushState::SyncedToken => "registered and synced",
    }
}

fn describe_source(source: DataSource) -> &'static str {
    match source {
        DataSource::Demo => "demo",
        DataSource::Live => "live",
    }
}
