// ============================================================================
// powco-meet - Token-gated meeting rooms from the terminal
// ============================================================================
// Usage:
//   powco-meet login [--token TOKEN] [--no-browser]   Sign in with RelayX
//   powco-meet logout                                  Forget the wallet login
//   powco-meet whoami                                  Show the signed-in identity
//   powco-meet balance                                 Re-check the token balance
//   powco-meet rooms                                   List rooms and access
//   powco-meet open <route> [--json]                   Show what a route displays
//   powco-meet enter <route> [--html FILE] [--no-open] Join a room you hold tokens for
//   powco-meet session                                 Dump the stored session as JSON
// ============================================================================

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use meet_core::{
    BalanceState, BrowserEmbed, EmbedClient, HostPageEmbed, MeetApp, MeetConfig, RelayxLogin,
    Room, StaticCredential, WalletProvider,
};
use meet_core::shell::balance_summary;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// POWCO token-gated meetings
#[derive(Parser)]
#[command(name = "powco-meet", version, about = "Join POWCO token-gated video meetings")]
struct Cli {
    /// Path to the session file (default: ~/.powco/session.redb)
    #[arg(long, global = true)]
    session_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a RelayX wallet
    Login {
        /// Use an already signed credential instead of the browser flow
        #[arg(long)]
        token: Option<String>,

        /// Print the login URL instead of opening the browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Forget the stored wallet login
    Logout,

    /// Show the signed-in paymail and balance
    Whoami,

    /// Fetch the current token balance
    Balance,

    /// List rooms and whether you can enter them
    Rooms,

    /// Show what a route displays (e.g. /meet, /daily-standup, /login)
    Open {
        route: String,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Join a room
    Enter {
        route: String,

        /// Write an embed page to this file instead of opening the room URL
        #[arg(long)]
        html: Option<PathBuf>,

        /// Do not open the browser
        #[arg(long)]
        no_open: bool,
    },

    /// Dump the stored session as JSON
    Session,
}

fn embed_for(command: &Commands, config: &MeetConfig) -> Box<dyn EmbedClient> {
    match command {
        Commands::Enter {
            html: Some(path),
            no_open,
            ..
        } => {
            let page = HostPageEmbed::new(path.clone(), &config.embed_script_url);
            if *no_open {
                Box::new(page)
            } else {
                Box::new(page.and_open())
            }
        }
        _ => Box::new(BrowserEmbed),
    }
}

fn log_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("meet_core=debug".parse()?)
        .add_directive("powco_meet=debug".parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter()?)
        .init();

    let cli = Cli::parse();
    let mut config = MeetConfig::default();
    if cli.session_path.is_some() {
        config.session_path = cli.session_path.clone();
    }

    let embed = embed_for(&cli.command, &config);
    let app = MeetApp::from_config(config, embed)?;

    match cli.command {
        Commands::Login { token, no_browser } => cmd_login(&app, token, no_browser).await,
        Commands::Logout => cmd_logout(&app).await,
        Commands::Whoami => cmd_whoami(&app).await,
        Commands::Balance => cmd_balance(&app).await,
        Commands::Rooms => cmd_rooms(&app).await,
        Commands::Open { route, json } => cmd_open(&app, &route, json).await,
        Commands::Enter { route, .. } => cmd_enter(&app, &route).await,
        Commands::Session => cmd_session(&app),
    }
}

async fn cmd_login(app: &MeetApp, token: Option<String>, no_browser: bool) -> Result<()> {
    let provider: Box<dyn WalletProvider> = match token {
        Some(token) => Box::new(StaticCredential::new(token)),
        None => {
            let config = app.config();
            let mut login = RelayxLogin::bind(config.callback_port, config.auth_timeout())?;
            if no_browser {
                login = login.without_browser();
            }
            println!("Sign in at {}", login.login_url());
            Box::new(login)
        }
    };

    match app.login(provider.as_ref()).await {
        Ok(outcome) => {
            info!("Redirecting to {}", outcome.redirect);
            print!("{}", app.view(&outcome.redirect, None).await?);
            Ok(())
        }
        Err(e) => {
            print!("{}", app.view("/login", Some(e.to_string())).await?);
            Err(e.into())
        }
    }
}

async fn cmd_logout(app: &MeetApp) -> Result<()> {
    let identity = app.restore().await?;
    app.logout().await?;
    match identity {
        Some(identity) => println!("Logged out {}.", identity.paymail),
        None => println!("Not signed in."),
    }
    Ok(())
}

async fn cmd_whoami(app: &MeetApp) -> Result<()> {
    let Some(identity) = app.init().await? else {
        println!("Not signed in.");
        return Ok(());
    };

    println!("Paymail:   {}", identity.paymail);
    println!("Pubkey:    {}", identity.public_key);
    println!("Origin:    {}", identity.origin);
    println!(
        "Signed in: {}",
        identity.issued_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Balance:   {}", balance_summary(&app.balance().await));
    Ok(())
}

async fn cmd_balance(app: &MeetApp) -> Result<()> {
    if app.init().await?.is_none() {
        anyhow::bail!("Not signed in. Run `powco-meet login` first.");
    }

    match app.balance().await {
        BalanceState::Known { balance } => {
            println!("{} tokens (raw {})", balance, balance.raw());
            Ok(())
        }
        BalanceState::Failed { reason } => anyhow::bail!("Balance lookup failed: {}", reason),
        other => anyhow::bail!("Balance not available: {}", balance_summary(&other)),
    }
}

async fn cmd_rooms(app: &MeetApp) -> Result<()> {
    let signed_in = app.init().await?.is_some();
    let session = app.session().read().await;

    println!("{:<18}  {:<20}  {:>9}  {}", "ROUTE", "ROOM", "REQUIRED", "ACCESS");
    println!("{}", "-".repeat(64));

    for room in Room::all() {
        let access = if !signed_in {
            "sign in"
        } else if session.balance().known().is_none() {
            "unknown"
        } else if session.decision(room.threshold).granted {
            "granted"
        } else {
            "denied"
        };
        println!(
            "{:<18}  {:<20}  {:>9}  {}",
            room.route,
            room.title,
            room.threshold.tokens(),
            access
        );
    }
    Ok(())
}

async fn cmd_open(app: &MeetApp, route: &str, json: bool) -> Result<()> {
    app.init().await?;
    let view = app.view(route, None).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", view);
    }
    Ok(())
}

async fn cmd_enter(app: &MeetApp, route: &str) -> Result<()> {
    app.init().await?;

    match app.enter(route).await {
        Ok(options) => {
            println!(
                "Joined {} on {} as {}",
                options.room_name,
                app.config().meet_domain,
                options.user_info.display_name
            );
            Ok(())
        }
        Err(e) => {
            print!("{}", app.view(route, None).await?);
            Err(e.into())
        }
    }
}

fn cmd_session(app: &MeetApp) -> Result<()> {
    let entries: serde_json::Map<String, serde_json::Value> = app
        .store()
        .entries()?
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect();

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "path": app.store().path().display().to_string(),
        "entries": entries,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}
