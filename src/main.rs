//! mailbox-usage - report the largest mailboxes of every domain.
//!
//! Logs in to the administration interface, lists domains and prints the
//! top consumers of each one. Scripted mode prints `address,bytes` lines.

mod report;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailadmin_rpc::config::AppConfig;
use mailadmin_rpc::{ApiError, SessionClient};

use report::ReportFormat;

#[derive(Debug, Parser)]
#[command(name = "mailbox-usage", version, about = "Report mailbox usage per domain")]
struct Args {
    /// Mail server host, optionally `host:port`
    #[arg(long, env = "MAILADMIN_HOST")]
    host: Option<String>,

    /// Administrator login
    #[arg(long, env = "MAILADMIN_USER")]
    user: Option<String>,

    /// Print `address,bytes` lines only
    #[arg(short, long)]
    scripted: bool,

    /// Users reported per domain
    #[arg(long, default_value_t = 10)]
    limit: u64,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Speak plain HTTP instead of TLS
    #[arg(long)]
    plain: bool,

    /// Accept any server certificate
    #[arg(long)]
    insecure: bool,

    /// Connect timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so scripted output stays clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mailadmin_rpc=info,mailbox_usage=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(user) = &args.user {
        config.server.user = user.clone();
    }
    if args.plain {
        config.server.encrypted = false;
    }
    if args.insecure {
        config.server.verify_certificates = false;
    }
    if let Some(secs) = args.timeout {
        config.server.connect_timeout_secs = secs;
    }

    let password = read_password()?;
    let format = if args.scripted {
        ReportFormat::Scripted
    } else {
        ReportFormat::Human
    };

    info!("Starting mailbox-usage v{}", env!("CARGO_PKG_VERSION"));

    match run(&config, &password, args.limit, format).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            report_error(&e);
            eprintln!("There has been some errors");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(
    config: &AppConfig,
    password: &str,
    limit: u64,
    format: ReportFormat,
) -> Result<()> {
    let mut session = SessionClient::new(config.application.clone(), config.endpoint())?;
    session.set_transport_options(config.transport_options());

    session
        .login(&config.server.host, &config.server.user, password)
        .await?;

    let mut stdout = io::stdout().lock();
    let outcome = report::run(&mut session, limit, format, &mut stdout).await;

    // A failed report still ends the session on the server
    if let Err(e) = session.logout().await {
        debug!("Logout failed: {}", e);
    }
    outcome
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("MAILADMIN_PASSWORD") {
        return Ok(password);
    }

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn report_error(e: &anyhow::Error) {
    let Some(e) = e.downcast_ref::<ApiError>() else {
        error!("{:#}", e);
        return;
    };
    match e.code() {
        Some(code) => error!("{:?} error {}: {}", e.kind(), code, e),
        None => error!("{:?} error: {}", e.kind(), e),
    }
    if let Some(status) = e.status() {
        debug!("HTTP status {}", status);
    }
    if let Some(request) = e.request() {
        debug!("Request: {}", request);
    }
    if let Some(response) = e.response() {
        debug!("Response: {}", response);
    }
}
