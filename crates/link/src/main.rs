// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::BufRead;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::error;

use relaylink::client::ApiRequest;
use relaylink::config::ConnectConfig;
use relaylink::resolver::DiscoveryResult;
use relaylink::Connector;

#[derive(Debug, Parser)]
#[command(name = "relaylink", version, about = "Reach a RelayPrint server from anywhere.")]
struct Cli {
    #[command(flatten)]
    connect: ConnectConfig,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "RELAYLINK_LOG_FORMAT")]
    log_format: String,

    /// Log level filter.
    #[arg(long, default_value = "warn", env = "RELAYLINK_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authorize against the issuer and store the resulting credential.
    Login,
    /// Run a resolution pass and print the winning connection.
    Resolve,
    /// Query the backend health endpoint over the supervised connection.
    Health,
    /// Show stored credential and connection state.
    Status,
    /// List gateway add-ons (requires an administrator token).
    Addons,
    /// Set or clear the manual tunnel URL.
    Tunnel {
        url: Option<String>,
        #[arg(long, conflicts_with = "url")]
        clear: bool,
    },
    /// Forget the credential and all connection state.
    Logout,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let connector = Connector::open(&cli.connect)?;

    match cli.command {
        Command::Login => login(&connector, &cli.connect).await,
        Command::Resolve => {
            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
            }
            match connector.resolver.resolve_with(&cancel).await {
                DiscoveryResult::Success(conn) => {
                    println!("{}", serde_json::to_string_pretty(&*conn)?);
                    Ok(())
                }
                DiscoveryResult::Error(e) => {
                    anyhow::bail!("{e}\n{}", e.classification.guidance())
                }
            }
        }
        Command::Health => {
            let resp = connector.supervisor.execute(&ApiRequest::get("api/health")).await?;
            println!("{}", resp.text());
            Ok(())
        }
        Command::Status => {
            let state = connector.store.snapshot();
            let status = serde_json::json!({
                "issuer": state.issuer,
                "authenticated": state.credential.is_some(),
                "expires_at": state.credential.as_ref().and_then(|c| c.expires_at),
                "addon": state.addon,
                "last_resolved": state.last_resolved,
                "tunnel": state.tunnel,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Addons => {
            let addons = connector.gateway.list_addons().await?;
            println!("{}", serde_json::to_string_pretty(&addons)?);
            Ok(())
        }
        Command::Tunnel { url, clear } => {
            match url {
                Some(url) if !clear => connector.resolver.set_manual_tunnel(&url)?,
                _ => connector.resolver.clear_manual_tunnel(),
            }
            println!("{}", serde_json::to_string_pretty(&connector.resolver.tunnel_hint())?);
            Ok(())
        }
        Command::Logout => {
            connector.logout().await;
            Ok(())
        }
    }
}

/// Print the authorization URL and read back the redirect (or the bare code).
async fn login(connector: &Connector, config: &ConnectConfig) -> anyhow::Result<()> {
    let issuer = config
        .issuer
        .clone()
        .or_else(|| connector.auth.issuer())
        .ok_or_else(|| anyhow::anyhow!("--issuer is required for login"))?;
    let url = connector.auth.build_authorization_url(&issuer)?;
    println!("Open this address in a browser and authorize:\n\n  {url}\n");
    println!("Paste the address you were redirected to (or the code):");

    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await??;
    let input = line.trim();

    let credential = if input.contains("code=") {
        connector.auth.exchange_callback(input).await?
    } else {
        connector.auth.exchange_code(input).await?
    };
    println!("Logged in (token expires at {:?}).", credential.expires_at);
    Ok(())
}
