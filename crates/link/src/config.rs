// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for resolving and supervising a RelayPrint connection.
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectConfig {
    /// Issuer (gateway) base address, e.g. `https://ha.example.org`.
    #[arg(long, env = "RELAYLINK_ISSUER")]
    pub issuer: Option<String>,

    /// OAuth client identifier sent with authorization requests.
    #[arg(long, default_value = "https://relayprint.app/", env = "RELAYLINK_CLIENT_ID")]
    pub client_id: String,

    /// Redirect target intercepted out-of-band after the user authorizes.
    #[arg(
        long,
        default_value = "https://relayprint.app/auth/callback",
        env = "RELAYLINK_REDIRECT_URI"
    )]
    pub redirect_uri: String,

    /// Port the backend listens on when reached directly.
    #[arg(long, default_value_t = 7779, env = "RELAYLINK_DIRECT_PORT")]
    pub direct_port: u16,

    /// Schemes tried, in order, for the direct strategy.
    #[arg(long, value_delimiter = ',', default_value = "http,https", env = "RELAYLINK_DIRECT_SCHEMES")]
    pub direct_schemes: Vec<String>,

    /// Gateway add-on identifier of this backend. Discovered when unset.
    #[arg(long, env = "RELAYLINK_ADDON")]
    pub addon: Option<String>,

    /// Well-known add-on identifiers probed when the identifier is unknown.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "relayprint,local_relayprint",
        env = "RELAYLINK_ADDON_CANDIDATES"
    )]
    pub addon_candidates: Vec<String>,

    /// Substring matched against add-on slugs from the administrative listing.
    #[arg(long, default_value = "relayprint", env = "RELAYLINK_ADDON_MATCH")]
    pub addon_match: String,

    /// Path prefix of the gateway's reverse proxy.
    #[arg(long, default_value = "/gateway/proxy", env = "RELAYLINK_GATEWAY_PROXY_PATH")]
    pub gateway_proxy_path: String,

    /// Manually supplied tunnel URL (overrides any remotely reported one).
    #[arg(long, env = "RELAYLINK_TUNNEL_URL")]
    pub tunnel_url: Option<String>,

    /// Timeout for health probes and auth/session calls, in milliseconds.
    #[arg(long, default_value_t = 5000, env = "RELAYLINK_PROBE_TIMEOUT_MS")]
    pub probe_timeout_ms: u64,

    /// Timeout for requests over a resolved connection, in milliseconds.
    #[arg(long, default_value_t = 30000, env = "RELAYLINK_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Seconds before token expiry at which the token is no longer used unrefreshed.
    #[arg(long, default_value_t = 60, env = "RELAYLINK_TOKEN_MARGIN_SECS")]
    pub token_margin_secs: u64,

    /// Seconds after which a gateway session is re-validated.
    #[arg(long, default_value_t = 50, env = "RELAYLINK_SESSION_REFRESH_SECS")]
    pub session_refresh_secs: u64,

    /// Initial delay before re-resolving after a connection failure, in milliseconds.
    #[arg(long, default_value_t = 500, env = "RELAYLINK_BACKOFF_MS")]
    pub backoff_ms: u64,

    /// Upper bound for the re-resolution delay, in milliseconds.
    #[arg(long, default_value_t = 30000, env = "RELAYLINK_MAX_BACKOFF_MS")]
    pub max_backoff_ms: u64,

    /// Directory holding persisted credentials and connection state.
    #[arg(long, env = "RELAYLINK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl ConnectConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn token_margin(&self) -> Duration {
        Duration::from_secs(self.token_margin_secs)
    }

    pub fn session_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.session_refresh_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Resolve the state directory.
    ///
    /// `--state-dir` wins, then `$XDG_STATE_HOME/relaylink`,
    /// then `$HOME/.local/state/relaylink`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("relaylink");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/relaylink");
        }
        PathBuf::from(".relaylink")
    }

    /// Path of the persisted state file.
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join("state.json")
    }
}
