//! # vault-agent
//!
//! Vault agent binary. Two modes:
//!
//! - **serve** (default): freeze the path root, open the store, and host
//!   the RPC surface for the desktop shell until ctrl-c.
//! - **smoke** (`--smoke`): headless import → sentinel search → wipe →
//!   re-search against a throwaway vault, writing a JSON report. Exit code
//!   0 means pass.

#![deny(unsafe_code)]

mod smoke;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use vault_core::{PathRoot, Provider};
use vault_rpc::{HandlerState, ServerConfig};
use vault_store::VaultStore;

/// Vault agent server and smoke driver.
#[derive(Parser, Debug)]
#[command(name = "vault-agent", about = "Local-first conversation archive agent")]
struct Cli {
    /// User-data directory; the vault lives at `<user-data>/vault`.
    /// Defaults to `~/.vault`.
    #[arg(long)]
    user_data: Option<PathBuf>,

    /// Port to bind on loopback (0 for auto-assign).
    #[arg(long, default_value_t = 9478)]
    port: u16,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run the headless smoke pass instead of serving.
    #[arg(long)]
    smoke: bool,

    /// Smoke: user-data directory override (typically a temp dir).
    #[arg(long, requires = "smoke")]
    vault_dir: Option<PathBuf>,

    /// Smoke: fixture file to import.
    #[arg(long, requires = "smoke")]
    import: Option<PathBuf>,

    /// Smoke: sentinel string expected back from search.
    #[arg(long, requires = "smoke")]
    sentinel: Option<String>,

    /// Provider tag for the smoke import.
    #[arg(long, requires = "smoke")]
    provider: Option<String>,

    /// Smoke: where to write the JSON report.
    #[arg(long, requires = "smoke")]
    smoke_out: Option<PathBuf>,
}

fn default_user_data() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".vault")
}

fn smoke_args(cli: &Cli) -> Result<smoke::SmokeArgs> {
    let vault_dir = cli
        .vault_dir
        .clone()
        .context("--smoke requires --vault-dir")?;
    let import = cli.import.clone().context("--smoke requires --import")?;
    let sentinel = cli
        .sentinel
        .clone()
        .context("--smoke requires --sentinel")?;
    let provider: Provider = cli
        .provider
        .as_deref()
        .context("--smoke requires --provider")?
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let smoke_out = cli
        .smoke_out
        .clone()
        .context("--smoke requires --smoke-out")?;
    Ok(smoke::SmokeArgs {
        vault_dir,
        import,
        sentinel,
        provider,
        smoke_out,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level);

    if cli.smoke {
        let args = smoke_args(&cli)?;
        let pass = smoke::run(&args)?;
        std::process::exit(if pass { 0 } else { 1 });
    }

    // Freeze the path root before anything can capture a path.
    let user_data = cli.user_data.unwrap_or_else(default_user_data);
    let paths = match PathRoot::init(&user_data) {
        Ok(paths) => paths,
        Err(err) => bail!("path root: {err}"),
    };

    let store = Arc::new(VaultStore::open(paths).context("failed to open vault store")?);
    tracing::info!(vault = %paths.vault().display(), "vault ready");

    let state = Arc::new(HandlerState::new(store));
    let handle = vault_rpc::serve(ServerConfig { port: cli.port }, state)
        .await
        .context("failed to bind rpc server")?;
    tracing::info!(port = handle.port, "vault-agent listening");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    handle.shutdown().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["vault-agent"]);
        assert_eq!(cli.port, 9478);
        assert!(!cli.smoke);
        assert!(cli.user_data.is_none());
    }

    #[test]
    fn cli_smoke_flags() {
        let cli = Cli::parse_from([
            "vault-agent",
            "--smoke",
            "--vault-dir",
            "/tmp/smoke",
            "--import",
            "/tmp/fixture.zip",
            "--sentinel",
            "SENTINEL_001",
            "--provider",
            "chatgpt",
            "--smoke-out",
            "/tmp/report.json",
        ]);
        assert!(cli.smoke);
        let args = smoke_args(&cli).unwrap();
        assert_eq!(args.provider, Provider::Chatgpt);
        assert_eq!(args.sentinel, "SENTINEL_001");
        assert_eq!(args.vault_dir, PathBuf::from("/tmp/smoke"));
    }

    #[test]
    fn smoke_flags_require_smoke_mode() {
        assert!(Cli::try_parse_from(["vault-agent", "--vault-dir", "/tmp/x"]).is_err());
    }

    #[test]
    fn smoke_args_missing_field_errors() {
        let cli = Cli::parse_from(["vault-agent", "--smoke", "--vault-dir", "/tmp/x"]);
        assert!(smoke_args(&cli).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let cli = Cli::parse_from([
            "vault-agent",
            "--smoke",
            "--vault-dir",
            "/tmp/x",
            "--import",
            "/tmp/y.json",
            "--sentinel",
            "S",
            "--provider",
            "copilot",
            "--smoke-out",
            "/tmp/r.json",
        ]);
        assert!(smoke_args(&cli).is_err());
    }

    #[test]
    fn default_user_data_under_home() {
        let path = default_user_data();
        assert!(path.ends_with(".vault"));
    }
}
