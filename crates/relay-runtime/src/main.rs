//! # BTP Relay Runtime
//!
//! Builds one relay message from the source chain and prints it as URL-safe
//! base64.
//!
//! ## Triggers
//!
//! - streaming (default): follow new blocks from `--start-height` until one
//!   batch is complete
//! - one-shot: `--height N` relays exactly block `N`
//!
//! ## Usage
//!
//! ```bash
//! relay-runtime --endpoint http://localhost:9080/api/v3/icon_dex
//! relay-runtime --height 9085
//! RUST_LOG=btp_relay=debug relay-runtime
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use btp_relay::config::{DEFAULT_DESTINATION, DEFAULT_ENDPOINT, DEFAULT_SOURCE_CONTRACT};
use btp_relay::{
    BtpAddress, IconRpcClient, RelayConfig, RelayMessage, RelayService, WsBlockMonitor,
    EVENT_SIGNATURE,
};

/// BTP relay message builder
#[derive(Parser, Debug)]
#[command(name = "relay-runtime")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-RPC endpoint of the source chain node
    #[arg(long, env = "BTP_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Contract emitting the relayed events
    #[arg(long, env = "BTP_SRC_CONTRACT", default_value = DEFAULT_SOURCE_CONTRACT)]
    src_contract: String,

    /// Destination BTP address
    #[arg(long, env = "BTP_DST", default_value = DEFAULT_DESTINATION)]
    dst: String,

    /// Event signature to follow
    #[arg(long, env = "BTP_EVENT", default_value = EVENT_SIGNATURE)]
    event: String,

    /// First height to follow in streaming mode
    #[arg(long, env = "BTP_START_HEIGHT", default_value_t = 10)]
    start_height: i64,

    /// Relay only this block, then exit
    #[arg(long, env = "BTP_HEIGHT")]
    height: Option<i64>,

    /// Block updates per relay message
    #[arg(long, env = "BTP_MAX_BLOCK_UPDATES", default_value_t = 2)]
    max_block_updates: usize,

    /// JSON-RPC request timeout in seconds
    #[arg(long, env = "BTP_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> RelayConfig {
        RelayConfig {
            endpoint: self.endpoint,
            source_contract: self.src_contract,
            destination: BtpAddress::new(self.dst),
            event_signature: self.event,
            start_height: self.start_height,
            max_block_updates: self.max_block_updates,
            request_timeout_secs: self.timeout_secs,
            ..RelayConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let one_shot = args.height;
    let config = args.into_config();
    config.validate().context("Invalid relay configuration")?;

    info!("[btp-relay] Source {} -> {}", config.endpoint, config.destination);

    let client = IconRpcClient::from_config(&config).context("Failed to create RPC client")?;
    let monitor = WsBlockMonitor::from_config(&config);
    let service = RelayService::new(config, Arc::new(client));

    let run = async {
        match one_shot {
            Some(height) => service.run_from_height(&monitor, height).await,
            None => service.run_streaming(&monitor).await,
        }
    };

    let message: RelayMessage = tokio::select! {
        result = run => result.context("Relay message build failed")?,
        _ = tokio::signal::ctrl_c() => {
            info!("[btp-relay] Interrupted, subscription closed");
            return Ok(());
        }
    };

    println!("{}", message.to_base64_url());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["relay-runtime"]).unwrap();
        let config = args.into_config();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.start_height, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_one_shot_args() {
        let args = Args::try_parse_from([
            "relay-runtime",
            "--height",
            "9085",
            "--dst",
            "btp://0x1.icon/cx00",
        ])
        .unwrap();
        assert_eq!(args.height, Some(9085));
        let config = args.into_config();
        assert_eq!(config.destination.blockchain(), "icon");
    }
}
