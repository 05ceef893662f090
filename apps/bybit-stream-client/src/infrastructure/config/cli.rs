//! Command Line Interface
//!
//! Every flag falls back to a `BYBIT_*` environment variable.

use clap::Parser;

use super::settings::{Category, ClientSettings, TuningSettings};
use crate::domain::streaming::StreamMode;
use crate::domain::subscription::DEFAULT_SYMBOLS;

/// Bybit public market data stream client.
#[derive(Debug, Parser)]
#[command(name = "bybit-stream-client")]
#[command(about = "Resilient Bybit v5 public WebSocket client", version)]
pub struct Cli {
    /// Stream mode
    #[arg(long, env = "BYBIT_MODE", default_value = "ticker", value_parser = ["ticker", "trade"])]
    pub mode: String,

    /// Comma-separated base assets (quote is always USDT)
    #[arg(long, env = "BYBIT_SYMBOLS", default_value = DEFAULT_SYMBOLS)]
    pub symbols: String,

    /// Market category
    #[arg(long, env = "BYBIT_CATEGORY", default_value = "spot", value_parser = ["spot", "linear"])]
    pub category: String,

    /// WebSocket URL override
    #[arg(long, env = "BYBIT_WS_URL")]
    pub url: Option<String>,

    /// Prometheus listener port (0 disables the exporter)
    #[arg(long, env = "BYBIT_METRICS_PORT", default_value_t = 0)]
    pub metrics_port: u16,
}

impl Cli {
    /// Combine parsed flags with environment tunables.
    #[must_use]
    pub fn into_settings(self, tuning: TuningSettings) -> ClientSettings {
        ClientSettings {
            mode: StreamMode::from_str_case_insensitive(&self.mode),
            category: Category::from_str_case_insensitive(&self.category),
            symbols: self.symbols,
            url: self.url,
            metrics_port: self.metrics_port,
            tuning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["bybit-stream-client"]).unwrap();
        let settings = cli.into_settings(TuningSettings::default());

        assert_eq!(settings.mode, StreamMode::Ticker);
        assert_eq!(settings.category, Category::Spot);
        assert_eq!(settings.symbols, "BTC,ETH,XRP");
        assert_eq!(settings.metrics_port, 0);
    }

    #[test]
    fn explicit_flags() {
        let cli = Cli::try_parse_from([
            "bybit-stream-client",
            "--mode",
            "trade",
            "--symbols",
            "sol,doge",
            "--category",
            "linear",
            "--url",
            "ws://127.0.0.1:9000",
            "--metrics-port",
            "9464",
        ])
        .unwrap();
        let settings = cli.into_settings(TuningSettings::default());

        assert_eq!(settings.mode, StreamMode::Trade);
        assert_eq!(settings.category, Category::Linear);
        assert_eq!(settings.url(), "ws://127.0.0.1:9000");
        assert_eq!(settings.metrics_port, 9464);
        assert_eq!(
            settings.subscription().unwrap().instruments(),
            vec!["SOLUSDT", "DOGEUSDT"]
        );
    }

    #[test]
    fn unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["bybit-stream-client", "--mode", "orderbook"]).is_err());
    }
}
