//! Command-line flags.  Flags override both the config file and the
//! `HEATWATCH_*` environment.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug, Default, Clone, PartialEq)]
#[command(
    name = "heatwatch",
    version,
    about = "Host-side heat-stress decision service for a serial field device"
)]
pub struct CliArgs {
    /// Config file (default ~/.heatwatch/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Serial port of the field device
    #[arg(long, value_name = "NAME")]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long, value_name = "RATE")]
    pub baud: Option<u32>,

    /// Classifier artifact (JSON)
    #[arg(long, value_name = "PATH")]
    pub model: Option<String>,

    /// Alert threshold in [0, 1]
    #[arg(long, value_name = "P")]
    pub threshold: Option<f64>,

    /// Write a default config file and exit
    #[arg(long)]
    pub init_config: bool,

    /// List serial ports and exit
    #[arg(long)]
    pub list_ports: bool,
}

impl CliArgs {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(port) = &self.port {
            cfg.port = port.clone();
        }
        if let Some(baud) = self.baud {
            cfg.baud_rate = baud;
        }
        if let Some(model) = &self.model {
            cfg.model_path = model.clone();
        }
        if let Some(threshold) = self.threshold {
            cfg.threshold = threshold;
        }
    }
}
