// src/alert.rs

//! User-facing alerts
//!
//! Build and install completions emit one alert each; the sink decides
//! where it goes. `CliAlerts` writes to the terminal, `LogAlerts` to the
//! tracing log.

use tracing::{info, warn};

/// Severity of a user-facing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Success,
    Danger,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Danger => "danger",
        }
    }
}

/// Destination for user-facing alerts.
pub trait AlertSink {
    fn alert(&self, level: AlertLevel, message: &str);
}

/// Prints alerts to stdout/stderr.
#[derive(Debug, Default)]
pub struct CliAlerts;

impl AlertSink for CliAlerts {
    fn alert(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Info => println!("  {}", message),
            AlertLevel::Success => println!("✓ {}", message),
            AlertLevel::Danger => eprintln!("✗ {}", message),
        }
    }
}

/// Routes alerts into the tracing log.
#[derive(Debug, Default)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Info | AlertLevel::Success => info!("{}", message),
            AlertLevel::Danger => warn!("{}", message),
        }
    }
}
