//! Logging setup and training progress logging on top of `tracing`.

use std::str::FromStr;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Subscriber settings chosen by the binaries
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Print the module path of each event
    pub include_target: bool,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug level with module targets, used by `--verbose`
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// CLI flags: `--verbose` picks the debug preset, an explicit
    /// `--log-level` overrides its level
    pub fn from_flags(verbose: bool, level: Option<LogLevel>) -> Self {
        let mut config = if verbose { Self::verbose() } else { Self::default() };
        if let Some(level) = level {
            config.level = level;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Install the global `tracing` subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level.to_tracing_level())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Per-epoch progress lines for one training phase
pub struct PhaseLogger {
    phase: String,
    max_epochs: usize,
    epoch: usize,
    epoch_start: Instant,
    phase_start: Instant,
}

impl PhaseLogger {
    pub fn new(phase: &str, max_epochs: usize) -> Self {
        tracing::info!("{}: up to {} epochs", phase, max_epochs);
        Self {
            phase: phase.to_string(),
            max_epochs,
            epoch: 0,
            epoch_start: Instant::now(),
            phase_start: Instant::now(),
        }
    }

    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();
        tracing::debug!("{}: epoch {}/{} started", self.phase, epoch + 1, self.max_epochs);
    }

    pub fn end_epoch(&self, loss: f64, accuracy: f64, val_accuracy: Option<f64>, learning_rate: f64) {
        let val = val_accuracy
            .map(|acc| format!(" | Val Acc: {:.2}%", acc * 100.0))
            .unwrap_or_default();

        tracing::info!(
            "{}: epoch {}/{} in {:.1}s | Loss: {:.4} | Acc: {:.2}%{} | LR: {:.2e}",
            self.phase,
            self.epoch + 1,
            self.max_epochs,
            self.epoch_start.elapsed().as_secs_f64(),
            loss,
            accuracy * 100.0,
            val,
            learning_rate
        );
    }

    pub fn log_early_stop(&self, patience: usize, best_epoch: usize) {
        tracing::warn!(
            "{}: no loss improvement for {} epochs, restoring weights from epoch {}",
            self.phase,
            patience,
            best_epoch + 1
        );
    }

    pub fn log_complete(&self, epochs_run: usize, best_loss: f64) {
        tracing::info!(
            "{}: finished {} epochs in {:.1}s | best loss {:.4}",
            self.phase,
            epochs_run,
            self.phase_start.elapsed().as_secs_f64(),
            best_loss
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("Warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_verbose_config() {
        let config = LogConfig::verbose();
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.include_target);
        assert_eq!(LogConfig::default().level, LogLevel::Info);
    }

    #[test]
    fn test_config_from_flags() {
        assert_eq!(LogConfig::from_flags(false, None).level, LogLevel::Info);
        assert!(LogConfig::from_flags(true, None).include_target);

        let quiet = LogConfig::from_flags(true, Some(LogLevel::Warn));
        assert_eq!(quiet.level, LogLevel::Warn);
        assert!(quiet.include_target);
    }
}
