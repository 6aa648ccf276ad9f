//! Binary runner utilities
//!
//! Provides a standardized way to run binaries with proper
//! logging, status heartbeat, and graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::sleep;
use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Status heartbeat interval in seconds
    pub heartbeat_interval_secs: u64,
}

impl RunConfig {
    /// Create a new run configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval_secs: 60,
        }
    }

    /// Set heartbeat interval
    pub fn with_heartbeat(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Trait for binary applications
#[allow(async_fn_in_trait)]
pub trait BinaryRunner {
    /// Run the application main loop
    async fn run(&mut self) -> anyhow::Result<()>;

    /// Get the run configuration
    fn config(&self) -> &RunConfig;

    /// Print startup banner
    fn print_banner(&self) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("Starting {}", config.name);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    /// Print shutdown banner
    fn print_shutdown(&self, stats: Option<&str>) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", config.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }

    /// Execute the binary with proper initialization and cleanup
    async fn execute(&mut self) -> anyhow::Result<()> {
        self.print_banner();
        let result = self.run().await;
        self.print_shutdown(None);
        result
    }
}

/// Manages graceful shutdown for long-running processes
#[derive(Clone)]
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
}

impl ShutdownManager {
    /// Create a new shutdown manager with running state
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn a Ctrl+C signal handler that triggers shutdown
    pub fn spawn_signal_handler(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("");
                info!("Received shutdown signal (Ctrl+C)");
                info!("Shutting down gracefully...");
                shutdown.trigger();
            }
        });
    }

    /// Request shutdown
    pub fn trigger(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Check if the process should continue running
    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for a duration, but wake early if shutdown is triggered
    pub async fn interruptible_sleep(&self, duration: Duration) {
        let check_interval = Duration::from_millis(50);
        let mut elapsed = Duration::ZERO;

        while elapsed < duration && self.is_running() {
            sleep(check_interval).await;
            elapsed += check_interval;
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("wamp-client").with_heartbeat(120);

        assert_eq!(config.name, "wamp-client");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::new("default");
        assert_eq!(config.heartbeat_interval_secs, 60);
    }

    #[tokio::test]
    async fn test_triggered_shutdown_cuts_sleep_short() {
        let shutdown = ShutdownManager::new();
        assert!(shutdown.is_running());

        shutdown.clone().trigger();
        let started = std::time::Instant::now();
        shutdown.interruptible_sleep(Duration::from_secs(10)).await;

        assert!(!shutdown.is_running());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
