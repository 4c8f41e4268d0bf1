//! Logger initialisation and frame timing diagnostics.

use std::sync::Once;
use std::time::{Duration, Instant};

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "inkpass=debug,wgpu=warn"). When unset, `RUST_LOG` is consulted.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
            // wgpu is chatty at info
            builder.filter_module("wgpu_core", log::LevelFilter::Warn);
            builder.filter_module("wgpu_hal", log::LevelFilter::Warn);
        }

        builder.write_style(config.write_style);

        // try_init: a test harness or host may already own the global logger
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

/// Aggregates frame times and reports them at `debug` level once per interval.
pub struct FrameStats {
    interval: Duration,
    window_start: Instant,
    frames: u32,
    worst: Duration,
}

impl FrameStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            frames: 0,
            worst: Duration::ZERO,
        }
    }

    /// Records one frame. Returns the average frames per second when a report
    /// interval has elapsed.
    pub fn record(&mut self, frame_time: Duration) -> Option<f32> {
        self.frames += 1;
        self.worst = self.worst.max(frame_time);

        let elapsed = self.window_start.elapsed();
        if elapsed < self.interval {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        log::debug!(
            "{:.1} fps over {} frames (worst {:.2} ms)",
            fps,
            self.frames,
            self.worst.as_secs_f64() * 1000.0
        );

        self.window_start = Instant::now();
        self.frames = 0;
        self.worst = Duration::ZERO;
        Some(fps)
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig {
            env_filter: Some("debug".into()),
            ..Default::default()
        });
    }

    #[test]
    fn frame_stats_reports_after_interval() {
        let mut stats = FrameStats::new(Duration::ZERO);
        let fps = stats.record(Duration::from_millis(16));
        assert!(fps.is_some());
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn frame_stats_accumulates_within_interval() {
        let mut stats = FrameStats::new(Duration::from_secs(3600));
        assert!(stats.record(Duration::from_millis(16)).is_none());
        assert!(stats.record(Duration::from_millis(20)).is_none());
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.worst, Duration::from_millis(20));
    }
}
