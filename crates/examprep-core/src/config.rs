//! Tunable exam constants.
//!
//! Thresholds, timings, and generation caps shared by the session, scoring,
//! and analytics layers. Loaded from the `[exam]` table of `examprep.toml`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exam-wide configuration constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Minimum overall score that counts as a pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u32,
    /// Section average at or above which a section is a strength.
    #[serde(default = "default_strength_threshold")]
    pub strength_threshold: u32,
    /// Section average below which a section is a weakness.
    #[serde(default = "default_weakness_threshold")]
    pub weakness_threshold: u32,
    /// Fraction of the initial duration at which the time warning turns on.
    #[serde(default = "default_time_warning_fraction")]
    pub time_warning_fraction: f64,
    /// Number of attempts shown in the score trend.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Number of recent attempts used for time metrics.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    /// Seconds per question considered full speed.
    #[serde(default = "default_target_secs")]
    pub target_secs_per_question: u32,
    /// Delay between an answer locking and the question fading.
    #[serde(default = "default_lock_fade_ms")]
    pub lock_fade_ms: u64,
    /// Delay between an answer locking and the next generated question loading.
    #[serde(default = "default_next_question_delay_ms")]
    pub next_question_delay_ms: u64,
    /// Extra generator calls allowed when the generator repeats a question.
    #[serde(default = "default_duplicate_retries")]
    pub max_duplicate_retries: u32,
    /// Retries on transient generator errors before using the fallback pool.
    #[serde(default = "default_generation_retries")]
    pub max_generation_retries: u32,
    /// Delay between transient generator retries.
    #[serde(default = "default_generation_retry_delay_ms")]
    pub generation_retry_delay_ms: u64,
    /// Generator calls allowed over a whole session.
    #[serde(default = "default_generation_cap")]
    pub max_generation_requests: u32,
}

fn default_pass_threshold() -> u32 {
    70
}
fn default_strength_threshold() -> u32 {
    75
}
fn default_weakness_threshold() -> u32 {
    60
}
fn default_time_warning_fraction() -> f64 {
    0.33
}
fn default_trend_window() -> usize {
    10
}
fn default_recent_window() -> usize {
    5
}
fn default_target_secs() -> u32 {
    60
}
fn default_lock_fade_ms() -> u64 {
    1200
}
fn default_next_question_delay_ms() -> u64 {
    1500
}
fn default_duplicate_retries() -> u32 {
    1
}
fn default_generation_retries() -> u32 {
    1
}
fn default_generation_retry_delay_ms() -> u64 {
    500
}
fn default_generation_cap() -> u32 {
    200
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            strength_threshold: default_strength_threshold(),
            weakness_threshold: default_weakness_threshold(),
            time_warning_fraction: default_time_warning_fraction(),
            trend_window: default_trend_window(),
            recent_window: default_recent_window(),
            target_secs_per_question: default_target_secs(),
            lock_fade_ms: default_lock_fade_ms(),
            next_question_delay_ms: default_next_question_delay_ms(),
            max_duplicate_retries: default_duplicate_retries(),
            max_generation_retries: default_generation_retries(),
            generation_retry_delay_ms: default_generation_retry_delay_ms(),
            max_generation_requests: default_generation_cap(),
        }
    }
}

impl ExamConfig {
    pub fn lock_fade(&self) -> Duration {
        Duration::from_millis(self.lock_fade_ms)
    }

    pub fn next_question_delay(&self) -> Duration {
        Duration::from_millis(self.next_question_delay_ms)
    }

    pub fn generation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.generation_retry_delay_ms)
    }

    /// Check that thresholds are ordered and fractions are in range.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.pass_threshold <= 100, "pass_threshold must be at most 100");
        anyhow::ensure!(
            self.weakness_threshold <= self.strength_threshold,
            "weakness_threshold must not exceed strength_threshold"
        );
        anyhow::ensure!(
            self.strength_threshold <= 100,
            "strength_threshold must be at most 100"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.time_warning_fraction),
            "time_warning_fraction must be between 0.0 and 1.0"
        );
        anyhow::ensure!(self.trend_window >= 1, "trend_window must be at least 1");
        anyhow::ensure!(self.recent_window >= 1, "recent_window must be at least 1");
        anyhow::ensure!(
            self.target_secs_per_question >= 1,
            "target_secs_per_question must be at least 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExamConfig::default();
        assert_eq!(config.pass_threshold, 70);
        assert_eq!(config.strength_threshold, 75);
        assert_eq!(config.weakness_threshold, 60);
        assert_eq!(config.max_duplicate_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ExamConfig = toml::from_str("pass_threshold = 75\nlock_fade_ms = 10").unwrap();
        assert_eq!(config.pass_threshold, 75);
        assert_eq!(config.lock_fade(), Duration::from_millis(10));
        assert_eq!(config.trend_window, 10);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = ExamConfig {
            weakness_threshold: 80,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
