//! Configuration for the sync engine.

use std::time::Duration;

use statesync_core::SyncError;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, first one included.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each further failure.
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay,
            backoff_factor: 2.0,
        }
    }

    /// Policy used while provisioning a new file: 2 attempts, 200 ms apart.
    pub fn provisioning() -> Self {
        Self::new(2, Duration::from_millis(200))
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_factor.powi(exponent);
        Duration::from_nanos(nanos.round() as u64)
    }

    fn validate(&self, name: &str) -> Result<(), SyncError> {
        if self.attempts == 0 {
            return Err(SyncError::Configuration(format!(
                "{} retry policy needs at least one attempt",
                name
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(SyncError::Configuration(format!(
                "{} retry backoff factor must be >= 1, got {}",
                name, self.backoff_factor
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// What a user-scoped key starts from when it has no file yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserMigration {
    /// Seed the new file with the current container state.
    #[default]
    StartFresh,
    /// Seed the new file with the content of the shared (bare key) file, if one exists.
    CopyShared,
}

/// Configuration of a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Project hosting the backing file.
    pub project_id: String,
    /// Logical key of the synchronized state, e.g. `wordFreq`.
    pub storage_key: String,
    /// Prefix of provisioned file names.
    pub file_prefix: String,
    /// Keep one file per user instead of one per project.
    pub per_user: bool,
    pub user_migration: UserMigration,
    /// Autosave period. Zero disables autosave.
    pub autosave_interval: Duration,
    pub save_retry: RetryPolicy,
    pub load_retry: RetryPolicy,
    pub provisioning_retry: RetryPolicy,
}

impl EngineConfig {
    pub fn new(project_id: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            storage_key: storage_key.into(),
            file_prefix: "data".to_string(),
            per_user: false,
            user_migration: UserMigration::default(),
            autosave_interval: Duration::from_secs(30),
            save_retry: RetryPolicy::default(),
            load_retry: RetryPolicy::default(),
            provisioning_retry: RetryPolicy::provisioning(),
        }
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_per_user(mut self, per_user: bool) -> Self {
        self.per_user = per_user;
        self
    }

    pub fn with_user_migration(mut self, migration: UserMigration) -> Self {
        self.user_migration = migration;
        self
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn with_save_retry(mut self, policy: RetryPolicy) -> Self {
        self.save_retry = policy;
        self
    }

    pub fn with_load_retry(mut self, policy: RetryPolicy) -> Self {
        self.load_retry = policy;
        self
    }

    pub fn with_provisioning_retry(mut self, policy: RetryPolicy) -> Self {
        self.provisioning_retry = policy;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.project_id.trim().is_empty() {
            return Err(SyncError::Configuration("project_id is empty".to_string()));
        }
        if self.storage_key.trim().is_empty() {
            return Err(SyncError::Configuration("storage_key is empty".to_string()));
        }
        if self.file_prefix.contains('/') {
            return Err(SyncError::Configuration(format!(
                "file_prefix must not contain '/': {}",
                self.file_prefix
            )));
        }
        self.save_retry.validate("save")?;
        self.load_retry.validate("load")?;
        self.provisioning_retry.validate("provisioning")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));

        let flat = policy.with_backoff_factor(1.0);
        assert_eq!(flat.delay_for(3), Duration::from_millis(100));
    }

    #[test]
    fn test_provisioning_policy() {
        let policy = RetryPolicy::provisioning();
        assert_eq!(policy.attempts, 2);
        assert_eq!(policy.initial_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::new("p1", "wordFreq").validate().is_ok());
        assert!(EngineConfig::new("", "wordFreq").validate().is_err());
        assert!(EngineConfig::new("p1", " ").validate().is_err());

        let zero = EngineConfig::new("p1", "k").with_save_retry(RetryPolicy::new(0, Duration::ZERO));
        let err = zero.validate().unwrap_err();
        assert!(err.to_string().contains("at least one attempt"));

        let shrinking = EngineConfig::new("p1", "k")
            .with_load_retry(RetryPolicy::default().with_backoff_factor(0.5));
        assert!(matches!(shrinking.validate(), Err(SyncError::Configuration(_))));
    }
}
