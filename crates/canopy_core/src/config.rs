//! Engine configuration.

use uuid::Uuid;

/// Configuration for a sync tree.
///
/// Passed explicitly at construction; nothing in the engine reads global
/// state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Label attached to every log record of this engine instance.
    pub session: String,

    /// Whether to log each applied operation at debug level.
    pub log_operations: bool,

    /// Maximum number of writes that may be pending at once.
    pub max_pending_writes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: format!("session-{}", Uuid::new_v4().simple()),
            log_operations: false,
            max_pending_writes: 10_000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session label.
    #[must_use]
    pub fn session(mut self, label: impl Into<String>) -> Self {
        self.session = label.into();
        self
    }

    /// Sets whether each operation is logged.
    #[must_use]
    pub const fn log_operations(mut self, value: bool) -> Self {
        self.log_operations = value;
        self
    }

    /// Sets the pending write ceiling.
    #[must_use]
    pub const fn max_pending_writes(mut self, limit: usize) -> Self {
        self.max_pending_writes = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.session.starts_with("session-"));
        assert!(!config.log_operations);
        assert_eq!(config.max_pending_writes, 10_000);
    }

    #[test]
    fn default_sessions_differ() {
        assert_ne!(Config::default().session, Config::default().session);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .session("test")
            .log_operations(true)
            .max_pending_writes(2);

        assert_eq!(config.session, "test");
        assert!(config.log_operations);
        assert_eq!(config.max_pending_writes, 2);
    }
}
