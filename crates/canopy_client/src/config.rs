//! Configuration for the client.

use canopy_core::Config;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Engine configuration.
    pub core: Config,
    /// Catch panics raised by listener callbacks and log them instead of
    /// unwinding through the engine.
    pub guard_callbacks: bool,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            core: Config::default(),
            guard_callbacks: true,
        }
    }

    /// Sets the engine configuration.
    pub fn with_core(mut self, core: Config) -> Self {
        self.core = core;
        self
    }

    /// Sets whether callback panics are caught.
    pub fn with_guard_callbacks(mut self, guard: bool) -> Self {
        self.guard_callbacks = guard;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_builder() {
        let config = ClientConfig::new()
            .with_core(Config::new().session("replay").max_pending_writes(5))
            .with_guard_callbacks(false);

        assert_eq!(config.core.session, "replay");
        assert_eq!(config.core.max_pending_writes, 5);
        assert!(!config.guard_callbacks);
        assert!(ClientConfig::default().guard_callbacks);
    }
}
