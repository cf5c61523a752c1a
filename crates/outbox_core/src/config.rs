//! Record store configuration.

/// Configuration for a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to flush the journal after every append and delete.
    pub sync_on_write: bool,

    /// Compact the journal once this many deletions have accumulated
    /// (0 = never compact automatically).
    pub compact_after: usize,

    /// Whether to create missing parent directories of a journal path.
    pub create_dirs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            compact_after: 1024,
            create_dirs: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to flush after every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the automatic compaction threshold.
    #[must_use]
    pub const fn compact_after(mut self, deletions: usize) -> Self {
        self.compact_after = deletions;
        self
    }

    /// Sets whether to create missing parent directories.
    #[must_use]
    pub const fn create_dirs(mut self, value: bool) -> Self {
        self.create_dirs = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.sync_on_write);
        assert!(config.create_dirs);
        assert_eq!(config.compact_after, 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .sync_on_write(false)
            .compact_after(0)
            .create_dirs(false);

        assert!(!config.sync_on_write);
        assert!(!config.create_dirs);
        assert_eq!(config.compact_after, 0);
    }
}
