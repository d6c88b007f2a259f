//! Configuration Module
//!
//! Configuration loading for the watcher service.

mod settings;

pub use settings::{
    ConfigError, FeedSettings, LogSettings, RetrySettings, TokenSettings, WatcherConfig,
};
