//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `Watcher`: Keeps the feed subscription alive across failures

mod watcher;

pub use watcher::{CycleError, Watcher, WatcherError, WatcherState};
