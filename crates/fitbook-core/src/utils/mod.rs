//! Utility functions for display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_class_time, format_optional, progress_bar, truncate_string};
