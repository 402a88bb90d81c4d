//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `session` - Shared session setup (config, classifier) and export loading
//! - `categorize` - Category assignment for a transaction export
//! - `subscriptions` - Recurring payment detection
//! - `cashflow` - Cash flow summaries and insights
//! - `rules` - Rule listing and matching

pub mod cashflow;
pub mod categorize;
pub mod rules;
pub mod session;
pub mod subscriptions;

// Re-export command functions for main.rs
pub use cashflow::*;
pub use categorize::*;
pub use rules::*;
pub use session::*;
pub use subscriptions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
