/// Configuration for the undo history.
use collab_undo_config::UndoSettings;

use crate::ids::Origin;

/// Time window in milliseconds for merging consecutive changes
/// into a single undo step.
const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 500;

/// Maximum number of undo steps kept. Oldest steps are evicted first.
const DEFAULT_MAX_HISTORY_DEPTH: usize = 1_000;

/// Configuration for an `UndoManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Grouping window in milliseconds. 0 puts every change in its own step.
    pub capture_timeout_ms: u64,
    /// Max undo steps kept in memory.
    pub max_history_depth: usize,
    /// Origins whose changes are recorded.
    pub tracked_origins: Vec<Origin>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            max_history_depth: DEFAULT_MAX_HISTORY_DEPTH,
            tracked_origins: vec![Origin::Untagged],
        }
    }
}

impl From<&UndoSettings> for HistoryConfig {
    fn from(settings: &UndoSettings) -> Self {
        let mut tracked_origins = Vec::with_capacity(settings.tracked_origins.len() + 1);
        if settings.track_untagged {
            tracked_origins.push(Origin::Untagged);
        }
        tracked_origins.extend(settings.tracked_origins.iter().map(Origin::tag));
        Self {
            capture_timeout_ms: settings.capture_timeout_ms,
            max_history_depth: settings.max_history_depth.max(1),
            tracked_origins,
        }
    }
}
