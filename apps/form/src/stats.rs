//! Upload statistics panel and the shell toggle that shows it.

use tracing::warn;

use crate::gateway::{FormGateway, UploadStats};
use crate::messages;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsPanel {
    Loading,
    Loaded(UploadStats),
    Failed(String),
}

impl StatsPanel {
    /// Fetches the statistics once. Independent of any form state.
    pub async fn load<G: FormGateway + ?Sized>(gateway: &G) -> Self {
        match gateway.fetch_stats().await {
            Ok(stats) => StatsPanel::Loaded(stats),
            Err(e) => {
                warn!(error = %e, "failed to load upload statistics");
                StatsPanel::Failed(messages::STATS_LOAD_FAILED.to_string())
            }
        }
    }
}

/// Display name of a storage backend, e.g. `LocalStorageBackend` → `Local`.
pub fn storage_label(backend: &str) -> &str {
    backend
        .strip_suffix("StorageBackend")
        .or_else(|| backend.strip_suffix("Backend"))
        .unwrap_or(backend)
}

/// Root view state. Whether the statistics are shown is owned here and passed
/// down, never kept in a global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellState {
    pub show_stats: bool,
}

impl ShellState {
    pub fn toggle_stats(&mut self) {
        self.show_stats = !self.show_stats;
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.show_stats {
            messages::HIDE_STATS
        } else {
            messages::SHOW_STATS
        }
    }
}
