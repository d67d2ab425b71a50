//! crates/edwin_core/src/controller/settings.rs
//!
//! The settings panel: auto-sync toggle and Canvas material sync.

use std::sync::Arc;
use tracing::{error, info};

use super::control::BusyGuard;
use crate::domain::MaterialSyncReport;
use crate::ports::{Control, HostPage, PanelView, PortResult, StatusArea, StatusKind};
use crate::state::ClientState;

pub struct SettingsController {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
}

impl SettingsController {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self { state, view }
    }

    pub fn auto_sync_enabled(&self) -> PortResult<bool> {
        Ok(self
            .state
            .storage
            .auto_sync_preference()?
            .is_enabled(self.state.settings.auto_sync_enabled_by_default))
    }

    pub fn set_auto_sync(&self, enabled: bool) -> PortResult<()> {
        self.state.storage.set_auto_sync_enabled(enabled)?;
        info!(enabled, "Auto-sync preference saved");
        self.view.notify(if enabled {
            "Auto-sync enabled"
        } else {
            "Auto-sync disabled"
        });
        Ok(())
    }

    /// The Canvas token saved by the last successful material sync.
    pub fn saved_canvas_token(&self) -> PortResult<Option<String>> {
        self.state.storage.canvas_token()
    }

    /// Pulls course files from Canvas into the backend using the learner's
    /// API token. The token is saved only after a successful sync.
    pub async fn sync_canvas_materials(
        &self,
        page: &dyn HostPage,
        canvas_token: &str,
    ) -> PortResult<Option<MaterialSyncReport>> {
        let canvas_token = canvas_token.trim();
        if canvas_token.is_empty() {
            self.view
                .show_status(StatusArea::Sync, StatusKind::Error, "Please enter Canvas API token");
            return Ok(None);
        }
        let Some(course_id) = crate::identity::course_id(page.url()) else {
            self.view.show_status(
                StatusArea::Sync,
                StatusKind::Error,
                "Please navigate to a Canvas course page",
            );
            return Ok(None);
        };

        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::SyncCanvasMaterials, "Syncing...");
            self.view.show_status(
                StatusArea::Sync,
                StatusKind::Info,
                "Fetching materials from Canvas...",
            );
            self.state
                .backend
                .sync_canvas_materials(course_id, canvas_token)
                .await
        };

        match result {
            Ok(report) => {
                self.state.storage.set_canvas_token(canvas_token)?;
                info!(ingested = report.ingested, skipped = report.skipped, "Canvas materials synced");
                self.view.show_status(
                    StatusArea::Sync,
                    StatusKind::Success,
                    &format!(
                        "Materials synced ({} new, {} skipped)",
                        report.ingested, report.skipped
                    ),
                );
                Ok(Some(report))
            }
            Err(e) => {
                error!(error = %e, "Canvas material sync failed");
                self.view
                    .show_status(StatusArea::Sync, StatusKind::Error, &e.to_string());
                Ok(None)
            }
        }
    }
}
