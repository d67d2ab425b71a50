//! crates/edwin_core/src/sync.rs
//!
//! Auto-sync of course pages into the backend knowledge base.
//!
//! A page is uploaded at most once per cooldown window. Eligibility is
//! recomputed on every check, so a page becomes eligible again as soon as its
//! cooldown lapses. Only successful uploads are recorded, and failures are
//! never retried in place: the next visit is the next attempt.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::control::BusyGuard;
use crate::domain::{CourseContext, PageType, SyncStats};
use crate::ports::{Control, HostPage, PanelView, PortError, PortResult, StatusArea, StatusKind};
use crate::state::ClientState;

/// Why the current page will not be auto-synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    Disabled,
    UnsupportedPage(PageType),
    NoCourse,
    CoolingDown { last_synced: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    InsufficientContent { chars: usize },
    Api(PortError),
    Storage(PortError),
}

/// Where a page visit stands in the auto-sync lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Ineligible(Ineligibility),
    Eligible,
    Syncing,
    Synced { title: String, at: DateTime<Utc> },
    Failed(SyncFailure),
}

pub struct SyncScheduler {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
}

impl SyncScheduler {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self { state, view }
    }

    /// `Eligible` or the first reason the page is not.
    pub fn check(&self, page: &dyn HostPage) -> PortResult<SyncState> {
        let settings = &self.state.settings;

        let preference = self.state.storage.auto_sync_preference()?;
        if !preference.is_enabled(settings.auto_sync_enabled_by_default) {
            return Ok(SyncState::Ineligible(Ineligibility::Disabled));
        }

        let page_type = crate::extract::page_type(page.url());
        if !settings.is_syncable(page_type) {
            return Ok(SyncState::Ineligible(Ineligibility::UnsupportedPage(page_type)));
        }

        if crate::identity::course_id(page.url()).is_none() {
            return Ok(SyncState::Ineligible(Ineligibility::NoCourse));
        }

        let record = self.state.storage.sync_record()?;
        if let Some(last_synced) = record.last_synced(page.url()) {
            if self.state.clock.now() - last_synced < settings.sync_cooldown {
                return Ok(SyncState::Ineligible(Ineligibility::CoolingDown { last_synced }));
            }
        }

        Ok(SyncState::Eligible)
    }

    pub fn should_auto_sync(&self, page: &dyn HostPage) -> bool {
        match self.check(page) {
            Ok(state) => state == SyncState::Eligible,
            Err(e) => {
                warn!(error = %e, "Could not read auto-sync state");
                false
            }
        }
    }

    /// Runs one auto-sync attempt for `page` and returns where it ended.
    pub async fn perform(&self, page: &dyn HostPage) -> SyncState {
        match self.check(page) {
            Ok(SyncState::Eligible) => {}
            Ok(other) => {
                debug!(state = ?other, url = page.url(), "Skipping auto-sync");
                return other;
            }
            Err(e) => return SyncState::Failed(SyncFailure::Storage(e)),
        }

        let ctx = match self.state.course_context(page) {
            Ok(Some(ctx)) => ctx,
            Ok(None) => return SyncState::Ineligible(Ineligibility::NoCourse),
            Err(e) => return SyncState::Failed(SyncFailure::Storage(e)),
        };

        info!(url = page.url(), "Starting auto-sync");
        let outcome = self.upload(&ctx, page).await;
        if let SyncState::Synced { title, .. } = &outcome {
            self.view.notify(&format!("Auto-synced: {}", title));
        }
        outcome
    }

    /// Waits for the host page to settle, then performs one attempt.
    ///
    /// Returns `None` if `cancel` fires first.
    pub async fn run_after_settle(
        &self,
        page: &dyn HostPage,
        cancel: &CancellationToken,
    ) -> Option<SyncState> {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Auto-sync cancelled before the page settled");
                None
            }
            _ = tokio::time::sleep(self.state.settings.settle_delay) => {
                Some(self.perform(page).await)
            }
        }
    }

    /// The manual "Sync This Page" action. Ignores the preference and cooldown.
    pub async fn sync_now(&self, page: &dyn HostPage) -> SyncState {
        let view = self.view.as_ref();

        let ctx = match self.state.course_context(page) {
            Ok(Some(ctx)) => ctx,
            Ok(None) => {
                view.show_status(
                    StatusArea::Sync,
                    StatusKind::Error,
                    "Please navigate to a Canvas course page",
                );
                return SyncState::Ineligible(Ineligibility::NoCourse);
            }
            Err(e) => return SyncState::Failed(SyncFailure::Storage(e)),
        };

        let _busy = BusyGuard::engage(view, Control::SyncPage, "Syncing...");
        view.show_status(StatusArea::Sync, StatusKind::Info, "Extracting page content...");

        let outcome = self.upload(&ctx, page).await;
        match &outcome {
            SyncState::Synced { .. } => {
                let blocks = self.state.extractor.extract(page).text.chars().count() / 100;
                view.show_status(
                    StatusArea::Sync,
                    StatusKind::Success,
                    &format!("Page synced! Added {} content blocks", blocks),
                );
            }
            SyncState::Failed(SyncFailure::InsufficientContent { .. }) => view.show_status(
                StatusArea::Sync,
                StatusKind::Error,
                "No significant content found on this page",
            ),
            SyncState::Failed(SyncFailure::Api(e) | SyncFailure::Storage(e)) => view.show_status(
                StatusArea::Sync,
                StatusKind::Error,
                &format!("Sync failed: {}", e),
            ),
            _ => {}
        }
        outcome
    }

    async fn upload(&self, ctx: &CourseContext, page: &dyn HostPage) -> SyncState {
        let content = self.state.extractor.extract(page);
        let chars = content.text.chars().count();
        if chars < self.state.settings.min_sync_chars {
            info!(chars, url = %content.url, "Insufficient content, not syncing");
            return SyncState::Failed(SyncFailure::InsufficientContent { chars });
        }

        if let Err(e) = self.state.backend.sync_page_content(ctx, &content).await {
            error!(error = %e, url = %content.url, "Failed to sync page");
            return SyncState::Failed(SyncFailure::Api(e));
        }

        let at = self.state.clock.now();
        match self.state.storage.mark_synced(&content.url, at) {
            Ok(record) => {
                self.view.render_sync_status(&record.status_line(at));
                info!(title = %content.title, "Page synced");
                SyncState::Synced {
                    title: content.title,
                    at,
                }
            }
            Err(e) => {
                error!(error = %e, "Synced page but could not record it");
                SyncState::Failed(SyncFailure::Storage(e))
            }
        }
    }

    pub fn status_line(&self) -> String {
        match self.state.storage.sync_record() {
            Ok(record) => record.status_line(self.state.clock.now()),
            Err(e) => {
                warn!(error = %e, "Could not read sync history");
                "No pages synced yet".to_string()
            }
        }
    }

    pub fn stats(&self) -> PortResult<SyncStats> {
        Ok(self.state.storage.sync_record()?.stats())
    }

    pub fn clear_history(&self) -> PortResult<()> {
        self.state.storage.clear_sync_record()?;
        info!("Sync history cleared");
        self.view.render_sync_status(&self.status_line());
        Ok(())
    }
}
