//! crates/edwin_core/src/controller/panel.rs
//!
//! The assembled panel: every controller wired to one shared state and view,
//! plus the sequence that runs when a page loads.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    ChatController, ExplainController, MaterialsController, ProgressController, QuizController,
    SettingsController,
};
use crate::domain::CourseId;
use crate::ports::{HostPage, PanelView, PortResult};
use crate::state::ClientState;
use crate::sync::{SyncScheduler, SyncState};

/// What the page-load sequence found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoad {
    pub online: bool,
    pub course_id: Option<CourseId>,
    /// `None` when no sync attempt was made.
    pub sync: Option<SyncState>,
}

pub struct Panel {
    pub state: Arc<ClientState>,
    pub view: Arc<dyn PanelView>,
    pub chat: ChatController,
    pub quiz: QuizController,
    pub progress: ProgressController,
    pub explain: ExplainController,
    pub materials: MaterialsController,
    pub settings: SettingsController,
    pub sync: SyncScheduler,
}

impl Panel {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self {
            chat: ChatController::new(state.clone(), view.clone()),
            quiz: QuizController::new(state.clone(), view.clone()),
            progress: ProgressController::new(state.clone(), view.clone()),
            explain: ExplainController::new(state.clone(), view.clone()),
            materials: MaterialsController::new(state.clone(), view.clone()),
            settings: SettingsController::new(state.clone(), view.clone()),
            sync: SyncScheduler::new(state.clone(), view.clone()),
            state,
            view,
        }
    }

    /// Health check, identity and course resolution, then (on a course page
    /// with the backend reachable) a new conversation, the progress bar and
    /// one auto-sync attempt after the page settles.
    pub async fn on_page_load(&self, page: &dyn HostPage, cancel: &CancellationToken) -> PortResult<PageLoad> {
        let online = match self.state.backend.check_health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(error = %e, "Backend health check failed");
                false
            }
        };
        self.view.set_backend_online(online);

        let ctx = self.state.course_context(page)?;
        self.view.render_sync_status(&self.sync.status_line());

        let Some(ctx) = ctx else {
            info!(url = page.url(), "Not a course page");
            return Ok(PageLoad {
                online,
                course_id: None,
                sync: None,
            });
        };
        info!(course_id = ctx.course_id, online, "Course page loaded");

        if !online {
            return Ok(PageLoad {
                online,
                course_id: Some(ctx.course_id),
                sync: None,
            });
        }

        self.chat.new_conversation(page).await?;
        self.progress.refresh_progress(page).await?;
        let sync = self.sync.run_after_settle(page, cancel).await;

        Ok(PageLoad {
            online,
            course_id: Some(ctx.course_id),
            sync,
        })
    }
}
