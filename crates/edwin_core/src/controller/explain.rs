//! crates/edwin_core/src/controller/explain.rs

use std::sync::Arc;
use tracing::error;

use super::control::BusyGuard;
use crate::domain::{ExplainMode, Explanation};
use crate::ports::{Control, HostPage, PanelView, PortResult, StatusArea, StatusKind};
use crate::state::ClientState;

/// "Explain this page" and "practice questions" over the current page text.
pub struct ExplainController {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
}

impl ExplainController {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self { state, view }
    }

    fn min_chars(&self, mode: ExplainMode) -> usize {
        match mode {
            ExplainMode::Explain => self.state.settings.min_sync_chars,
            ExplainMode::Practice => self.state.settings.min_practice_chars,
        }
    }

    pub async fn explain(&self, page: &dyn HostPage, mode: ExplainMode) -> PortResult<Option<Explanation>> {
        let Some(ctx) = self.state.course_context(page)? else {
            self.view.show_status(
                StatusArea::Explain,
                StatusKind::Error,
                "Please navigate to a Canvas course page",
            );
            return Ok(None);
        };

        let content = self.state.extractor.extract(page);
        if content.text.chars().count() < self.min_chars(mode) {
            self.view.show_status(
                StatusArea::Explain,
                StatusKind::Error,
                "No significant content found on this page",
            );
            return Ok(None);
        }

        let (control, label) = match mode {
            ExplainMode::Explain => (Control::ExplainPage, "Analyzing..."),
            ExplainMode::Practice => (Control::PracticeQuestions, "Generating..."),
        };
        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), control, label);
            self.state.backend.explain_page(&ctx, &content, mode).await
        };

        match result {
            Ok(explanation) => {
                self.view.render_explanation(&explanation, mode);
                Ok(Some(explanation))
            }
            Err(e) => {
                error!(error = %e, mode = mode.as_str(), "Explain request failed");
                self.view.show_status(
                    StatusArea::Explain,
                    StatusKind::Error,
                    &format!("Failed to analyze page: {}", e),
                );
                Ok(None)
            }
        }
    }
}
