//! crates/edwin_core/src/controller/progress.rs

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Mastery, Progress};
use crate::ports::{HostPage, PanelView, PortResult};
use crate::state::ClientState;

/// Progress bar and mastery dashboard. Both are read-only views, so a
/// failed fetch just leaves the previous rendering in place.
pub struct ProgressController {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
}

impl ProgressController {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self { state, view }
    }

    pub async fn refresh_progress(&self, page: &dyn HostPage) -> PortResult<Option<Progress>> {
        let Some(ctx) = self.state.course_context(page)? else {
            return Ok(None);
        };

        match self.state.backend.get_progress(&ctx).await {
            Ok(progress) => {
                debug!(stage = progress.stage(), "Progress loaded");
                self.view.render_progress(&progress);
                Ok(Some(progress))
            }
            Err(e) => {
                warn!(error = %e, "Could not load progress");
                Ok(None)
            }
        }
    }

    pub async fn load_mastery(&self, page: &dyn HostPage) -> PortResult<Option<Mastery>> {
        let Some(ctx) = self.state.course_context(page)? else {
            return Ok(None);
        };

        match self.state.backend.get_mastery(&ctx).await {
            Ok(mastery) => {
                self.view.render_mastery(&mastery);
                Ok(Some(mastery))
            }
            Err(e) => {
                warn!(error = %e, "Could not load mastery");
                Ok(None)
            }
        }
    }

    /// Course-wide insights, passed through as the backend returns them.
    pub async fn insights(&self, page: &dyn HostPage) -> PortResult<Option<serde_json::Value>> {
        let Some(course_id) = crate::identity::course_id(page.url()) else {
            return Ok(None);
        };
        match self.state.backend.get_insights(course_id).await {
            Ok(insights) => Ok(Some(insights)),
            Err(e) => {
                warn!(error = %e, "Could not load insights");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TopicMastery;
    use crate::ports::PortError;
    use crate::test_support::{FakeBackend, FakePage, Harness, ViewEvent};

    const GRADES: &str = "https://canvas.example.edu/courses/12345/grades";

    #[tokio::test]
    async fn renders_progress() {
        let h = Harness::new();
        let progress = ProgressController::new(h.state.clone(), h.view.clone());

        let loaded = progress.refresh_progress(&FakePage::new(GRADES)).await.unwrap().unwrap();

        assert_eq!(loaded.stage(), 2);
        assert_eq!(h.view.events(), vec![ViewEvent::Progress(loaded)]);
    }

    #[tokio::test]
    async fn failures_leave_the_view_alone() {
        let h = Harness::new();
        FakeBackend::respond(&h.backend.mastery, Err(PortError::Network("refused".into())));
        let progress = ProgressController::new(h.state.clone(), h.view.clone());

        assert_eq!(progress.load_mastery(&FakePage::new(GRADES)).await.unwrap(), None);
        assert!(h.view.events().is_empty());
    }

    #[tokio::test]
    async fn renders_mastery_topics() {
        let h = Harness::new();
        let topic = TopicMastery {
            topic: "TCP".into(),
            accuracy: 0.5,
            attempts: 4,
            correct: 2,
            total: 4,
        };
        FakeBackend::respond(
            &h.backend.mastery,
            Ok(Mastery {
                streak_days: 3,
                total_attempts: 4,
                last_active: None,
                topics: vec![topic.clone()],
                weakest_topics: vec![topic],
            }),
        );
        let progress = ProgressController::new(h.state.clone(), h.view.clone());

        let mastery = progress.load_mastery(&FakePage::new(GRADES)).await.unwrap().unwrap();

        assert_eq!(mastery.weakest_topics[0].topic, "TCP");
        assert!(matches!(&h.view.events()[0], ViewEvent::Mastery(m) if m.streak_days == 3));
    }

    #[tokio::test]
    async fn nothing_is_fetched_off_course() {
        let h = Harness::new();
        let progress = ProgressController::new(h.state.clone(), h.view.clone());
        let page = FakePage::new("https://canvas.example.edu/profile");

        assert_eq!(progress.refresh_progress(&page).await.unwrap(), None);
        assert_eq!(progress.insights(&page).await.unwrap(), None);
        assert!(h.backend.calls().is_empty());
    }
}
