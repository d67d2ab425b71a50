//! crates/edwin_core/src/state.rs
//!
//! The shared client state, created once at startup and handed to every
//! controller.

use std::sync::Arc;

use crate::domain::CourseContext;
use crate::extract::PageExtractor;
use crate::identity::{self, IdentityResolver};
use crate::ports::{BackendService, Clock, HostPage, KeyValueStore, PortResult};
use crate::settings::ClientSettings;
use crate::storage::EdwinStorage;

pub struct ClientState {
    pub settings: Arc<ClientSettings>,
    pub storage: EdwinStorage,
    pub backend: Arc<dyn BackendService>,
    pub clock: Arc<dyn Clock>,
    pub identity: IdentityResolver,
    pub extractor: PageExtractor,
}

impl ClientState {
    pub fn new(
        settings: Arc<ClientSettings>,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn BackendService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let storage = EdwinStorage::new(store);
        Self {
            identity: IdentityResolver::new(settings.clone(), storage.clone()),
            extractor: PageExtractor::new(settings.clone()),
            settings,
            storage,
            backend,
            clock,
        }
    }

    /// The learner token and course for `page`, or `None` off a course page.
    pub fn course_context(&self, page: &dyn HostPage) -> PortResult<Option<CourseContext>> {
        let Some(course_id) = identity::course_id(page.url()) else {
            return Ok(None);
        };
        let user_token = self.identity.user_token(page)?;
        Ok(Some(CourseContext {
            user_token,
            course_id,
        }))
    }
}
