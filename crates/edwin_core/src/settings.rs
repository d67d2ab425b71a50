//! crates/edwin_core/src/settings.rs
//!
//! Immutable client settings, built once at startup and shared by `Arc`.

use chrono::Duration as ChronoDuration;
use std::time::Duration;

use crate::domain::PageType;

/// Per-endpoint request timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub default: Duration,
    pub health: Duration,
    pub chat: Duration,
    pub page_sync: Duration,
    pub quiz_generation: Duration,
    pub exam_generation: Duration,
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(10),
            health: Duration::from_secs(3),
            chat: Duration::from_secs(30),
            page_sync: Duration::from_secs(15),
            quiz_generation: Duration::from_secs(30),
            exam_generation: Duration::from_secs(60),
            upload: Duration::from_secs(120),
        }
    }
}

/// Behavioural constants of the client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub auto_sync_enabled_by_default: bool,
    pub sync_cooldown: ChronoDuration,
    pub settle_delay: Duration,
    pub syncable_page_types: Vec<PageType>,

    /// Matched blocks must be longer than this to be kept.
    pub min_block_chars: usize,
    pub min_sync_chars: usize,
    pub min_practice_chars: usize,
    pub max_upload_bytes: u64,

    pub default_display_name: String,
    pub name_selectors: Vec<String>,
    pub name_boilerplate: Vec<String>,
    pub content_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    /// Ids or classes of containers whose text is never extracted.
    pub skip_containers: Vec<String>,

    pub timeouts: Timeouts,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            auto_sync_enabled_by_default: true,
            sync_cooldown: ChronoDuration::hours(12),
            settle_delay: Duration::from_secs(2),
            syncable_page_types: vec![
                PageType::Syllabus,
                PageType::Assignments,
                PageType::Assignment,
                PageType::Modules,
                PageType::Announcements,
            ],
            min_block_chars: 20,
            min_sync_chars: 50,
            min_practice_chars: 100,
            max_upload_bytes: 50 * 1024 * 1024,
            default_display_name: "Student".to_string(),
            name_selectors: strings(&[
                "#global_nav_profile_link",
                "[data-testid=\"globalNavProfileLink\"]",
                "button[data-testid=\"account-menu-button\"]",
                ".ic-app-header__menu-list-item.ic-app-header__menu-list-item--active span",
                ".user_name",
                "[aria-label*=\"Account\"]",
            ]),
            name_boilerplate: strings(&["User: ", "Account"]),
            content_selectors: strings(&[
                "#content",
                ".user_content",
                ".show-content",
                ".syllabus_content",
                ".description",
                ".requirements_message",
                ".submission_details",
                ".context_module_item",
                "article",
                ".discussion-topic",
                ".user_content_post_body",
                ".assignment-title",
                ".assignment-description",
                ".page-content",
            ]),
            title_selectors: strings(&[".ellipsible", "h1.page-title", "h1"]),
            skip_containers: strings(&[
                "edwin-panel",
                "edwin-settings-modal",
                "edwin-quizzes-tab",
                "global_nav",
                "breadcrumbs",
                "right-side",
                "course-navigation",
                "ui-scroll-to-top",
                "ui-scroll-to-bottom",
            ]),
            timeouts: Timeouts::default(),
        }
    }
}

impl ClientSettings {
    pub fn is_syncable(&self, page_type: PageType) -> bool {
        self.syncable_page_types.contains(&page_type)
    }
}
