//! crates/edwin_core/src/identity.rs
//!
//! Resolves who the learner is and which course they are looking at.
//!
//! There is no login: the learner is a random token kept in storage, and a
//! change of the display name shown by the host page is taken to mean a
//! different person is now signed in. That rule sits behind [`RotationPolicy`]
//! so a real identity provider can replace it without touching callers.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::info;
use uuid::Uuid;

use crate::domain::{CourseId, UserIdentity};
use crate::ports::{HostPage, PortResult};
use crate::settings::ClientSettings;
use crate::storage::EdwinStorage;

fn course_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/courses/(\d+)(?:/|$)").expect("valid course regex"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// The path component of a page URL; relative inputs are used as-is.
pub(crate) fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// The course id embedded as `/courses/<digits>` in the page path.
pub fn course_id(url: &str) -> Option<CourseId> {
    let path = url_path(url);
    course_pattern()
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A fresh UUID-v4-shaped token. It pseudonymizes analytics and is not a credential.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

//=========================================================================================
// Rotation Policy
//=========================================================================================

/// Decides whether an existing token still belongs to the person on the page.
pub trait RotationPolicy: Send + Sync {
    fn should_rotate(&self, stored: &UserIdentity, detected_name: &str) -> bool;
}

/// Mint a new token whenever a non-default name differs from the stored one.
///
/// A transient markup change that alters the detected name loses the
/// learner's history; that trade-off is accepted for lack of a login.
#[derive(Debug, Clone)]
pub struct NameChangeRotation {
    pub default_name: String,
}

impl RotationPolicy for NameChangeRotation {
    fn should_rotate(&self, stored: &UserIdentity, detected_name: &str) -> bool {
        detected_name != self.default_name && detected_name != stored.display_name
    }
}

//=========================================================================================
// Identity Resolver
//=========================================================================================

pub struct IdentityResolver {
    settings: Arc<ClientSettings>,
    storage: EdwinStorage,
    policy: Box<dyn RotationPolicy>,
}

impl IdentityResolver {
    pub fn new(settings: Arc<ClientSettings>, storage: EdwinStorage) -> Self {
        let policy = Box::new(NameChangeRotation {
            default_name: settings.default_display_name.clone(),
        });
        Self::with_policy(settings, storage, policy)
    }

    pub fn with_policy(
        settings: Arc<ClientSettings>,
        storage: EdwinStorage,
        policy: Box<dyn RotationPolicy>,
    ) -> Self {
        Self {
            settings,
            storage,
            policy,
        }
    }

    /// The learner's name as shown by the host page, or the default label.
    pub fn display_name(&self, page: &dyn HostPage) -> String {
        for selector in &self.settings.name_selectors {
            let Some(element) = page.select(selector).into_iter().next() else {
                continue;
            };
            let labelled = |name| element.attr(name).filter(|v| !v.trim().is_empty());
            let raw = labelled("aria-label")
                .or_else(|| labelled("title"))
                .map(str::to_string)
                .unwrap_or_else(|| element.text.trim().to_string());
            let cleaned = self.clean_name(&raw);
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
        self.settings.default_display_name.clone()
    }

    fn clean_name(&self, raw: &str) -> String {
        let mut name = raw.to_string();
        for boilerplate in &self.settings.name_boilerplate {
            name = name.replacen(boilerplate.as_str(), "", 1);
        }
        whitespace_pattern().replace_all(&name, " ").trim().to_string()
    }

    /// The stored token, minting or rotating it first when needed.
    pub fn user_token(&self, page: &dyn HostPage) -> PortResult<String> {
        let detected = self.display_name(page);
        let stored = self.storage.identity()?;

        let rotate = match &stored {
            None => true,
            Some(identity) => self.policy.should_rotate(identity, &detected),
        };

        match stored {
            Some(identity) if !rotate => Ok(identity.token),
            _ => {
                let identity = UserIdentity {
                    token: generate_token(),
                    display_name: detected,
                };
                self.storage.set_identity(&identity)?;
                info!(
                    name = %identity.display_name,
                    token = %identity.token,
                    "New user token generated"
                );
                Ok(identity.token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_support::{ElementExt, FakePage};

    fn resolver() -> (EdwinStorage, IdentityResolver) {
        let storage = EdwinStorage::new(Arc::new(MemoryStore::new()));
        let resolver = IdentityResolver::new(Arc::new(ClientSettings::default()), storage.clone());
        (storage, resolver)
    }

    fn page_for(name: &str) -> FakePage {
        FakePage::new("https://canvas.example.edu/courses/12345/modules").with_element(
            "#global_nav_profile_link",
            FakePage::element("").with_attr("aria-label", name),
        )
    }

    #[test]
    fn course_id_follows_the_courses_marker() {
        assert_eq!(course_id("https://canvas.example.edu/courses/12345/assignments"), Some(12345));
        assert_eq!(course_id("https://canvas.example.edu/courses/42"), Some(42));
        assert_eq!(course_id("/courses/7/pages/intro?module_item_id=3"), Some(7));
        assert_eq!(course_id("https://canvas.example.edu/courses/7?x=/courses/9/"), Some(7));
    }

    #[test]
    fn course_id_is_none_off_course() {
        assert_eq!(course_id("https://canvas.example.edu/"), None);
        assert_eq!(course_id("https://canvas.example.edu/courses"), None);
        assert_eq!(course_id("https://canvas.example.edu/courses/abc/modules"), None);
        assert_eq!(course_id("https://canvas.example.edu/courses/12x/modules"), None);
        assert_eq!(course_id("https://canvas.example.edu/profile?next=/courses/5/"), None);
    }

    #[test]
    fn generated_tokens_look_like_uuid_v4() {
        let token = generate_token();
        assert_eq!(token.len(), 36);
        assert_eq!(token.as_bytes()[14], b'4');
        assert!(matches!(token.as_bytes()[19], b'8' | b'9' | b'a' | b'b'));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn display_name_strips_boilerplate() {
        let (_, resolver) = resolver();
        let page = FakePage::new("https://canvas.example.edu/").with_element(
            "#global_nav_profile_link",
            FakePage::element("").with_attr("aria-label", "User:   Ada   Lovelace Account"),
        );
        assert_eq!(resolver.display_name(&page), "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_text_then_default() {
        let (_, resolver) = resolver();
        let page = FakePage::new("https://canvas.example.edu/")
            .with_element(".user_name", FakePage::element("  Grace Hopper "));
        assert_eq!(resolver.display_name(&page), "Grace Hopper");

        let empty = FakePage::new("https://canvas.example.edu/");
        assert_eq!(resolver.display_name(&empty), "Student");
    }

    #[test]
    fn blank_labels_fall_through_to_title_and_text() {
        let (_, resolver) = resolver();
        let titled = FakePage::new("https://canvas.example.edu/").with_element(
            "#global_nav_profile_link",
            FakePage::element("")
                .with_attr("aria-label", "  ")
                .with_attr("title", "Ada Lovelace"),
        );
        assert_eq!(resolver.display_name(&titled), "Ada Lovelace");

        let text_only = FakePage::new("https://canvas.example.edu/").with_element(
            "#global_nav_profile_link",
            FakePage::element("Grace Hopper").with_attr("aria-label", ""),
        );
        assert_eq!(resolver.display_name(&text_only), "Grace Hopper");
    }

    #[test]
    fn token_is_stable_without_a_name_change() {
        let (_, resolver) = resolver();
        let page = page_for("Alice");
        let first = resolver.user_token(&page).unwrap();
        assert_eq!(resolver.user_token(&page).unwrap(), first);
        assert_eq!(resolver.user_token(&page).unwrap(), first);
    }

    #[test]
    fn token_rotates_when_another_person_signs_in() {
        let (storage, resolver) = resolver();
        let alice = resolver.user_token(&page_for("Alice")).unwrap();

        let bob = resolver.user_token(&page_for("Bob")).unwrap();
        assert_ne!(alice, bob);
        assert_eq!(resolver.user_token(&page_for("Bob")).unwrap(), bob);
        assert_eq!(storage.identity().unwrap().unwrap().display_name, "Bob");
    }

    #[test]
    fn default_name_never_rotates_an_existing_token() {
        let (_, resolver) = resolver();
        let alice = resolver.user_token(&page_for("Alice")).unwrap();
        let anonymous = FakePage::new("https://canvas.example.edu/courses/1");
        assert_eq!(resolver.user_token(&anonymous).unwrap(), alice);
    }

    #[test]
    fn first_visit_without_a_name_stores_the_default() {
        let (storage, resolver) = resolver();
        let token = resolver
            .user_token(&FakePage::new("https://canvas.example.edu/"))
            .unwrap();
        let stored = storage.identity().unwrap().unwrap();
        assert_eq!(stored.token, token);
        assert_eq!(stored.display_name, "Student");
    }

    struct NeverRotate;

    impl RotationPolicy for NeverRotate {
        fn should_rotate(&self, _: &UserIdentity, _: &str) -> bool {
            false
        }
    }

    #[test]
    fn policy_can_be_swapped() {
        let storage = EdwinStorage::new(Arc::new(MemoryStore::new()));
        let resolver = IdentityResolver::with_policy(
            Arc::new(ClientSettings::default()),
            storage,
            Box::new(NeverRotate),
        );
        let alice = resolver.user_token(&page_for("Alice")).unwrap();
        assert_eq!(resolver.user_token(&page_for("Bob")).unwrap(), alice);
    }
}
