//! crates/edwin_core/src/domain.rs
//!
//! Defines the core data structures for the client.
//! Only the values that are persisted in the key-value store carry serde
//! derives; everything the backend returns is mapped into these types by the
//! HTTP adapter.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Numeric Canvas course identifier taken from the page path.
pub type CourseId = i64;

//=========================================================================================
// Identity and Page Values
//=========================================================================================

/// The pseudo-anonymous identity persisted between page visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub token: String,
    pub display_name: String,
}

/// The user token and course a backend call is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseContext {
    pub user_token: String,
    pub course_id: CourseId,
}

/// Classification of the current host page, derived from the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Syllabus,
    Assignments,
    Assignment,
    Modules,
    Announcements,
    Page,
    Unknown,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Syllabus => "syllabus",
            PageType::Assignments => "assignments",
            PageType::Assignment => "assignment",
            PageType::Modules => "modules",
            PageType::Announcements => "announcements",
            PageType::Page => "page",
            PageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of the readable content of the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub text: String,
    pub url: String,
    pub page_type: PageType,
}

//=========================================================================================
// Auto-Sync Bookkeeping
//=========================================================================================

/// The tri-state auto-sync opt-out flag as it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoSyncPreference {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl AutoSyncPreference {
    /// Any stored value other than `"false"` or `"true"` reads as unset.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("true") => AutoSyncPreference::Enabled,
            Some("false") => AutoSyncPreference::Disabled,
            _ => AutoSyncPreference::Unset,
        }
    }

    pub fn is_enabled(&self, enabled_by_default: bool) -> bool {
        match self {
            AutoSyncPreference::Unset => enabled_by_default,
            AutoSyncPreference::Enabled => true,
            AutoSyncPreference::Disabled => false,
        }
    }
}

/// Map of exact page URL to the epoch milliseconds of its last successful sync.
///
/// Entries are only ever added or refreshed, never pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRecord {
    entries: BTreeMap<String, i64>,
}

/// Aggregate view over a [`SyncRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub total_synced: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub oldest_sync: Option<DateTime<Utc>>,
}

impl SyncRecord {
    pub fn last_synced(&self, url: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(url)
            .and_then(|ms| Utc.timestamp_millis_opt(*ms).single())
    }

    pub fn mark_synced(&mut self, url: &str, at: DateTime<Utc>) {
        self.entries.insert(url.to_string(), at.timestamp_millis());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> SyncStats {
        let to_time = |ms: i64| Utc.timestamp_millis_opt(ms).single();
        SyncStats {
            total_synced: self.entries.len(),
            last_sync: self.entries.values().copied().max().and_then(to_time),
            oldest_sync: self.entries.values().copied().min().and_then(to_time),
        }
    }

    /// The "last synced" line shown in the settings panel.
    pub fn status_line(&self, now: DateTime<Utc>) -> String {
        let count = self.entries.len();
        let Some(most_recent) = self.stats().last_sync else {
            return "No pages synced yet".to_string();
        };

        let minutes_ago = (now - most_recent).num_minutes().max(0);
        let when = if minutes_ago < 1 {
            "just now".to_string()
        } else if minutes_ago < 60 {
            format!("{} min{} ago", minutes_ago, plural(minutes_ago))
        } else {
            let hours_ago = minutes_ago / 60;
            format!("{} hour{} ago", hours_ago, plural(hours_ago))
        };

        format!(
            "Synced {} page{} • Last sync: {}",
            count,
            plural(count as i64),
            when
        )
    }
}

fn plural(n: i64) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Edwin,
}

/// A course-material source the backend cited for an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub title: String,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

/// A single entry of the chat transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub citations: Vec<Citation>,
    /// `None` for user messages and canned replies.
    pub grounded: Option<bool>,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn from_user(text: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            citations: Vec::new(),
            grounded: None,
            sent_at,
        }
    }

    pub fn from_edwin(text: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            sender: Sender::Edwin,
            text: text.into(),
            citations: Vec::new(),
            grounded: None,
            sent_at,
        }
    }
}

/// The backend's answer to a chat question.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub grounded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationStarted {
    pub conversation_id: Option<String>,
    pub message: Option<String>,
}

//=========================================================================================
// Quizzes
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    pub exam_id: Option<String>,
    pub questions: Vec<QuizQuestion>,
}

/// Parameters of a `generateQuiz` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub course_id: CourseId,
    pub topic: String,
    pub difficulty: String,
    pub num_questions: u32,
    pub material_id: Option<MaterialId>,
}

/// One answered question, reported to the backend for analytics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    pub user_token: String,
    pub course_id: CourseId,
    pub question: String,
    pub quiz_title: String,
    pub selected_option: usize,
    pub correct_option: usize,
    pub is_correct: bool,
}

/// A quiz catalogue entry, persisted under `edwin_quiz_topics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDescriptor {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_id: Option<MaterialId>,
    pub topic: String,
    pub difficulty: String,
    pub num_questions: u32,
}

//=========================================================================================
// Materials
//=========================================================================================

/// Backend material identifier; the backend has used both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialId {
    Number(i64),
    Text(String),
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialId::Number(n) => write!(f, "{}", n),
            MaterialId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub id: MaterialId,
    pub title: String,
    pub uploaded_at: String,
}

/// A PDF chosen for upload.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub file_name: String,
    pub data: bytes::Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialSyncReport {
    pub ingested: u32,
    pub skipped: u32,
}

//=========================================================================================
// Progress, Mastery and Explanations
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Progress {
    pub streak: u32,
    pub quizzes_completed: u32,
    pub accuracy: f64,
}

impl Progress {
    pub const SEGMENTS: u32 = 5;
    const QUIZZES_PER_COURSE: u32 = 10;

    /// Number of filled segments in the five-segment progress bar.
    pub fn stage(&self) -> u32 {
        (self.quizzes_completed.saturating_mul(Self::SEGMENTS) / Self::QUIZZES_PER_COURSE).min(Self::SEGMENTS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyClass {
    High,
    Medium,
    Low,
}

impl AccuracyClass {
    pub fn of(accuracy: f64) -> Self {
        if accuracy >= 0.8 {
            AccuracyClass::High
        } else if accuracy >= 0.6 {
            AccuracyClass::Medium
        } else {
            AccuracyClass::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicMastery {
    pub topic: String,
    pub accuracy: f64,
    pub attempts: u32,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mastery {
    pub streak_days: u32,
    pub total_attempts: u32,
    pub last_active: Option<String>,
    pub topics: Vec<TopicMastery>,
    pub weakest_topics: Vec<TopicMastery>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainMode {
    Explain,
    Practice,
}

impl ExplainMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainMode::Explain => "explain",
            ExplainMode::Practice => "practice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Explanation {
    pub summary: String,
    pub key_points: Vec<String>,
    pub common_mistakes: Vec<String>,
}
