//! crates/edwin_core/src/ports.rs
//!
//! Defines the service contracts (traits) the client logic is written against.
//! The host page, the key-value store, the clock, the backend and the panel view
//! are all injected, so every component can be exercised without a browser.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChatMessage, ChatReply, ConversationStarted, CourseContext, CourseId, Exam, ExplainMode,
    Explanation, Material, MaterialId, MaterialSyncReport, Mastery, PageContent, PdfUpload,
    Progress, Quiz, QuizAttempt, QuizRequest,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// This is the single envelope through which backend failures reach the
/// controllers; adapters never let a raw transport error escape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Request timeout - backend may be offline")]
    Timeout,
    #[error("{0}")]
    Network(String),
    /// Non-2xx status or a body with `"success": false`.
    #[error("{0}")]
    Backend(String),
    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether the backend could not be reached at all.
    pub fn is_offline(&self) -> bool {
        matches!(self, PortError::Timeout | PortError::Network(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Host Page
//=========================================================================================

/// Id and classes of one element in a matched element's lineage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementMark {
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl ElementMark {
    pub fn matches(&self, token: &str) -> bool {
        self.id.as_deref() == Some(token) || self.classes.iter().any(|c| c == token)
    }
}

/// A read-only snapshot of one element matched by a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageElement {
    /// Rendered text of the element and its descendants.
    pub text: String,
    pub attributes: Vec<(String, String)>,
    /// The element itself first, then its ancestors up to the root.
    pub lineage: Vec<ElementMark>,
}

impl PageElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// True if this element or any ancestor carries `token` as id or class.
    pub fn is_within(&self, token: &str) -> bool {
        self.lineage.iter().any(|mark| mark.matches(token))
    }
}

/// The page the client is running against.
pub trait HostPage: Send + Sync {
    /// Full location, including query and fragment.
    fn url(&self) -> &str;

    /// The document `<title>`, if any.
    fn document_title(&self) -> Option<String>;

    /// All elements matching a CSS selector, in document order.
    fn select(&self, selector: &str) -> Vec<PageElement>;
}

//=========================================================================================
// Storage and Time
//=========================================================================================

/// Synchronous string key-value storage, the equivalent of `localStorage`.
///
/// Each call completes atomically. Read-modify-write cycles go through
/// [`KeyValueStore::update`], which holds the store's lock for the whole cycle.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PortResult<()>;
    fn remove(&self, key: &str) -> PortResult<()>;

    /// Replaces the value of `key` with `apply(current)` without letting any
    /// other call interleave. Returning `None` leaves the key untouched.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> PortResult<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// Backend Service
//=========================================================================================

#[async_trait]
pub trait BackendService: Send + Sync {
    async fn check_health(&self) -> PortResult<bool>;

    async fn new_conversation(&self, ctx: &CourseContext) -> PortResult<ConversationStarted>;

    async fn send_message(&self, ctx: &CourseContext, question: &str) -> PortResult<ChatReply>;

    /// Uploads extracted page text to the backend knowledge base.
    async fn sync_page_content(&self, ctx: &CourseContext, page: &PageContent) -> PortResult<()>;

    async fn generate_quiz(&self, request: &QuizRequest) -> PortResult<Quiz>;

    async fn generate_exam(
        &self,
        ctx: &CourseContext,
        num_questions: u32,
        difficulty: &str,
    ) -> PortResult<Exam>;

    async fn explain_page(
        &self,
        ctx: &CourseContext,
        page: &PageContent,
        mode: ExplainMode,
    ) -> PortResult<Explanation>;

    async fn get_progress(&self, ctx: &CourseContext) -> PortResult<Progress>;

    async fn get_mastery(&self, ctx: &CourseContext) -> PortResult<Mastery>;

    async fn get_insights(&self, course_id: CourseId) -> PortResult<serde_json::Value>;

    /// Callers treat this as fire-and-forget; see `QuizController`.
    async fn log_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()>;

    /// Returns the backend's confirmation message.
    async fn upload_pdf(&self, ctx: &CourseContext, upload: &PdfUpload) -> PortResult<String>;

    async fn get_materials(&self, course_id: CourseId) -> PortResult<Vec<Material>>;

    async fn delete_material(&self, material_id: &MaterialId) -> PortResult<()>;

    async fn delete_all_materials(&self, course_id: CourseId) -> PortResult<()>;

    async fn sync_canvas_materials(
        &self,
        course_id: CourseId,
        canvas_token: &str,
    ) -> PortResult<MaterialSyncReport>;
}

//=========================================================================================
// Panel View
//=========================================================================================

/// Every control that triggers a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    SendMessage,
    NewConversation,
    SyncPage,
    GenerateQuiz,
    GenerateExam,
    ExplainPage,
    PracticeQuestions,
    UploadPdf,
    DeleteMaterial,
    DeleteAllMaterials,
    SyncCanvasMaterials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    Ready,
    /// Disabled, showing a loading label.
    Busy(String),
}

/// Which inline status line a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArea {
    Chat,
    Sync,
    Upload,
    Explain,
    Materials,
    Quiz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// One rendered quiz question with the learner's recorded answer, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub quiz_title: String,
    pub index: usize,
    pub total: usize,
    pub question: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    /// Present once the question has been answered.
    pub feedback: Option<AnswerFeedback>,
    pub can_go_back: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSummary {
    pub quiz_title: String,
    pub answered: usize,
    pub correct: usize,
    pub total: usize,
}

/// The rendering surface driven by the controllers.
///
/// Only the methods a front-end cares about need real bodies; the rest
/// default to doing nothing.
pub trait PanelView: Send + Sync {
    fn set_control(&self, control: Control, state: ControlState);

    fn append_message(&self, message: &ChatMessage);

    fn show_status(&self, area: StatusArea, kind: StatusKind, text: &str);

    fn clear_messages(&self) {}

    fn set_backend_online(&self, _online: bool) {}

    fn notify(&self, _text: &str) {}

    fn render_sync_status(&self, _line: &str) {}

    fn render_question(&self, _question: &QuestionView) {}

    fn render_quiz_summary(&self, _summary: &QuizSummary) {}

    fn render_progress(&self, _progress: &Progress) {}

    fn render_mastery(&self, _mastery: &Mastery) {}

    fn render_explanation(&self, _explanation: &Explanation, _mode: ExplainMode) {}

    fn render_materials(&self, _materials: &[Material]) {}
}
