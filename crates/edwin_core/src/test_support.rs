//! crates/edwin_core/src/test_support.rs
//!
//! In-memory stand-ins for every port, shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use crate::domain::*;
use crate::ports::*;
use crate::settings::ClientSettings;
use crate::state::ClientState;
use crate::storage::MemoryStore;

//=========================================================================================
// Host Page
//=========================================================================================

pub struct FakePage {
    url: String,
    title: Option<String>,
    elements: Vec<(String, PageElement)>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            elements: Vec::new(),
        }
    }

    pub fn element(text: &str) -> PageElement {
        PageElement {
            text: text.to_string(),
            attributes: Vec::new(),
            lineage: vec![ElementMark::default()],
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_element(mut self, selector: &str, element: PageElement) -> Self {
        self.elements.push((selector.to_string(), element));
        self
    }

    /// A course page with one article of `chars` characters.
    pub fn course_page(url: &str, chars: usize) -> Self {
        let body: String = "Lecture notes on transport protocols. "
            .chars()
            .cycle()
            .take(chars)
            .collect();
        Self::new(url)
            .with_title("Week 4")
            .with_element("article", Self::element(&body))
    }
}

impl HostPage for FakePage {
    fn url(&self) -> &str {
        &self.url
    }

    fn document_title(&self) -> Option<String> {
        self.title.clone()
    }

    fn select(&self, selector: &str) -> Vec<PageElement> {
        self.elements
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

pub trait ElementExt {
    fn with_attr(self, name: &str, value: &str) -> Self;
    fn inside_id(self, id: &str) -> Self;
    fn inside_class(self, class: &str) -> Self;
}

impl ElementExt for PageElement {
    fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    fn inside_id(mut self, id: &str) -> Self {
        self.lineage.push(ElementMark {
            id: Some(id.to_string()),
            classes: Vec::new(),
        });
        self
    }

    fn inside_class(mut self, class: &str) -> Self {
        self.lineage.push(ElementMark {
            id: None,
            classes: vec![class.to_string()],
        });
        self
    }
}

//=========================================================================================
// Clock
//=========================================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap()
}

//=========================================================================================
// Backend
//=========================================================================================

pub fn sample_quiz() -> Quiz {
    let question = |n: usize| QuizQuestion {
        question: format!("Question {}?", n),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct: 1,
        explanation: format!("Because of reason {}.", n),
    };
    Quiz {
        title: "Transport Layer".into(),
        questions: vec![question(1), question(2), question(3)],
    }
}

pub struct FakeBackend {
    pub health: Mutex<PortResult<bool>>,
    pub conversation: Mutex<PortResult<ConversationStarted>>,
    pub chat: Mutex<PortResult<ChatReply>>,
    pub sync: Mutex<PortResult<()>>,
    pub quiz: Mutex<PortResult<Quiz>>,
    pub exam: Mutex<PortResult<Exam>>,
    pub explain: Mutex<PortResult<Explanation>>,
    pub progress: Mutex<PortResult<Progress>>,
    pub mastery: Mutex<PortResult<Mastery>>,
    pub attempt: Mutex<PortResult<()>>,
    pub upload: Mutex<PortResult<String>>,
    pub materials: Mutex<PortResult<Vec<Material>>>,
    pub delete: Mutex<PortResult<()>>,
    pub canvas_sync: Mutex<PortResult<MaterialSyncReport>>,

    pub calls: Mutex<Vec<&'static str>>,
    pub synced_pages: Mutex<Vec<PageContent>>,
    pub attempts: Mutex<Vec<QuizAttempt>>,
    pub quiz_requests: Mutex<Vec<QuizRequest>>,
    pub questions: Mutex<Vec<String>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            health: Mutex::new(Ok(true)),
            conversation: Mutex::new(Ok(ConversationStarted::default())),
            chat: Mutex::new(Ok(ChatReply {
                answer: "Quizzes are worth 9%.".into(),
                citations: vec![Citation {
                    title: "Syllabus".into(),
                    url: None,
                    snippet: None,
                }],
                grounded: true,
            })),
            sync: Mutex::new(Ok(())),
            quiz: Mutex::new(Ok(sample_quiz())),
            exam: Mutex::new(Ok(Exam {
                exam_id: Some("exam-1".into()),
                questions: sample_quiz().questions,
            })),
            explain: Mutex::new(Ok(Explanation {
                summary: "A summary.".into(),
                key_points: vec!["Point".into()],
                common_mistakes: Vec::new(),
            })),
            progress: Mutex::new(Ok(Progress {
                streak: 2,
                quizzes_completed: 4,
                accuracy: 0.75,
            })),
            mastery: Mutex::new(Ok(Mastery::default())),
            attempt: Mutex::new(Ok(())),
            upload: Mutex::new(Ok("Uploaded notes.pdf".into())),
            materials: Mutex::new(Ok(Vec::new())),
            delete: Mutex::new(Ok(())),
            canvas_sync: Mutex::new(Ok(MaterialSyncReport {
                ingested: 3,
                skipped: 1,
            })),
            calls: Mutex::new(Vec::new()),
            synced_pages: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            quiz_requests: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn respond<T: Clone>(slot: &Mutex<PortResult<T>>, value: PortResult<T>) {
        *slot.lock().unwrap() = value;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn answer<T: Clone>(&self, call: &'static str, slot: &Mutex<PortResult<T>>) -> PortResult<T> {
        self.calls.lock().unwrap().push(call);
        slot.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendService for FakeBackend {
    async fn check_health(&self) -> PortResult<bool> {
        self.answer("check_health", &self.health)
    }

    async fn new_conversation(&self, _ctx: &CourseContext) -> PortResult<ConversationStarted> {
        self.answer("new_conversation", &self.conversation)
    }

    async fn send_message(&self, _ctx: &CourseContext, question: &str) -> PortResult<ChatReply> {
        self.questions.lock().unwrap().push(question.to_string());
        self.answer("send_message", &self.chat)
    }

    async fn sync_page_content(&self, _ctx: &CourseContext, page: &PageContent) -> PortResult<()> {
        self.synced_pages.lock().unwrap().push(page.clone());
        self.answer("sync_page_content", &self.sync)
    }

    async fn generate_quiz(&self, request: &QuizRequest) -> PortResult<Quiz> {
        self.quiz_requests.lock().unwrap().push(request.clone());
        self.answer("generate_quiz", &self.quiz)
    }

    async fn generate_exam(&self, _ctx: &CourseContext, _n: u32, _difficulty: &str) -> PortResult<Exam> {
        self.answer("generate_exam", &self.exam)
    }

    async fn explain_page(
        &self,
        _ctx: &CourseContext,
        _page: &PageContent,
        _mode: ExplainMode,
    ) -> PortResult<Explanation> {
        self.answer("explain_page", &self.explain)
    }

    async fn get_progress(&self, _ctx: &CourseContext) -> PortResult<Progress> {
        self.answer("get_progress", &self.progress)
    }

    async fn get_mastery(&self, _ctx: &CourseContext) -> PortResult<Mastery> {
        self.answer("get_mastery", &self.mastery)
    }

    async fn get_insights(&self, _course_id: CourseId) -> PortResult<serde_json::Value> {
        self.calls.lock().unwrap().push("get_insights");
        Ok(serde_json::json!({}))
    }

    async fn log_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        self.attempts.lock().unwrap().push(attempt.clone());
        self.answer("log_quiz_attempt", &self.attempt)
    }

    async fn upload_pdf(&self, _ctx: &CourseContext, _upload: &PdfUpload) -> PortResult<String> {
        self.answer("upload_pdf", &self.upload)
    }

    async fn get_materials(&self, _course_id: CourseId) -> PortResult<Vec<Material>> {
        self.answer("get_materials", &self.materials)
    }

    async fn delete_material(&self, _material_id: &MaterialId) -> PortResult<()> {
        self.answer("delete_material", &self.delete)
    }

    async fn delete_all_materials(&self, _course_id: CourseId) -> PortResult<()> {
        self.answer("delete_all_materials", &self.delete)
    }

    async fn sync_canvas_materials(
        &self,
        _course_id: CourseId,
        _canvas_token: &str,
    ) -> PortResult<MaterialSyncReport> {
        self.answer("sync_canvas_materials", &self.canvas_sync)
    }
}

//=========================================================================================
// Panel View
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Control(Control, ControlState),
    Message(ChatMessage),
    Status(StatusArea, StatusKind, String),
    ClearMessages,
    BackendOnline(bool),
    Notify(String),
    SyncStatus(String),
    Question(QuestionView),
    Summary(QuizSummary),
    Progress(Progress),
    Mastery(Mastery),
    Explanation(Explanation, ExplainMode),
    Materials(Vec<Material>),
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self, area: StatusArea) -> Vec<(StatusKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Status(a, kind, text) if a == area => Some((kind, text)),
                _ => None,
            })
            .collect()
    }

    pub fn control_states(&self, control: Control) -> Vec<ControlState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Control(c, state) if c == control => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn control_state(&self, control: Control) -> Option<ControlState> {
        self.control_states(control).pop()
    }

    pub fn last_question(&self) -> Option<QuestionView> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::Question(q) => Some(q),
            _ => None,
        })
    }
}

impl PanelView for RecordingView {
    fn set_control(&self, control: Control, state: ControlState) {
        self.push(ViewEvent::Control(control, state));
    }

    fn append_message(&self, message: &ChatMessage) {
        self.push(ViewEvent::Message(message.clone()));
    }

    fn show_status(&self, area: StatusArea, kind: StatusKind, text: &str) {
        self.push(ViewEvent::Status(area, kind, text.to_string()));
    }

    fn clear_messages(&self) {
        self.push(ViewEvent::ClearMessages);
    }

    fn set_backend_online(&self, online: bool) {
        self.push(ViewEvent::BackendOnline(online));
    }

    fn notify(&self, text: &str) {
        self.push(ViewEvent::Notify(text.to_string()));
    }

    fn render_sync_status(&self, line: &str) {
        self.push(ViewEvent::SyncStatus(line.to_string()));
    }

    fn render_question(&self, question: &QuestionView) {
        self.push(ViewEvent::Question(question.clone()));
    }

    fn render_quiz_summary(&self, summary: &QuizSummary) {
        self.push(ViewEvent::Summary(summary.clone()));
    }

    fn render_progress(&self, progress: &Progress) {
        self.push(ViewEvent::Progress(progress.clone()));
    }

    fn render_mastery(&self, mastery: &Mastery) {
        self.push(ViewEvent::Mastery(mastery.clone()));
    }

    fn render_explanation(&self, explanation: &Explanation, mode: ExplainMode) {
        self.push(ViewEvent::Explanation(explanation.clone(), mode));
    }

    fn render_materials(&self, materials: &[Material]) {
        self.push(ViewEvent::Materials(materials.to_vec()));
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct Harness {
    pub state: Arc<ClientState>,
    pub backend: Arc<FakeBackend>,
    pub view: Arc<RecordingView>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ClientSettings::default())
    }

    pub fn with_settings(settings: ClientSettings) -> Self {
        let backend = Arc::new(FakeBackend::default());
        let clock = Arc::new(FixedClock::at(epoch()));
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(ClientState::new(
            Arc::new(settings),
            store.clone(),
            backend.clone(),
            clock.clone(),
        ));
        Self {
            state,
            backend,
            view: Arc::new(RecordingView::default()),
            clock,
            store,
        }
    }
}
