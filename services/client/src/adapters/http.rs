//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, which is the concrete implementation
//! of the `BackendService` port from the `core` crate. Every call goes through
//! one request envelope that applies the per-endpoint timeout and turns
//! transport and backend failures into `PortError`s.

use async_trait::async_trait;
use edwin_core::domain::{
    ChatReply, Citation, ConversationStarted, CourseContext, CourseId, Exam, ExplainMode,
    Explanation, Material, MaterialId, MaterialSyncReport, Mastery, PageContent, PdfUpload,
    Progress, Quiz, QuizAttempt, QuizQuestion, QuizRequest, TopicMastery,
};
use edwin_core::ports::{BackendService, PortError, PortResult};
use edwin_core::settings::Timeouts;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A backend adapter that implements the `BackendService` port over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    timeouts: Timeouts,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` talking to `base_url`.
    ///
    /// Endpoints resolve below the base path, so `https://host/edwin` serves
    /// `https://host/edwin/api/...`.
    pub fn new(mut base_url: Url, timeouts: Timeouts) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeouts,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// `path` is relative to the base, e.g. `api/health`.
    fn call(&self, method: Method, path: &str) -> PortResult<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| PortError::Unexpected(format!("bad endpoint {}: {}", path, e)))?;
        Ok(self.http.request(method, url))
    }

    /// Sends `request`, giving up after `limit`.
    ///
    /// Non-2xx responses carry the server's `message`, or `HTTP <status>` when
    /// there is none. A 2xx body with `"success": false` is a backend failure too.
    async fn request<T: DeserializeOwned>(&self, request: RequestBuilder, limit: Duration) -> PortResult<T> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| PortError::Network(e.to_string()))?;
            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| PortError::Network(e.to_string()))?;
            let body: Option<Value> = serde_json::from_slice(&bytes).ok();
            let message = body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string);

            if !status.is_success() {
                return Err(PortError::Backend(
                    message.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
                ));
            }

            let body = body.ok_or_else(|| PortError::InvalidResponse("body is not JSON".to_string()))?;
            if body.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(PortError::Backend(
                    message.unwrap_or_else(|| "Unknown error".to_string()),
                ));
            }

            serde_json::from_value(body).map_err(|e| PortError::InvalidResponse(e.to_string()))
        };

        tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| PortError::Timeout)?
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct HealthRecord {
    #[serde(default)]
    success: bool,
}

#[derive(Deserialize)]
struct ConversationRecord {
    #[serde(default, rename = "conversationID")]
    conversation_id: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}
impl ConversationRecord {
    fn to_domain(self) -> ConversationStarted {
        ConversationStarted {
            conversation_id: self.conversation_id.and_then(id_string),
            message: self.message,
        }
    }
}

#[derive(Deserialize)]
struct CitationRecord {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}
impl CitationRecord {
    fn to_domain(self) -> Citation {
        Citation {
            title: self.title,
            url: self.url,
            snippet: self.snippet,
        }
    }
}

#[derive(Deserialize)]
struct ChatRecord {
    answer: String,
    #[serde(default)]
    citations: Vec<CitationRecord>,
    #[serde(default)]
    grounded: bool,
}
impl ChatRecord {
    fn to_domain(self) -> ChatReply {
        let grounded = self.grounded || !self.citations.is_empty();
        ChatReply {
            answer: self.answer,
            citations: self.citations.into_iter().map(CitationRecord::to_domain).collect(),
            grounded,
        }
    }
}

#[derive(Deserialize)]
struct QuestionRecord {
    question: String,
    options: Vec<String>,
    correct: usize,
    #[serde(default)]
    explanation: String,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<QuizQuestion> {
        if self.correct >= self.options.len() {
            return Err(PortError::InvalidResponse(format!(
                "answer index {} is out of range for {} options in \"{}\"",
                self.correct,
                self.options.len(),
                self.question
            )));
        }
        Ok(QuizQuestion {
            question: self.question,
            options: self.options,
            correct: self.correct,
            explanation: self.explanation,
        })
    }
}

#[derive(Deserialize)]
struct QuizRecord {
    #[serde(default)]
    title: String,
    questions: Vec<QuestionRecord>,
}

#[derive(Deserialize)]
struct QuizEnvelope {
    quiz: QuizRecord,
}
impl QuizEnvelope {
    fn to_domain(self) -> PortResult<Quiz> {
        Ok(Quiz {
            title: self.quiz.title,
            questions: self
                .quiz
                .questions
                .into_iter()
                .map(QuestionRecord::to_domain)
                .collect::<PortResult<Vec<_>>>()?,
        })
    }
}

#[derive(Deserialize)]
struct ExamRecord {
    #[serde(default, rename = "examID")]
    exam_id: Option<Value>,
    questions: Vec<QuestionRecord>,
}
impl ExamRecord {
    fn to_domain(self) -> PortResult<Exam> {
        Ok(Exam {
            exam_id: self.exam_id.and_then(id_string),
            questions: self
                .questions
                .into_iter()
                .map(QuestionRecord::to_domain)
                .collect::<PortResult<Vec<_>>>()?,
        })
    }
}

/// Explanation lists have been sent both as arrays and as single strings.
#[derive(Deserialize, Default)]
#[serde(untagged)]
enum TextList {
    #[default]
    Missing,
    One(String),
    Many(Vec<String>),
}
impl TextList {
    fn into_vec(self) -> Vec<String> {
        match self {
            TextList::Missing => Vec::new(),
            TextList::One(text) => vec![text],
            TextList::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplanationRecord {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_points: TextList,
    #[serde(default)]
    common_mistakes: TextList,
}
impl ExplanationRecord {
    fn to_domain(self) -> Explanation {
        Explanation {
            summary: self.summary,
            key_points: self.key_points.into_vec(),
            common_mistakes: self.common_mistakes.into_vec(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRecord {
    #[serde(default)]
    streak: u32,
    #[serde(default)]
    quizzes_completed: u32,
    #[serde(default)]
    accuracy: f64,
}

#[derive(Deserialize)]
struct ProgressEnvelope {
    progress: ProgressRecord,
}
impl ProgressEnvelope {
    fn to_domain(self) -> Progress {
        Progress {
            streak: self.progress.streak,
            quizzes_completed: self.progress.quizzes_completed,
            accuracy: self.progress.accuracy,
        }
    }
}

#[derive(Deserialize)]
struct TopicRecord {
    topic: String,
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    attempts: u32,
    #[serde(default)]
    correct: u32,
    #[serde(default)]
    total: u32,
}
impl TopicRecord {
    fn to_domain(self) -> TopicMastery {
        TopicMastery {
            topic: self.topic,
            accuracy: self.accuracy,
            attempts: self.attempts,
            correct: self.correct,
            total: self.total,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasteryRecord {
    #[serde(default)]
    streak_days: u32,
    #[serde(default)]
    total_attempts: u32,
    #[serde(default)]
    last_active: Option<String>,
    #[serde(default)]
    topics: Vec<TopicRecord>,
    #[serde(default)]
    weakest_topics: Vec<TopicRecord>,
}
impl MasteryRecord {
    fn to_domain(self) -> Mastery {
        Mastery {
            streak_days: self.streak_days,
            total_attempts: self.total_attempts,
            last_active: self.last_active,
            topics: self.topics.into_iter().map(TopicRecord::to_domain).collect(),
            weakest_topics: self.weakest_topics.into_iter().map(TopicRecord::to_domain).collect(),
        }
    }
}

#[derive(Deserialize)]
struct MaterialRecord {
    id: MaterialId,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "uploadedAt")]
    uploaded_at: String,
}
impl MaterialRecord {
    fn to_domain(self) -> Material {
        Material {
            id: self.id,
            title: self.title,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Deserialize)]
struct MaterialsEnvelope {
    #[serde(default)]
    materials: Vec<MaterialRecord>,
}

#[derive(Deserialize)]
struct MessageRecord {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Default)]
struct StatsRecord {
    #[serde(default)]
    ingested: u32,
    #[serde(default)]
    skipped: u32,
}

#[derive(Deserialize)]
struct CanvasSyncRecord {
    #[serde(default)]
    stats: StatsRecord,
}

fn id_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl BackendService for HttpBackend {
    async fn check_health(&self) -> PortResult<bool> {
        let record: HealthRecord = self
            .request(self.call(Method::GET, "api/health")?, self.timeouts.health)
            .await?;
        Ok(record.success)
    }

    async fn new_conversation(&self, ctx: &CourseContext) -> PortResult<ConversationStarted> {
        let request = self.call(Method::POST, "api/newConversation")?.json(&json!({
            "userID": ctx.user_token,
            "courseID": ctx.course_id,
        }));
        let record: ConversationRecord = self.request(request, self.timeouts.default).await?;
        Ok(record.to_domain())
    }

    async fn send_message(&self, ctx: &CourseContext, question: &str) -> PortResult<ChatReply> {
        let request = self.call(Method::POST, "api/sendMessage")?.json(&json!({
            "userID": ctx.user_token,
            "courseID": ctx.course_id,
            "question": question,
        }));
        let record: ChatRecord = self.request(request, self.timeouts.chat).await?;
        Ok(record.to_domain())
    }

    async fn sync_page_content(&self, ctx: &CourseContext, page: &PageContent) -> PortResult<()> {
        let request = self.call(Method::POST, "api/syncPageContent")?.json(&json!({
            "userID": ctx.user_token,
            "courseID": ctx.course_id,
            "pageTitle": page.title,
            "pageURL": page.url,
            "pageType": page.page_type.as_str(),
            "content": page.text,
        }));
        let record: MessageRecord = self.request(request, self.timeouts.page_sync).await?;
        debug!(message = ?record.message, "Page content accepted");
        Ok(())
    }

    async fn generate_quiz(&self, quiz: &QuizRequest) -> PortResult<Quiz> {
        let request = self.call(Method::POST, "api/generateQuiz")?.json(&json!({
            "courseID": quiz.course_id,
            "topic": quiz.topic,
            "difficulty": quiz.difficulty,
            "numQuestions": quiz.num_questions,
            "materialId": quiz.material_id,
        }));
        let record: QuizEnvelope = self.request(request, self.timeouts.quiz_generation).await?;
        record.to_domain()
    }

    async fn generate_exam(&self, ctx: &CourseContext, num_questions: u32, difficulty: &str) -> PortResult<Exam> {
        let request = self.call(Method::POST, "api/generateExam")?.json(&json!({
            "userID": ctx.user_token,
            "courseID": ctx.course_id,
            "topic": "all",
            "numQuestions": num_questions,
            "difficulty": difficulty,
        }));
        let record: ExamRecord = self.request(request, self.timeouts.exam_generation).await?;
        record.to_domain()
    }

    async fn explain_page(
        &self,
        ctx: &CourseContext,
        page: &PageContent,
        mode: ExplainMode,
    ) -> PortResult<Explanation> {
        let request = self.call(Method::POST, "api/explainPage")?.json(&json!({
            "userID": ctx.user_token,
            "courseID": ctx.course_id,
            "pageTitle": page.title,
            "content": page.text,
            "mode": mode.as_str(),
        }));
        let mut body: Value = self.request(request, self.timeouts.quiz_generation).await?;
        // The explanation is usually nested under `data`, but older backends inline it.
        let nested = body.get("data").is_some_and(Value::is_object);
        let payload = if nested { body["data"].take() } else { body };
        let record: ExplanationRecord =
            serde_json::from_value(payload).map_err(|e| PortError::InvalidResponse(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_progress(&self, ctx: &CourseContext) -> PortResult<Progress> {
        let request = self.call(Method::GET, "api/progress")?.query(&[
            ("userID", ctx.user_token.clone()),
            ("courseID", ctx.course_id.to_string()),
        ]);
        let record: ProgressEnvelope = self.request(request, self.timeouts.default).await?;
        Ok(record.to_domain())
    }

    async fn get_mastery(&self, ctx: &CourseContext) -> PortResult<Mastery> {
        let request = self.call(Method::GET, "api/mastery")?.query(&[
            ("userID", ctx.user_token.clone()),
            ("courseID", ctx.course_id.to_string()),
        ]);
        let record: MasteryRecord = self.request(request, self.timeouts.default).await?;
        Ok(record.to_domain())
    }

    async fn get_insights(&self, course_id: CourseId) -> PortResult<Value> {
        let request = self
            .call(Method::GET, "api/insights")?
            .query(&[("courseID", course_id.to_string())]);
        self.request(request, self.timeouts.default).await
    }

    async fn log_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        let request = self.call(Method::POST, "api/quizAttempt")?.json(&json!({
            "userID": attempt.user_token,
            "courseID": attempt.course_id,
            "question": attempt.question,
            "quizTitle": attempt.quiz_title,
            "selectedOption": attempt.selected_option,
            "correctOption": attempt.correct_option,
            "isCorrect": attempt.is_correct,
        }));
        let _: Value = self.request(request, self.timeouts.default).await?;
        Ok(())
    }

    async fn upload_pdf(&self, ctx: &CourseContext, upload: &PdfUpload) -> PortResult<String> {
        let file = Part::bytes(upload.data.to_vec())
            .file_name(upload.file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("courseID", ctx.course_id.to_string())
            .text("userID", ctx.user_token.clone());

        let request = self.call(Method::POST, "api/uploadPDF")?.multipart(form);
        let record: MessageRecord = self.request(request, self.timeouts.upload).await?;
        Ok(record
            .message
            .unwrap_or_else(|| format!("Uploaded {}", upload.file_name)))
    }

    async fn get_materials(&self, course_id: CourseId) -> PortResult<Vec<Material>> {
        let request = self
            .call(Method::GET, "api/getMaterials")?
            .query(&[("courseID", course_id.to_string())]);
        let record: MaterialsEnvelope = self.request(request, self.timeouts.default).await?;
        Ok(record
            .materials
            .into_iter()
            .map(MaterialRecord::to_domain)
            .collect())
    }

    async fn delete_material(&self, material_id: &MaterialId) -> PortResult<()> {
        let request = self
            .call(Method::DELETE, "api/deleteMaterial")?
            .json(&json!({ "materialId": material_id }));
        let _: Value = self.request(request, self.timeouts.default).await?;
        Ok(())
    }

    async fn delete_all_materials(&self, course_id: CourseId) -> PortResult<()> {
        let request = self
            .call(Method::DELETE, "api/deleteAllMaterials")?
            .json(&json!({ "courseID": course_id }));
        let _: Value = self.request(request, self.timeouts.default).await?;
        Ok(())
    }

    async fn sync_canvas_materials(
        &self,
        course_id: CourseId,
        canvas_token: &str,
    ) -> PortResult<MaterialSyncReport> {
        let request = self.call(Method::POST, "api/syncCanvasMaterials")?.json(&json!({
            "courseID": course_id,
            "canvasToken": canvas_token,
        }));
        let record: CanvasSyncRecord = self.request(request, self.timeouts.exam_generation).await?;
        Ok(MaterialSyncReport {
            ingested: record.stats.ingested,
            skipped: record.stats.skipped,
        })
    }
}
