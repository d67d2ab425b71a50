//! crates/edwin_core/src/controller/quiz.rs
//!
//! Quiz play, exam mode and the per-material quiz catalogue.

use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{error, info, warn};

use super::control::BusyGuard;
use crate::domain::{CourseContext, Material, MaterialId, Quiz, QuizAttempt, QuizDescriptor, QuizQuestion, QuizRequest};
use crate::ports::{
    AnswerFeedback, Control, HostPage, PanelView, PortError, PortResult, QuestionView, QuizSummary,
    StatusArea, StatusKind,
};
use crate::state::ClientState;

const CATALOGUE_DIFFICULTY: &str = "Mixed";
const CATALOGUE_QUESTIONS: u32 = 15;
const FALLBACK_TOPIC: &str = "Quiz";

fn generic_title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"PDF Page \d+ Image \d+").expect("valid title regex"))
}

fn generic_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:PDF Full Text|PDF Page \d+ Image \d+)").expect("valid prefix regex")
    })
}

fn pdf_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\.pdf$").expect("valid suffix regex"))
}

/// Turns a material title into a quiz topic.
///
/// Backend-generated placeholder titles lose their generic prefix; anything
/// left empty becomes `"Quiz"`. A trailing `.pdf` is always dropped.
pub fn clean_topic(material_title: &str) -> String {
    let mut topic = material_title.to_string();

    if material_title.contains("PDF Full Text") || generic_title_pattern().is_match(material_title) {
        topic = generic_prefix_pattern()
            .replace(material_title, "")
            .trim()
            .to_string();
        if topic.is_empty() {
            topic = FALLBACK_TOPIC.to_string();
        }
    }

    pdf_suffix_pattern().replace(&topic, "").into_owned()
}

//=========================================================================================
// Session
//=========================================================================================

/// One quiz being played: the questions, the cursor and the recorded answers.
///
/// Answers are kept per question, so moving backwards and forwards never
/// loses them. A question can be answered once.
#[derive(Debug, Clone)]
pub struct QuizSession {
    title: String,
    questions: Vec<QuizQuestion>,
    answers: Vec<Option<usize>>,
    index: usize,
    /// Catalogue entry this session was started from; exams have none.
    quiz_id: Option<i64>,
    ctx: CourseContext,
}

impl QuizSession {
    pub fn new(title: String, questions: Vec<QuizQuestion>, quiz_id: Option<i64>, ctx: CourseContext) -> Self {
        Self {
            title,
            answers: vec![None; questions.len()],
            questions,
            index: 0,
            quiz_id,
            ctx,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// True once the cursor has moved past the last question.
    pub fn is_finished(&self) -> bool {
        self.index >= self.questions.len()
    }

    pub fn is_complete(&self) -> bool {
        self.answers.iter().all(Option::is_some)
    }

    pub fn answered(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn correct(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| **a == Some(q.correct))
            .count()
    }

    /// Records `selected` for the current question.
    pub fn answer(&mut self, selected: usize) -> PortResult<AnswerFeedback> {
        let question = self
            .questions
            .get(self.index)
            .ok_or_else(|| PortError::Validation("No question to answer".into()))?;
        if selected >= question.options.len() {
            return Err(PortError::Validation(format!("No option {}", selected + 1)));
        }
        if self.answers[self.index].is_some() {
            return Err(PortError::Validation("Question already answered".into()));
        }

        self.answers[self.index] = Some(selected);
        Ok(AnswerFeedback {
            correct: selected == question.correct,
            explanation: question.explanation.clone(),
        })
    }

    /// Advances the cursor; moving past the last question finishes the quiz.
    pub fn next(&mut self) {
        if self.index < self.questions.len() {
            self.index += 1;
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index = self.index.min(self.questions.len()) - 1;
        true
    }

    /// Jumps back to the first question, answers intact.
    pub fn review(&mut self) {
        self.index = 0;
    }

    pub fn view(&self) -> Option<QuestionView> {
        let question = self.questions.get(self.index)?;
        let selected = self.answers[self.index];
        Some(QuestionView {
            quiz_title: self.title.clone(),
            index: self.index,
            total: self.questions.len(),
            question: question.question.clone(),
            options: question.options.clone(),
            selected,
            feedback: selected.map(|s| AnswerFeedback {
                correct: s == question.correct,
                explanation: question.explanation.clone(),
            }),
            can_go_back: self.index > 0,
        })
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            quiz_title: self.title.clone(),
            answered: self.answered(),
            correct: self.correct(),
            total: self.questions.len(),
        }
    }
}

//=========================================================================================
// Controller
//=========================================================================================

/// A catalogue descriptor together with its completion flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub descriptor: QuizDescriptor,
    pub completed: bool,
}

pub struct QuizController {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
    session: Mutex<Option<QuizSession>>,
}

impl QuizController {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self {
            state,
            view,
            session: Mutex::new(None),
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Option<QuizSession>) -> R) -> R {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn session(&self) -> Option<QuizSession> {
        self.with_session(|s| s.clone())
    }

    fn course(&self, page: &dyn HostPage) -> PortResult<Option<CourseContext>> {
        let ctx = self.state.course_context(page)?;
        if ctx.is_none() {
            self.view.show_status(
                StatusArea::Quiz,
                StatusKind::Error,
                "Please navigate to a Canvas course page",
            );
        }
        Ok(ctx)
    }

    /// Generates a quiz for a catalogue entry and starts playing it.
    pub async fn start_quiz(&self, page: &dyn HostPage, descriptor: &QuizDescriptor) -> PortResult<bool> {
        let Some(ctx) = self.course(page)? else {
            return Ok(false);
        };

        let request = QuizRequest {
            course_id: ctx.course_id,
            topic: descriptor.topic.clone(),
            difficulty: descriptor.difficulty.clone(),
            num_questions: descriptor.num_questions,
            material_id: descriptor.material_id.clone(),
        };

        let quiz = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::GenerateQuiz, "Generating Quiz...");
            self.state.backend.generate_quiz(&request).await
        };

        match quiz {
            Ok(Quiz { title, questions }) => Ok(self.begin(title, questions, Some(descriptor.id), ctx)),
            Err(e) => {
                error!(error = %e, topic = %descriptor.topic, "Failed to generate quiz");
                self.view.show_status(
                    StatusArea::Quiz,
                    StatusKind::Error,
                    &format!("Failed to generate quiz: {}", e),
                );
                Ok(false)
            }
        }
    }

    /// Generates a course-wide exam and starts playing it.
    pub async fn start_exam(&self, page: &dyn HostPage, num_questions: u32, difficulty: &str) -> PortResult<bool> {
        let Some(ctx) = self.course(page)? else {
            return Ok(false);
        };

        let exam = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::GenerateExam, "Generating Exam...");
            self.state.backend.generate_exam(&ctx, num_questions, difficulty).await
        };

        match exam {
            Ok(exam) => {
                info!(exam_id = ?exam.exam_id, "Exam generated");
                let title = format!("Exam Mode ({} questions)", exam.questions.len());
                Ok(self.begin(title, exam.questions, None, ctx))
            }
            Err(e) => {
                error!(error = %e, "Failed to generate exam");
                self.view.show_status(
                    StatusArea::Quiz,
                    StatusKind::Error,
                    &format!("Failed to generate exam: {}", e),
                );
                Ok(false)
            }
        }
    }

    fn begin(&self, title: String, questions: Vec<QuizQuestion>, quiz_id: Option<i64>, ctx: CourseContext) -> bool {
        if questions.is_empty() {
            self.view
                .show_status(StatusArea::Quiz, StatusKind::Error, "No questions were generated");
            return false;
        }
        info!(title = %title, questions = questions.len(), "Starting quiz");
        let session = QuizSession::new(title, questions, quiz_id, ctx);
        if let Some(view) = session.view() {
            self.view.render_question(&view);
        }
        self.with_session(|s| *s = Some(session));
        true
    }

    /// Answers the current question and logs the attempt in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_answer(&self, selected: usize) -> PortResult<AnswerFeedback> {
        let (feedback, attempt, view) = self.with_session(|slot| {
            let session = slot
                .as_mut()
                .ok_or_else(|| PortError::Validation("No quiz in progress".into()))?;
            let question = session
                .questions
                .get(session.index)
                .cloned()
                .ok_or_else(|| PortError::Validation("No question to answer".into()))?;
            let feedback = session.answer(selected)?;
            let attempt = QuizAttempt {
                user_token: session.ctx.user_token.clone(),
                course_id: session.ctx.course_id,
                question: question.question,
                quiz_title: session.title.clone(),
                selected_option: selected,
                correct_option: question.correct,
                is_correct: feedback.correct,
            };
            Ok::<_, PortError>((feedback, attempt, session.view()))
        })?;

        let backend = self.state.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.log_quiz_attempt(&attempt).await {
                warn!(error = %e, "Failed to log quiz attempt");
            }
        });

        if let Some(view) = view {
            self.view.render_question(&view);
        }
        Ok(feedback)
    }

    /// Moves to the next question, or past the last one to the summary.
    ///
    /// Finishing with every question answered marks the catalogue entry
    /// completed and refreshes the progress dashboard.
    pub async fn next(&self) -> PortResult<()> {
        let finished = self.with_session(|slot| {
            let Some(session) = slot.as_mut() else {
                return None;
            };
            session.next();
            match session.view() {
                Some(view) => {
                    self.view.render_question(&view);
                    None
                }
                None => Some(session.clone()),
            }
        });

        if let Some(session) = finished {
            self.finish(&session).await?;
        }
        Ok(())
    }

    pub fn previous(&self) {
        self.with_session(|slot| {
            if let Some(session) = slot.as_mut() {
                if session.previous() {
                    if let Some(view) = session.view() {
                        self.view.render_question(&view);
                    }
                }
            }
        });
    }

    pub fn review(&self) {
        self.with_session(|slot| {
            if let Some(session) = slot.as_mut() {
                session.review();
                if let Some(view) = session.view() {
                    self.view.render_question(&view);
                }
            }
        });
    }

    /// Leaves the quiz and returns to the catalogue.
    pub fn close(&self) {
        self.with_session(|slot| *slot = None);
    }

    async fn finish(&self, session: &QuizSession) -> PortResult<()> {
        self.view.render_quiz_summary(&session.summary());
        if !session.is_complete() {
            return Ok(());
        }

        if let Some(quiz_id) = session.quiz_id {
            self.state.storage.mark_quiz_completed(quiz_id)?;
        }
        match self.state.backend.get_progress(&session.ctx).await {
            Ok(progress) => self.view.render_progress(&progress),
            Err(e) => warn!(error = %e, "Could not refresh progress after quiz"),
        }
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Catalogue
    //-------------------------------------------------------------------------------------

    pub fn catalogue(&self) -> PortResult<Vec<CatalogueEntry>> {
        self.state
            .storage
            .quiz_topics()?
            .into_iter()
            .map(|descriptor| {
                Ok(CatalogueEntry {
                    completed: self.state.storage.is_quiz_completed(descriptor.id)?,
                    descriptor,
                })
            })
            .collect()
    }

    /// Adds the descriptor for `material`, unless one already exists.
    ///
    /// Returns the descriptor for the material either way, and whether it was new.
    pub fn add_for_material(&self, material: &Material) -> PortResult<(QuizDescriptor, bool)> {
        let now = self.state.clock.now().timestamp_millis();
        let (descriptor, added) = self.state.storage.add_quiz_topic(&material.id, now, |id| QuizDescriptor {
            id,
            material_id: Some(material.id.clone()),
            topic: clean_topic(&material.title),
            difficulty: CATALOGUE_DIFFICULTY.to_string(),
            num_questions: CATALOGUE_QUESTIONS,
        })?;
        if added {
            info!(topic = %descriptor.topic, id = descriptor.id, "Quiz added to catalogue");
        }
        Ok((descriptor, added))
    }

    pub fn remove_for_material(&self, material_id: &MaterialId) -> PortResult<usize> {
        self.state.storage.remove_quiz_topics_for(material_id)
    }

    pub fn clear_catalogue(&self) -> PortResult<()> {
        self.state.storage.clear_quiz_topics()
    }
}
