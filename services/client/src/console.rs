//! services/client/src/console.rs
//!
//! A `PanelView` that renders the panel as plain text on stdout.

use edwin_core::domain::{
    AccuracyClass, ChatMessage, ExplainMode, Explanation, Material, Mastery, Progress, Sender,
};
use edwin_core::extract::excerpt;
use edwin_core::ports::{
    Control, ControlState, PanelView, QuestionView, QuizSummary, StatusArea, StatusKind,
};
use tracing::debug;

const SNIPPET_CHARS: usize = 120;

#[derive(Debug, Default)]
pub struct ConsoleView;

impl ConsoleView {
    pub fn new() -> Self {
        Self
    }
}

fn area_label(area: StatusArea) -> &'static str {
    match area {
        StatusArea::Chat => "chat",
        StatusArea::Sync => "sync",
        StatusArea::Upload => "upload",
        StatusArea::Explain => "explain",
        StatusArea::Materials => "materials",
        StatusArea::Quiz => "quiz",
    }
}

pub fn format_status(area: StatusArea, kind: StatusKind, text: &str) -> String {
    let marker = match kind {
        StatusKind::Info => "..",
        StatusKind::Success => "ok",
        StatusKind::Error => "!!",
    };
    format!("[{}] {} {}", area_label(area), marker, text)
}

pub fn format_message(message: &ChatMessage) -> String {
    let speaker = match message.sender {
        Sender::User => "You",
        Sender::Edwin => "Edwin",
    };
    let mut out = format!(
        "{} {}: {}",
        message.sent_at.format("%H:%M"),
        speaker,
        message.text
    );
    for (n, citation) in message.citations.iter().enumerate() {
        out.push_str(&format!("\n    [{}] {}", n + 1, citation.title));
        if let Some(url) = &citation.url {
            out.push_str(&format!(" <{}>", url));
        }
        if let Some(snippet) = citation.snippet.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            out.push_str(&format!("\n        \"{}\"", excerpt(snippet, SNIPPET_CHARS)));
        }
    }
    if message.grounded == Some(false) {
        out.push_str("\n    (general knowledge, not from course material)");
    }
    out
}

pub fn format_question(view: &QuestionView) -> String {
    let mut out = format!(
        "{} | Question {} of {}\n{}",
        view.quiz_title,
        view.index + 1,
        view.total,
        view.question
    );
    for (i, option) in view.options.iter().enumerate() {
        let letter = (b'A' + (i % 26) as u8) as char;
        let chosen = if view.selected == Some(i) { ">" } else { " " };
        out.push_str(&format!("\n {} {}. {}", chosen, letter, option));
    }
    if let Some(feedback) = &view.feedback {
        let verdict = if feedback.correct { "Correct!" } else { "Incorrect." };
        out.push_str(&format!("\n{} {}", verdict, feedback.explanation));
    }
    out
}

pub fn format_progress(progress: &Progress) -> String {
    let filled = progress.stage() as usize;
    let empty = Progress::SEGMENTS as usize - filled;
    format!(
        "[{}{}] {} quizzes completed | {}% accuracy | {} day streak",
        "#".repeat(filled),
        "-".repeat(empty),
        progress.quizzes_completed,
        (progress.accuracy * 100.0).round(),
        progress.streak
    )
}

pub fn format_mastery(mastery: &Mastery) -> String {
    let mut out = format!(
        "Streak: {} days | Attempts: {} | Last active: {}",
        mastery.streak_days,
        mastery.total_attempts,
        mastery.last_active.as_deref().unwrap_or("never")
    );
    if mastery.topics.is_empty() {
        out.push_str("\nNo quiz attempts yet. Take a quiz to start tracking mastery.");
    }
    for topic in &mastery.topics {
        let class = match AccuracyClass::of(topic.accuracy) {
            AccuracyClass::High => "strong",
            AccuracyClass::Medium => "fair",
            AccuracyClass::Low => "weak",
        };
        out.push_str(&format!(
            "\n  {:<30} {:>4}% ({}/{}) {}",
            topic.topic,
            (topic.accuracy * 100.0).round(),
            topic.correct,
            topic.total,
            class
        ));
    }
    if !mastery.weakest_topics.is_empty() {
        let names: Vec<&str> = mastery.weakest_topics.iter().map(|t| t.topic.as_str()).collect();
        out.push_str(&format!("\nFocus next on: {}", names.join(", ")));
    }
    out
}

pub fn format_explanation(explanation: &Explanation, mode: ExplainMode) -> String {
    let heading = match mode {
        ExplainMode::Explain => "Page explanation",
        ExplainMode::Practice => "Practice",
    };
    let mut out = format!("{}\n{}", heading, explanation.summary);
    let sections = [
        ("Key points", &explanation.key_points),
        ("Common mistakes", &explanation.common_mistakes),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}:", title));
        for item in items {
            out.push_str(&format!("\n  - {}", item));
        }
    }
    out
}

pub fn format_materials(materials: &[Material]) -> String {
    if materials.is_empty() {
        return "No materials uploaded yet".to_string();
    }
    materials
        .iter()
        .map(|m| format!("  {:>6}  {}  {}", m.id.to_string(), m.title, m.uploaded_at))
        .collect::<Vec<_>>()
        .join("\n")
}

impl PanelView for ConsoleView {
    fn set_control(&self, control: Control, state: ControlState) {
        match state {
            ControlState::Busy(label) => println!("{}", label),
            ControlState::Ready => debug!(?control, "Control ready"),
        }
    }

    fn append_message(&self, message: &ChatMessage) {
        println!("{}", format_message(message));
    }

    fn show_status(&self, area: StatusArea, kind: StatusKind, text: &str) {
        println!("{}", format_status(area, kind, text));
    }

    fn set_backend_online(&self, online: bool) {
        if !online {
            println!("Edwin is offline. Start the backend and try again.");
        }
    }

    fn notify(&self, text: &str) {
        println!("* {}", text);
    }

    fn render_sync_status(&self, line: &str) {
        println!("{}", line);
    }

    fn render_question(&self, question: &QuestionView) {
        println!("{}", format_question(question));
    }

    fn render_quiz_summary(&self, summary: &QuizSummary) {
        println!(
            "{}: {} of {} correct ({} answered)",
            summary.quiz_title, summary.correct, summary.total, summary.answered
        );
    }

    fn render_progress(&self, progress: &Progress) {
        println!("{}", format_progress(progress));
    }

    fn render_mastery(&self, mastery: &Mastery) {
        println!("{}", format_mastery(mastery));
    }

    fn render_explanation(&self, explanation: &Explanation, mode: ExplainMode) {
        println!("{}", format_explanation(explanation, mode));
    }

    fn render_materials(&self, materials: &[Material]) {
        println!("{}", format_materials(materials));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use edwin_core::domain::{Citation, MaterialId, TopicMastery};
    use edwin_core::ports::AnswerFeedback;

    #[test]
    fn ungrounded_answers_are_flagged() {
        let at = Utc.with_ymd_and_hms(2025, 9, 1, 14, 5, 0).unwrap();
        let mut message = ChatMessage::from_edwin("Probably Tuesday.", at);
        message.grounded = Some(false);
        assert_eq!(
            format_message(&message),
            "14:05 Edwin: Probably Tuesday.\n    (general knowledge, not from course material)"
        );

        message.grounded = Some(true);
        message.citations = vec![Citation {
            title: "Syllabus".into(),
            url: Some("https://canvas.example.edu/s".into()),
            snippet: None,
        }];
        assert_eq!(
            format_message(&message),
            "14:05 Edwin: Probably Tuesday.\n    [1] Syllabus <https://canvas.example.edu/s>"
        );
    }

    #[test]
    fn citation_snippets_are_shortened() {
        let at = Utc.with_ymd_and_hms(2025, 9, 1, 14, 5, 0).unwrap();
        let mut message = ChatMessage::from_edwin("See the syllabus.", at);
        message.citations = vec![Citation {
            title: "Syllabus".into(),
            url: None,
            snippet: Some(format!("The midterm is on October 14. {}", "x".repeat(200))),
        }];
        let text = format_message(&message);
        let quoted = text.lines().nth(2).unwrap().trim();
        assert!(quoted.starts_with("\"The midterm is on October 14."));
        assert!(quoted.ends_with("...\""));
        assert_eq!(quoted.chars().count(), SNIPPET_CHARS + 5);
    }

    #[test]
    fn answered_questions_show_the_choice_and_feedback() {
        let view = QuestionView {
            quiz_title: "Transport".into(),
            index: 0,
            total: 2,
            question: "Which layer does TCP live in?".into(),
            options: vec!["Link".into(), "Transport".into()],
            selected: Some(1),
            feedback: Some(AnswerFeedback {
                correct: true,
                explanation: "TCP is a transport protocol.".into(),
            }),
            can_go_back: false,
        };
        assert_eq!(
            format_question(&view),
            "Transport | Question 1 of 2\nWhich layer does TCP live in?\n   A. Link\n > B. Transport\nCorrect! TCP is a transport protocol."
        );
    }

    #[test]
    fn progress_bar_has_five_segments() {
        let progress = Progress {
            streak: 2,
            quizzes_completed: 4,
            accuracy: 0.76,
        };
        assert_eq!(
            format_progress(&progress),
            "[##---] 4 quizzes completed | 76% accuracy | 2 day streak"
        );
    }

    #[test]
    fn mastery_lists_topics_and_focus_areas() {
        let weak = TopicMastery {
            topic: "Routing".into(),
            accuracy: 0.4,
            attempts: 5,
            correct: 2,
            total: 5,
        };
        let mastery = Mastery {
            streak_days: 1,
            total_attempts: 5,
            last_active: None,
            topics: vec![weak.clone()],
            weakest_topics: vec![weak],
        };
        let text = format_mastery(&mastery);
        assert!(text.starts_with("Streak: 1 days | Attempts: 5 | Last active: never"));
        assert!(text.contains("(2/5) weak"));
        assert!(text.ends_with("Focus next on: Routing"));
    }

    #[test]
    fn empty_material_list() {
        assert_eq!(format_materials(&[]), "No materials uploaded yet");
        let listed = format_materials(&[Material {
            id: MaterialId::Number(4),
            title: "Lecture 1.pdf".into(),
            uploaded_at: "2025-08-30".into(),
        }]);
        assert_eq!(listed, "       4  Lecture 1.pdf  2025-08-30");
    }
}
