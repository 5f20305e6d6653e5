//! Mentor prompt construction and reply parsing.
//!
//! The backend's reply is expected to be a JSON object with summary,
//! questions, and exercise fields, possibly wrapped in markdown code
//! fences. Anything that doesn't parse is treated as a miss, not an
//! error, so the route can fall back to "mentor unavailable".

use serde::Deserialize;

use crate::db::feedback::FeedbackRow;
use crate::db::processes::ProcessRow;

pub const SYSTEM_PROMPT: &str = "You are a thoughtful creative mentor. You respond only with a JSON \
object of the form {\"summary\": string, \"questions\": [string], \"exercise\": string}. The summary \
reflects back what the creator is working through, the questions open up their process without \
prescribing answers, and the exercise is one small concrete step they could try.";

/// A parsed mentor reply.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MentorAdvice {
    pub summary: String,
    #[serde(default)]
    pub questions: Vec<String>,
    pub exercise: String,
}

/// Build the user prompt from a process and its peer feedback.
pub fn build_prompt(process: &ProcessRow, feedback: &[FeedbackRow]) -> String {
    let mut prompt = format!(
        "A creator is documenting a work in progress.\n\nTitle: {}\nPhase: {}\n",
        process.title, process.phase
    );
    if let Some(description) = &process.description {
        if !description.is_empty() {
            prompt.push_str(&format!("Description: {}\n", description));
        }
    }
    if !feedback.is_empty() {
        prompt.push_str("\nPeer feedback so far:\n");
        for item in feedback.iter().take(10) {
            prompt.push_str(&format!("- [{}] {}\n", item.kind, item.content));
        }
    }
    prompt.push_str("\nRespond with the JSON object only.");
    prompt
}

/// Parse a backend reply, tolerating markdown code fences around the JSON.
pub fn parse_advice(raw: &str) -> Option<MentorAdvice> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).ok()
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process() -> ProcessRow {
        ProcessRow {
            id: "p1".into(),
            owner_id: "a1".into(),
            title: "Morning sketches".into(),
            description: Some("Charcoal studies of hands".into()),
            phase: "Flow".into(),
            visibility: "public".into(),
            status: "published".into(),
            media_url: None,
            media_type: None,
            reflection_question: None,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn prompt_includes_title_phase_and_feedback() {
        let fb = vec![FeedbackRow {
            id: "f1".into(),
            process_id: "p1".into(),
            author_id: "a2".into(),
            kind: "works".into(),
            content: "The gesture in the third one reads well".into(),
            parent_id: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        }];
        let prompt = build_prompt(&process(), &fb);
        assert!(prompt.contains("Morning sketches"));
        assert!(prompt.contains("Flow"));
        assert!(prompt.contains("gesture in the third"));
    }

    #[test]
    fn parses_bare_json() {
        let raw = r#"{"summary": "s", "questions": ["q1"], "exercise": "e"}"#;
        let advice = parse_advice(raw).unwrap();
        assert_eq!(advice.summary, "s");
        assert_eq!(advice.questions, vec!["q1"]);
        assert_eq!(advice.exercise, "e");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"summary\": \"s\", \"questions\": [], \"exercise\": \"e\"}\n```";
        let advice = parse_advice(raw).unwrap();
        assert_eq!(advice.summary, "s");
    }

    #[test]
    fn garbage_reply_is_a_miss() {
        assert!(parse_advice("I'd be happy to help with that!").is_none());
        assert!(parse_advice("").is_none());
    }

    #[test]
    fn missing_questions_defaults_empty() {
        let raw = r#"{"summary": "s", "exercise": "e"}"#;
        let advice = parse_advice(raw).unwrap();
        assert!(advice.questions.is_empty());
    }
}
