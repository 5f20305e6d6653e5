//! Generative mentor feature.
//!
//! A thin value-add on top of the process data: builds a prompt from a
//! process and its peer feedback, asks an OpenAI-compatible backend for a
//! JSON-shaped reply, and caches the parsed advice in mentor_notes. Every
//! failure mode is soft; callers get `None`, never a backend error.

pub mod backend;
pub mod mock;
pub mod openai;
pub mod prompt;

use std::sync::Arc;

use tracing::warn;

use crate::db::{feedback, mentor_notes, processes, Db};
use crate::error::Result;

pub use backend::{MentorBackend, MentorError, MentorRequest};
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use prompt::{build_prompt, parse_advice, MentorAdvice};

/// Cached advice if present, otherwise a fresh generation. Returns `None`
/// when the backend misbehaves or the reply does not parse.
pub async fn advice_for_process(
    db: &Db,
    backend: &Arc<dyn MentorBackend>,
    process_id: &str,
    refresh: bool,
) -> Result<Option<mentor_notes::MentorNoteRow>> {
    if !refresh {
        let cached = db.with_conn(|conn| mentor_notes::get_note(conn, process_id))?;
        if cached.is_some() {
            return Ok(cached);
        }
    }

    let (process, peer_feedback) = db.with_conn(|conn| {
        let process = processes::get_process(conn, process_id)?;
        let peer_feedback = feedback::list_for_process(conn, process_id)?;
        Ok((process, peer_feedback))
    })?;

    let process = match process {
        Some(p) => p,
        None => return Ok(None),
    };

    let request = MentorRequest {
        system_prompt: prompt::SYSTEM_PROMPT.to_string(),
        user_prompt: build_prompt(&process, &peer_feedback),
        max_tokens: Some(600),
        temperature: Some(0.7),
    };

    let raw = match backend.complete(request).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(process_id, error = %err, "mentor completion failed");
            return Ok(None);
        }
    };

    let advice = match parse_advice(&raw) {
        Some(advice) => advice,
        None => {
            warn!(process_id, "mentor reply did not parse as advice");
            return Ok(None);
        }
    };

    db.with_conn(|conn| {
        mentor_notes::upsert_note(
            conn,
            process_id,
            &advice.summary,
            &advice.questions,
            &advice.exercise,
        )
    })?;
    db.with_conn(|conn| mentor_notes::get_note(conn, process_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> (Db, String, String) {
        let db = Db::open_in_memory().unwrap();
        let process_id = db
            .with_conn(|conn| {
                crate::db::accounts::create_account(conn, "a1", "maker@example.com", "hash")?;
                crate::db::profiles::create_profile(conn, "a1", Some("maker"))?;
                let process = processes::create_draft(conn, "a1")?;
                Ok(process.id)
            })
            .unwrap();
        (db, "a1".to_string(), process_id)
    }

    #[tokio::test]
    async fn advice_is_generated_and_cached() {
        let (db, _account, process_id) = seeded_db();
        let mock = Arc::new(
            MockBackend::new("mock")
                .with_response(r#"{"summary": "s", "questions": ["q"], "exercise": "e"}"#),
        );
        let call_counter = Arc::clone(&mock);
        let backend: Arc<dyn MentorBackend> = mock;

        let note = advice_for_process(&db, &backend, &process_id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note.summary, "s");
        assert_eq!(call_counter.call_count(), 1);

        // Second call hits the cache
        let note = advice_for_process(&db, &backend, &process_id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note.summary, "s");
        assert_eq!(call_counter.call_count(), 1);

        // refresh=true regenerates
        advice_for_process(&db, &backend, &process_id, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(call_counter.call_count(), 2);
    }

    #[tokio::test]
    async fn unparseable_reply_fails_soft() {
        let (db, _account, process_id) = seeded_db();
        let backend: Arc<dyn MentorBackend> =
            Arc::new(MockBackend::new("mock").with_response("not json at all"));

        let note = advice_for_process(&db, &backend, &process_id, false)
            .await
            .unwrap();
        assert!(note.is_none());
    }

    #[tokio::test]
    async fn unavailable_backend_fails_soft() {
        let (db, _account, process_id) = seeded_db();
        let backend: Arc<dyn MentorBackend> =
            Arc::new(MockBackend::new("mock").with_available(false));

        let note = advice_for_process(&db, &backend, &process_id, false)
            .await
            .unwrap();
        assert!(note.is_none());
    }

    #[tokio::test]
    async fn missing_process_yields_none() {
        let db = Db::open_in_memory().unwrap();
        let backend: Arc<dyn MentorBackend> = Arc::new(MockBackend::new("mock"));
        let note = advice_for_process(&db, &backend, "nope", false).await.unwrap();
        assert!(note.is_none());
    }
}
