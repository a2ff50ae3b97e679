//! Question persistence.
//!
//! The [`QuestionStore`] trait is the pipeline's only write surface: the
//! resolution run touches exactly one question row, and the response
//! write is conditional so a duplicate trigger delivery can never
//! overwrite an existing answer.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_question`](QuestionStore::create_question) | Insert a new question with an empty response |
//! | [`get_question`](QuestionStore::get_question) | Fetch one question by id |
//! | [`update_response`](QuestionStore::update_response) | Write-once response + responded_at stamp |
//! | [`recent_questions`](QuestionStore::recent_questions) | Most recent N, in creation order |

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::Question;

/// Abstract document store holding question records.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Create a question with an empty response and return the record.
    async fn create_question(&self, text: &str, asked_by: &str) -> Result<Question>;

    /// Fetch a question by id.
    async fn get_question(&self, id: &str) -> Result<Option<Question>>;

    /// Set the serialized response and stamp `responded_at`, but only if
    /// no response exists yet. Returns whether the write happened.
    async fn update_response(&self, id: &str, response_json: &str) -> Result<bool>;

    /// The most recent `limit` questions, oldest first (conversation
    /// rendering order).
    async fn recent_questions(&self, limit: i64) -> Result<Vec<Question>>;
}

/// SQLite implementation of [`QuestionStore`].
pub struct SqliteQuestionStore {
    pool: SqlitePool,
}

impl SqliteQuestionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_question(row: &sqlx::sqlite::SqliteRow) -> Question {
    let created_at: i64 = row.get("created_at");
    let responded_at: Option<i64> = row.get("responded_at");

    Question {
        id: row.get("id"),
        text: row.get("question"),
        asked_by: row.get("asked_by"),
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
        responded_at: responded_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        response: row.get("response"),
        generated: row.get("generated"),
        rating: row.get("rating"),
    }
}

#[async_trait]
impl QuestionStore for SqliteQuestionStore {
    async fn create_question(&self, text: &str, asked_by: &str) -> Result<Question> {
        let question = Question {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            asked_by: asked_by.to_string(),
            created_at: Utc::now(),
            responded_at: None,
            response: None,
            generated: None,
            rating: None,
        };

        sqlx::query(
            r#"
            INSERT INTO questions (id, question, asked_by, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&question.id)
        .bind(&question.text)
        .bind(&question.asked_by)
        .bind(question.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(question)
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>> {
        let row = sqlx::query(
            "SELECT id, question, asked_by, created_at, responded_at, response, generated, rating \
             FROM questions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_question))
    }

    async fn update_response(&self, id: &str, response_json: &str) -> Result<bool> {
        // The `response IS NULL` predicate is the write-once guarantee.
        let result = sqlx::query(
            "UPDATE questions SET response = ?, responded_at = ? \
             WHERE id = ? AND response IS NULL",
        )
        .bind(response_json)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn recent_questions(&self, limit: i64) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT id, question, asked_by, created_at, responded_at, response, generated, rating \
             FROM questions ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut questions: Vec<Question> = rows.iter().map(row_to_question).collect();
        questions.reverse();
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_store() -> SqliteQuestionStore {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        SqliteQuestionStore::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let store = test_store().await;
        let created = store.create_question("What is the SLA?", "user-1").await.unwrap();

        let fetched = store.get_question(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.text, "What is the SLA?");
        assert_eq!(fetched.asked_by, "user-1");
        assert!(fetched.response.is_none());
        assert!(fetched.responded_at.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = test_store().await;
        assert!(store.get_question("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_response_is_write_once() {
        let store = test_store().await;
        let question = store.create_question("q", "u").await.unwrap();

        let first = store
            .update_response(&question.id, r#"[{"answer":"first"}]"#)
            .await
            .unwrap();
        assert!(first);

        let second = store
            .update_response(&question.id, r#"[{"answer":"second"}]"#)
            .await
            .unwrap();
        assert!(!second);

        let stored = store.get_question(&question.id).await.unwrap().unwrap();
        assert_eq!(stored.response.as_deref(), Some(r#"[{"answer":"first"}]"#));
        assert!(stored.responded_at.is_some());
    }

    #[tokio::test]
    async fn test_update_response_missing_question() {
        let store = test_store().await;
        let wrote = store
            .update_response("no-such-id", r#"[{"answer":"x"}]"#)
            .await
            .unwrap();
        assert!(!wrote);
    }

    #[tokio::test]
    async fn test_recent_returns_creation_order_and_limits() {
        let store = test_store().await;
        for i in 0..5 {
            store
                .create_question(&format!("question {}", i), "u")
                .await
                .unwrap();
        }

        let recent = store.recent_questions(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        // Last three, oldest first.
        assert_eq!(recent[0].text, "question 2");
        assert_eq!(recent[1].text, "question 3");
        assert_eq!(recent[2].text, "question 4");
    }
}
