//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursegen_core::domain::{Chapter, Course, CourseStatus, Question, QuestionDraft, SourceKind};
use coursegen_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

fn source_kind_from_str(value: &str) -> PortResult<SourceKind> {
    match value {
        "document" => Ok(SourceKind::Document),
        "article" => Ok(SourceKind::Article),
        "video" => Ok(SourceKind::Video),
        other => Err(PortError::Unexpected(format!(
            "Unknown source type in database: {}",
            other
        ))),
    }
}

fn status_from_str(value: &str) -> PortResult<CourseStatus> {
    match value {
        "processing" => Ok(CourseStatus::Processing),
        "ready" => Ok(CourseStatus::Ready),
        "error" => Ok(CourseStatus::Error),
        other => Err(PortError::Unexpected(format!(
            "Unknown course status in database: {}",
            other
        ))),
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    source_type: String,
    source_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        Ok(Course {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            source_kind: source_kind_from_str(&self.source_type)?,
            source_url: self.source_url,
            status: status_from_str(&self.status)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ChapterRecord {
    id: Uuid,
    course_id: Uuid,
    title: String,
    summary: String,
    audio_url: Option<String>,
    order_index: i32,
}
impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            summary: self.summary,
            audio_url: self.audio_url,
            order_index: self.order_index as usize,
        }
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    chapter_id: Uuid,
    question: String,
    options: Vec<String>,
    correct_index: i32,
    explanation: String,
}
impl QuestionRecord {
    fn to_domain(self) -> Question {
        Question {
            id: self.id,
            chapter_id: self.chapter_id,
            question: self.question,
            options: self.options,
            correct_index: self.correct_index as usize,
            explanation: self.explanation,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_course(
        &self,
        user_id: Uuid,
        title: &str,
        source_kind: SourceKind,
        source_url: Option<&str>,
    ) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "INSERT INTO courses (id, user_id, title, source_type, source_url, status) \
             VALUES ($1, $2, $3, $4, $5, 'processing') \
             RETURNING id, user_id, title, source_type, source_url, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(source_kind.as_str())
        .bind(source_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn update_course_title(&self, course_id: Uuid, title: &str) -> PortResult<()> {
        sqlx::query("UPDATE courses SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn update_course_status(&self, course_id: Uuid, status: CourseStatus) -> PortResult<()> {
        sqlx::query("UPDATE courses SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_course(&self, course_id: Uuid, user_id: Uuid) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, user_id, title, source_type, source_url, status, created_at \
             FROM courses WHERE id = $1 AND user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;

        record.to_domain()
    }

    async fn list_courses_for_user(&self, user_id: Uuid) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, user_id, title, source_type, source_url, status, created_at \
             FROM courses WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn delete_course(&self, course_id: Uuid, user_id: Uuid) -> PortResult<()> {
        // Chapters and questions cascade via foreign keys.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Course {} not found",
                course_id
            )));
        }
        Ok(())
    }

    async fn create_chapter(
        &self,
        course_id: Uuid,
        title: &str,
        summary: &str,
        audio_url: Option<&str>,
        order_index: usize,
    ) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(
            "INSERT INTO chapters (id, course_id, title, summary, audio_url, order_index) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, course_id, title, summary, audio_url, order_index",
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(title)
        .bind(summary)
        .bind(audio_url)
        .bind(order_index as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn create_questions(
        &self,
        chapter_id: Uuid,
        questions: &[QuestionDraft],
    ) -> PortResult<()> {
        for draft in questions {
            sqlx::query(
                "INSERT INTO questions (id, chapter_id, question, options, correct_index, explanation) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(chapter_id)
            .bind(&draft.question)
            .bind(&draft.options)
            .bind(draft.correct_index as i32)
            .bind(&draft.explanation)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        Ok(())
    }

    async fn get_chapters_for_course(&self, course_id: Uuid) -> PortResult<Vec<Chapter>> {
        let records = sqlx::query_as::<_, ChapterRecord>(
            "SELECT id, course_id, title, summary, audio_url, order_index \
             FROM chapters WHERE course_id = $1 ORDER BY order_index ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_questions_for_chapter(&self, chapter_id: Uuid) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, chapter_id, question, options, correct_index, explanation \
             FROM questions WHERE chapter_id = $1",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
