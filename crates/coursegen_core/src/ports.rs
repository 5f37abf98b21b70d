//! crates/coursegen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Chapter, Course, CourseStatus, Outline, Question, QuestionDraft, RawExtraction, SourceInput,
    SourceKind,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Course Management ---
    /// Creates a course row with status `processing` and a placeholder title.
    async fn create_course(
        &self,
        user_id: Uuid,
        title: &str,
        source_kind: SourceKind,
        source_url: Option<&str>,
    ) -> PortResult<Course>;

    async fn update_course_title(&self, course_id: Uuid, title: &str) -> PortResult<()>;

    async fn update_course_status(&self, course_id: Uuid, status: CourseStatus) -> PortResult<()>;

    async fn get_course(&self, course_id: Uuid, user_id: Uuid) -> PortResult<Course>;

    async fn list_courses_for_user(&self, user_id: Uuid) -> PortResult<Vec<Course>>;

    /// Deletes a course; chapters and questions go with it.
    async fn delete_course(&self, course_id: Uuid, user_id: Uuid) -> PortResult<()>;

    // --- Chapter and Question Management ---
    async fn create_chapter(
        &self,
        course_id: Uuid,
        title: &str,
        summary: &str,
        audio_url: Option<&str>,
        order_index: usize,
    ) -> PortResult<Chapter>;

    async fn create_questions(
        &self,
        chapter_id: Uuid,
        questions: &[QuestionDraft],
    ) -> PortResult<()>;

    async fn get_chapters_for_course(&self, course_id: Uuid) -> PortResult<Vec<Chapter>>;

    async fn get_questions_for_chapter(&self, chapter_id: Uuid) -> PortResult<Vec<Question>>;
}

#[async_trait]
pub trait SourceExtractionService: Send + Sync {
    /// Produces plain text from one source variant. A pure transform apart
    /// from the network fetch; every failure mode surfaces as a single
    /// `PortError` whose message names the sub-cause.
    async fn extract(&self, source: &SourceInput) -> PortResult<RawExtraction>;
}

#[async_trait]
pub trait CourseStructureService: Send + Sync {
    /// Turns extracted text into a titled chapter outline via one
    /// generative-model call.
    async fn plan_outline(&self, text: &str) -> PortResult<Outline>;
}

#[async_trait]
pub trait ChapterContentService: Send + Sync {
    /// Generates an educational summary for one chapter.
    async fn generate_summary(
        &self,
        chapter_title: &str,
        chapter_content: &str,
    ) -> PortResult<String>;

    /// Generates 3-5 multiple-choice questions for one chapter, each with
    /// exactly four options.
    async fn generate_questions(
        &self,
        chapter_title: &str,
        chapter_content: &str,
    ) -> PortResult<Vec<QuestionDraft>>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait AudioStorageService: Send + Sync {
    /// Uploads audio bytes under `path` with upsert semantics and returns
    /// a durable public URL.
    async fn upload_audio(&self, path: &str, bytes: Vec<u8>) -> PortResult<String>;
}
