//! crates/coursegen_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The kind of learning source a course was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Document,
    Article,
    Video,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::Article => "article",
            SourceKind::Video => "video",
        }
    }
}

/// The lifecycle status of a course. Transitions are monotonic:
/// `Processing` moves to exactly one of `Ready` or `Error` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseStatus {
    Processing,
    Ready,
    Error,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Processing => "processing",
            CourseStatus::Ready => "ready",
            CourseStatus::Error => "error",
        }
    }
}

/// Represents a generated course owned by a user.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub source_kind: SourceKind,
    pub source_url: Option<String>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
}

/// One chapter of a course. `audio_url` stays `None` when narration
/// generation failed or has not run.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub summary: String,
    pub audio_url: Option<String>,
    pub order_index: usize,
}

/// A persisted multiple-choice question belonging to a chapter.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

/// The input to a generation job. Exactly one variant is supplied,
/// dispatched on by the extraction stage.
#[derive(Debug, Clone)]
pub enum SourceInput {
    Document { bytes: Vec<u8> },
    Article { url: String },
    Video { url: String },
}

impl SourceInput {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceInput::Document { .. } => SourceKind::Document,
            SourceInput::Article { .. } => SourceKind::Article,
            SourceInput::Video { .. } => SourceKind::Video,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            SourceInput::Document { .. } => None,
            SourceInput::Article { url } | SourceInput::Video { url } => Some(url),
        }
    }
}

/// Plain text lifted out of a source. Transient: consumed once by the
/// structure planner and discarded.
#[derive(Debug, Clone)]
pub struct RawExtraction {
    pub text: String,
    pub kind: SourceKind,
}

/// One planned chapter: a title plus the slice of source content the
/// chapter should be generated from.
#[derive(Debug, Clone)]
pub struct OutlineChapter {
    pub title: String,
    pub content: String,
}

/// The structure planner's output: a course title plus ordered chapters.
/// Transient: drives persistence and per-chapter generation, then is dropped.
#[derive(Debug, Clone)]
pub struct Outline {
    pub title: String,
    pub chapters: Vec<OutlineChapter>,
}

/// A generated question that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

impl QuestionDraft {
    /// Exactly four options and an in-bounds correct index.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == 4 && self.correct_index < self.options.len()
    }
}

/// Everything generated for one chapter: the summary, its quiz, and the
/// public audio locator when narration succeeded.
#[derive(Debug, Clone)]
pub struct ChapterArtifact {
    pub summary: String,
    pub questions: Vec<QuestionDraft>,
    pub audio_url: Option<String>,
}
