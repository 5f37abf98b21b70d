//! crates/coursegen_core/src/pipeline.rs
//!
//! The asynchronous course-generation pipeline. This is the application's
//! orchestration logic: it sequences extraction, structure planning, and
//! per-chapter artifact generation over the service ports, persisting
//! incrementally so that partial progress survives a later failure.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{ChapterArtifact, CourseStatus, OutlineChapter, SourceInput};
use crate::ports::{
    AudioStorageService, ChapterContentService, CourseStructureService, DatabaseService,
    SourceExtractionService, TextToSpeechService,
};

/// Course title used between row creation and outline generation.
pub const PLACEHOLDER_TITLE: &str = "Processing...";

/// The TTS backend has an input-length ceiling; narration covers at most
/// this many characters of the summary.
pub const TTS_INPUT_LIMIT: usize = 4096;

//=========================================================================================
// Pipeline Errors
//=========================================================================================

/// A stage-typed error for the generation pipeline. Every variant except
/// `AudioGeneration` is fatal to the job; audio is an enhancement, the text
/// artifacts are the product.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("source extraction failed: {0}")]
    Extraction(String),
    #[error("course structure planning failed: {0}")]
    StructureParse(String),
    #[error("summary generation failed: {0}")]
    Summary(String),
    #[error("question generation failed: {0}")]
    QuestionGeneration(String),
    #[error("audio generation failed: {0}")]
    AudioGeneration(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// The stage name, for log correlation.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) => "extraction",
            PipelineError::StructureParse(_) => "structure",
            PipelineError::Summary(_) => "summary",
            PipelineError::QuestionGeneration(_) => "questions",
            PipelineError::AudioGeneration(_) => "audio",
            PipelineError::Persistence(_) => "persistence",
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::AudioGeneration(_))
    }
}

//=========================================================================================
// Service Bundle (Dependency Injection)
//=========================================================================================

/// The set of ports the pipeline runs over. Built once at startup and shared
/// across jobs; every client behind these traits is stateless and safely
/// reusable, so concurrent jobs need no coordination beyond distinct course ids.
pub struct GenerationServices {
    pub db: Arc<dyn DatabaseService>,
    pub extractor: Arc<dyn SourceExtractionService>,
    pub planner: Arc<dyn CourseStructureService>,
    pub content: Arc<dyn ChapterContentService>,
    pub tts: Arc<dyn TextToSpeechService>,
    pub storage: Arc<dyn AudioStorageService>,
}

//=========================================================================================
// Orchestration
//=========================================================================================

/// Runs one generation job to completion. Intended to be spawned as a
/// detached task after the course row exists with status `processing`; all
/// fatal errors are caught here, logged, and turned into a terminal `error`
/// status so nothing escapes to the submitter.
pub async fn process_course(services: Arc<GenerationServices>, course_id: Uuid, source: SourceInput) {
    match run_generation(&services, course_id, source).await {
        Ok(()) => info!(%course_id, "course generation complete"),
        Err(e) => {
            error!(%course_id, stage = e.stage(), error = %e, "course generation failed");
            if let Err(db_err) = services
                .db
                .update_course_status(course_id, CourseStatus::Error)
                .await
            {
                error!(%course_id, error = %db_err, "failed to mark course as errored");
            }
        }
    }
}

/// The staged pipeline body. Returns at the first fatal error; chapters
/// persisted by earlier iterations are never rolled back.
pub async fn run_generation(
    services: &GenerationServices,
    course_id: Uuid,
    source: SourceInput,
) -> Result<(), PipelineError> {
    // Stage 1: extract plain text from the source variant.
    let kind = source.kind();
    let raw = services
        .extractor
        .extract(&source)
        .await
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;
    info!(%course_id, kind = kind.as_str(), chars = raw.text.len(), "source text extracted");

    // Stage 2: plan the course outline.
    let outline = services
        .planner
        .plan_outline(&raw.text)
        .await
        .map_err(|e| PipelineError::StructureParse(e.to_string()))?;
    info!(
        %course_id,
        title = %outline.title,
        chapters = outline.chapters.len(),
        "course outline planned"
    );

    // Stage 3: the course title was a placeholder until now.
    services
        .db
        .update_course_title(course_id, &outline.title)
        .await
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;

    // Stage 4: chapters strictly in outline order, one at a time. Each
    // chapter's questions need a persisted chapter id, and sequential
    // processing keeps generative-backend concurrency predictable.
    for (index, chapter) in outline.chapters.iter().enumerate() {
        let artifact = generate_chapter_artifact(services, course_id, index, chapter).await?;

        let row = services
            .db
            .create_chapter(
                course_id,
                &chapter.title,
                &artifact.summary,
                artifact.audio_url.as_deref(),
                index,
            )
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        services
            .db
            .create_questions(row.id, &artifact.questions)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        info!(%course_id, chapter = index, questions = artifact.questions.len(), "chapter persisted");
    }

    // Stage 5: terminal `ready`.
    services
        .db
        .update_course_status(course_id, CourseStatus::Ready)
        .await
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;

    Ok(())
}

/// Produces the summary, quiz, and best-effort audio for one chapter.
/// Summary and questions are independent and run concurrently; audio runs
/// afterwards because it consumes the summary text.
async fn generate_chapter_artifact(
    services: &GenerationServices,
    course_id: Uuid,
    index: usize,
    chapter: &OutlineChapter,
) -> Result<ChapterArtifact, PipelineError> {
    let (summary, questions) = futures::join!(
        services.content.generate_summary(&chapter.title, &chapter.content),
        services.content.generate_questions(&chapter.title, &chapter.content),
    );
    let summary = summary.map_err(|e| PipelineError::Summary(e.to_string()))?;
    let questions = questions.map_err(|e| PipelineError::QuestionGeneration(e.to_string()))?;

    let audio_url = match render_chapter_audio(services, course_id, index, &summary).await {
        Ok(url) => Some(url),
        Err(e) => {
            // Non-fatal: the chapter proceeds without narration.
            warn!(%course_id, chapter = index, error = %e, "continuing without chapter audio");
            None
        }
    };

    Ok(ChapterArtifact {
        summary,
        questions,
        audio_url,
    })
}

/// Synthesizes narration for a bounded prefix of the summary and uploads it
/// under a deterministic path, so a re-run overwrites rather than duplicates.
async fn render_chapter_audio(
    services: &GenerationServices,
    course_id: Uuid,
    index: usize,
    summary: &str,
) -> Result<String, PipelineError> {
    let narration = clip_chars(summary, TTS_INPUT_LIMIT);
    let audio = services
        .tts
        .generate_audio(narration)
        .await
        .map_err(|e| PipelineError::AudioGeneration(e.to_string()))?;

    let path = format!("{}/chapter-{}.mp3", course_id, index);
    services
        .storage
        .upload_audio(&path, audio)
        .await
        .map_err(|e| PipelineError::AudioGeneration(e.to_string()))
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Chapter, Course, CourseStatus, Outline, OutlineChapter, Question, QuestionDraft,
        RawExtraction, SourceKind,
    };
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    //------------------------------------------------------------------
    // In-memory fakes for the service ports
    //------------------------------------------------------------------

    #[derive(Default)]
    struct FakeDb {
        title: Mutex<Option<String>>,
        status_log: Mutex<Vec<CourseStatus>>,
        chapters: Mutex<Vec<Chapter>>,
        questions: Mutex<Vec<Question>>,
        fail_chapter_inserts: bool,
    }

    #[async_trait]
    impl DatabaseService for FakeDb {
        async fn create_course(
            &self,
            user_id: Uuid,
            title: &str,
            source_kind: SourceKind,
            source_url: Option<&str>,
        ) -> PortResult<Course> {
            Ok(Course {
                id: Uuid::new_v4(),
                user_id,
                title: title.to_string(),
                source_kind,
                source_url: source_url.map(str::to_string),
                status: CourseStatus::Processing,
                created_at: Utc::now(),
            })
        }

        async fn update_course_title(&self, _course_id: Uuid, title: &str) -> PortResult<()> {
            *self.title.lock().unwrap() = Some(title.to_string());
            Ok(())
        }

        async fn update_course_status(
            &self,
            _course_id: Uuid,
            status: CourseStatus,
        ) -> PortResult<()> {
            self.status_log.lock().unwrap().push(status);
            Ok(())
        }

        async fn get_course(&self, course_id: Uuid, _user_id: Uuid) -> PortResult<Course> {
            Err(PortError::NotFound(course_id.to_string()))
        }

        async fn list_courses_for_user(&self, _user_id: Uuid) -> PortResult<Vec<Course>> {
            Ok(Vec::new())
        }

        async fn delete_course(&self, _course_id: Uuid, _user_id: Uuid) -> PortResult<()> {
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
            if self.fail_chapter_inserts {
                return Err(PortError::Unexpected("chapter insert refused".to_string()));
            }
            let chapter = Chapter {
                id: Uuid::new_v4(),
                course_id,
                title: title.to_string(),
                summary: summary.to_string(),
                audio_url: audio_url.map(str::to_string),
                order_index,
            };
            self.chapters.lock().unwrap().push(chapter.clone());
            Ok(chapter)
        }

        async fn create_questions(
            &self,
            chapter_id: Uuid,
            questions: &[QuestionDraft],
        ) -> PortResult<()> {
            let mut store = self.questions.lock().unwrap();
            for draft in questions {
                store.push(Question {
                    id: Uuid::new_v4(),
                    chapter_id,
                    question: draft.question.clone(),
                    options: draft.options.clone(),
                    correct_index: draft.correct_index,
                    explanation: draft.explanation.clone(),
                });
            }
            Ok(())
        }

        async fn get_chapters_for_course(&self, _course_id: Uuid) -> PortResult<Vec<Chapter>> {
            Ok(self.chapters.lock().unwrap().clone())
        }

        async fn get_questions_for_chapter(&self, chapter_id: Uuid) -> PortResult<Vec<Question>> {
            Ok(self
                .questions
                .lock()
                .unwrap()
                .iter()
                .filter(|q| q.chapter_id == chapter_id)
                .cloned()
                .collect())
        }
    }

    struct FakeExtractor {
        text: Option<String>,
    }

    #[async_trait]
    impl SourceExtractionService for FakeExtractor {
        async fn extract(&self, source: &SourceInput) -> PortResult<RawExtraction> {
            match &self.text {
                Some(text) => Ok(RawExtraction {
                    text: text.clone(),
                    kind: source.kind(),
                }),
                None => Err(PortError::Unexpected(
                    "no caption track available".to_string(),
                )),
            }
        }
    }

    struct FakePlanner {
        outline: Option<Outline>,
    }

    #[async_trait]
    impl CourseStructureService for FakePlanner {
        async fn plan_outline(&self, _text: &str) -> PortResult<Outline> {
            self.outline
                .clone()
                .ok_or_else(|| PortError::Unexpected("model returned no payload".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeContent {
        fail_summary_for: Option<String>,
        fail_questions_for: Option<String>,
    }

    #[async_trait]
    impl ChapterContentService for FakeContent {
        async fn generate_summary(
            &self,
            chapter_title: &str,
            _chapter_content: &str,
        ) -> PortResult<String> {
            if self.fail_summary_for.as_deref() == Some(chapter_title) {
                return Err(PortError::Unexpected("no content returned".to_string()));
            }
            Ok(format!("A summary of {}", chapter_title))
        }

        async fn generate_questions(
            &self,
            chapter_title: &str,
            _chapter_content: &str,
        ) -> PortResult<Vec<QuestionDraft>> {
            if self.fail_questions_for.as_deref() == Some(chapter_title) {
                return Err(PortError::Unexpected("malformed payload".to_string()));
            }
            Ok((0..4)
                .map(|i| QuestionDraft {
                    question: format!("Question {} about {}", i, chapter_title),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_index: i % 4,
                    explanation: "Because.".to_string(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeTts {
        fail_when_contains: Option<String>,
    }

    #[async_trait]
    impl TextToSpeechService for FakeTts {
        async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
            if let Some(marker) = &self.fail_when_contains {
                if text.contains(marker.as_str()) {
                    return Err(PortError::Unexpected("speech backend is down".to_string()));
                }
            }
            Ok(vec![0u8; 16])
        }
    }

    struct FakeStorage;

    #[async_trait]
    impl AudioStorageService for FakeStorage {
        async fn upload_audio(&self, path: &str, _bytes: Vec<u8>) -> PortResult<String> {
            Ok(format!("https://cdn.example.com/audio/{}", path))
        }
    }

    //------------------------------------------------------------------
    // Test wiring
    //------------------------------------------------------------------

    fn outline_of(n: usize) -> Outline {
        Outline {
            title: "Introduction to Rust".to_string(),
            chapters: (1..=n)
                .map(|i| OutlineChapter {
                    title: format!("Part {}", i),
                    content: format!("Source material for part {}", i),
                })
                .collect(),
        }
    }

    struct Fixture {
        db: Arc<FakeDb>,
        services: Arc<GenerationServices>,
    }

    fn fixture(
        extractor: FakeExtractor,
        planner: FakePlanner,
        content: FakeContent,
        tts: FakeTts,
        db: FakeDb,
    ) -> Fixture {
        let db = Arc::new(db);
        let services = Arc::new(GenerationServices {
            db: db.clone(),
            extractor: Arc::new(extractor),
            planner: Arc::new(planner),
            content: Arc::new(content),
            tts: Arc::new(tts),
            storage: Arc::new(FakeStorage),
        });
        Fixture { db, services }
    }

    fn default_fixture(outline: Outline) -> Fixture {
        fixture(
            FakeExtractor {
                text: Some("rust ".repeat(1000)),
            },
            FakePlanner {
                outline: Some(outline),
            },
            FakeContent::default(),
            FakeTts::default(),
            FakeDb::default(),
        )
    }

    fn article_source() -> SourceInput {
        SourceInput::Article {
            url: "https://example.com/post".to_string(),
        }
    }

    //------------------------------------------------------------------
    // Pipeline behaviour
    //------------------------------------------------------------------

    #[tokio::test]
    async fn four_chapter_outline_yields_four_ordered_chapters_and_ready() {
        let f = default_fixture(outline_of(4));
        let course_id = Uuid::new_v4();

        process_course(f.services.clone(), course_id, article_source()).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Ready]);
        assert_eq!(
            f.db.title.lock().unwrap().as_deref(),
            Some("Introduction to Rust")
        );

        let chapters = f.db.chapters.lock().unwrap();
        assert_eq!(chapters.len(), 4);
        for (i, chapter) in chapters.iter().enumerate() {
            assert_eq!(chapter.order_index, i);
            assert_eq!(chapter.title, format!("Part {}", i + 1));
            assert_eq!(chapter.course_id, course_id);
        }

        let questions = f.db.questions.lock().unwrap();
        assert_eq!(questions.len(), 16);
        for question in questions.iter() {
            assert_eq!(question.options.len(), 4);
            assert!(question.correct_index < question.options.len());
            assert!(chapters.iter().any(|c| c.id == question.chapter_id));
        }
    }

    #[tokio::test]
    async fn audio_failure_is_isolated_to_its_chapter() {
        let f = fixture(
            FakeExtractor {
                text: Some("text".to_string()),
            },
            FakePlanner {
                outline: Some(outline_of(3)),
            },
            FakeContent::default(),
            FakeTts {
                // The fake summary for chapter 2 contains its title.
                fail_when_contains: Some("Part 2".to_string()),
            },
            FakeDb::default(),
        );

        process_course(f.services.clone(), Uuid::new_v4(), article_source()).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Ready]);
        let audio: Vec<bool> = f
            .db
            .chapters
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.audio_url.is_some())
            .collect();
        assert_eq!(audio, vec![true, false, true]);
    }

    #[tokio::test]
    async fn summary_failure_keeps_earlier_chapters_and_marks_error() {
        let f = fixture(
            FakeExtractor {
                text: Some("text".to_string()),
            },
            FakePlanner {
                outline: Some(outline_of(4)),
            },
            FakeContent {
                fail_summary_for: Some("Part 3".to_string()),
                ..FakeContent::default()
            },
            FakeTts::default(),
            FakeDb::default(),
        );

        process_course(f.services.clone(), Uuid::new_v4(), article_source()).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Error]);
        let chapters = f.db.chapters.lock().unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].order_index, 0);
        assert_eq!(chapters[1].order_index, 1);
    }

    #[tokio::test]
    async fn question_failure_on_first_chapter_persists_nothing() {
        let f = fixture(
            FakeExtractor {
                text: Some("text".to_string()),
            },
            FakePlanner {
                outline: Some(outline_of(3)),
            },
            FakeContent {
                fail_questions_for: Some("Part 1".to_string()),
                ..FakeContent::default()
            },
            FakeTts::default(),
            FakeDb::default(),
        );

        process_course(f.services.clone(), Uuid::new_v4(), article_source()).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Error]);
        assert!(f.db.chapters.lock().unwrap().is_empty());
        assert!(f.db.questions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_ends_in_error_before_any_chapter_exists() {
        let f = fixture(
            FakeExtractor { text: None },
            FakePlanner {
                outline: Some(outline_of(3)),
            },
            FakeContent::default(),
            FakeTts::default(),
            FakeDb::default(),
        );

        let source = SourceInput::Video {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        };
        process_course(f.services.clone(), Uuid::new_v4(), source).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Error]);
        assert!(f.db.chapters.lock().unwrap().is_empty());
        // The title stays a placeholder when planning never ran.
        assert!(f.db.title.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn planner_failure_ends_in_error_without_title_update() {
        let f = fixture(
            FakeExtractor {
                text: Some("text".to_string()),
            },
            FakePlanner { outline: None },
            FakeContent::default(),
            FakeTts::default(),
            FakeDb::default(),
        );

        process_course(f.services.clone(), Uuid::new_v4(), article_source()).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Error]);
        assert!(f.db.title.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn persistence_failure_ends_in_error() {
        let f = fixture(
            FakeExtractor {
                text: Some("text".to_string()),
            },
            FakePlanner {
                outline: Some(outline_of(3)),
            },
            FakeContent::default(),
            FakeTts::default(),
            FakeDb {
                fail_chapter_inserts: true,
                ..FakeDb::default()
            },
        );

        process_course(f.services.clone(), Uuid::new_v4(), article_source()).await;

        assert_eq!(*f.db.status_log.lock().unwrap(), vec![CourseStatus::Error]);
        assert!(f.db.chapters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_generation_reports_the_failing_stage() {
        let f = fixture(
            FakeExtractor { text: None },
            FakePlanner { outline: None },
            FakeContent::default(),
            FakeTts::default(),
            FakeDb::default(),
        );

        let err = run_generation(&f.services, Uuid::new_v4(), article_source())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "extraction");
        assert!(err.is_fatal());
        assert!(!PipelineError::AudioGeneration("x".to_string()).is_fatal());
    }

    //------------------------------------------------------------------
    // Helpers
    //------------------------------------------------------------------

    #[test]
    fn clip_chars_respects_utf8_boundaries() {
        assert_eq!(clip_chars("hello", 10), "hello");
        assert_eq!(clip_chars("hello", 3), "hel");
        assert_eq!(clip_chars("héllo", 2), "hé");
        assert_eq!(clip_chars("", 5), "");
    }
}
