pub mod domain;
pub mod pipeline;
pub mod ports;

pub use domain::{
    Chapter, ChapterArtifact, Course, CourseStatus, Outline, OutlineChapter, Question,
    QuestionDraft, RawExtraction, SourceInput, SourceKind,
};
pub use pipeline::{process_course, run_generation, GenerationServices, PipelineError};
pub use ports::{
    AudioStorageService, ChapterContentService, CourseStructureService, DatabaseService, PortError,
    PortResult, SourceExtractionService, TextToSpeechService,
};
