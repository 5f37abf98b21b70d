pub mod content_llm;
pub mod db;
pub mod extraction;
pub mod storage;
pub mod structure_llm;
pub mod tts;

pub use content_llm::OpenAiContentAdapter;
pub use db::DbAdapter;
pub use extraction::SourceExtractor;
pub use storage::BucketStorageAdapter;
pub use structure_llm::OpenAiPlannerAdapter;
pub use tts::OpenAiTtsAdapter;
