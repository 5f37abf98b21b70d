//! services/api/src/adapters/structure_llm.rs
//!
//! This module contains the adapter for the course-structure planning LLM.
//! It implements the `CourseStructureService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are an expert in education and curriculum design. Your task is to analyze the provided text and split it into a structured course with chapters.

You must return JSON with the following shape:
{
  "title": "Course title",
  "chapters": [
    {
      "title": "Chapter title",
      "content": "The portion of the source text relevant to this chapter"
    }
  ]
}

Rules:
- The course must have between 3 and 8 chapters
- Each chapter must have a descriptive title
- Each chapter's content must be a relevant portion of the original text
- The course title must be descriptive
- Organize the content in a logical, pedagogical progression"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use coursegen_core::{
    domain::{Outline, OutlineChapter},
    pipeline::clip_chars,
    ports::{CourseStructureService, PortError, PortResult},
};
use serde::Deserialize;

/// The model has a context budget; the planner only ever sees this many
/// characters of the extracted text. A deliberate lossy step.
const STRUCTURE_INPUT_LIMIT: usize = 30_000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CourseStructureService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiPlannerAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiPlannerAdapter {
    /// Creates a new `OpenAiPlannerAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Structured Payload Parsing
//=========================================================================================

#[derive(Deserialize)]
struct OutlinePayload {
    title: String,
    chapters: Vec<ChapterPayload>,
}

#[derive(Deserialize)]
struct ChapterPayload {
    title: String,
    content: String,
}

/// Parses the planner's JSON payload into an `Outline`, rejecting empty
/// titles and chapterless results. The 3-8 chapter bound the model is
/// prompted with is not re-enforced here; any parsed count is accepted.
pub(crate) fn parse_outline_payload(content: &str) -> PortResult<Outline> {
    let payload: OutlinePayload = serde_json::from_str(content)
        .map_err(|e| PortError::Unexpected(format!("Course structure did not parse: {}", e)))?;

    if payload.title.trim().is_empty() {
        return Err(PortError::Unexpected(
            "Course structure is missing a title".to_string(),
        ));
    }
    if payload.chapters.is_empty() {
        return Err(PortError::Unexpected(
            "Course structure contains no chapters".to_string(),
        ));
    }
    if payload
        .chapters
        .iter()
        .any(|c| c.title.trim().is_empty() || c.content.trim().is_empty())
    {
        return Err(PortError::Unexpected(
            "Course structure contains an empty chapter entry".to_string(),
        ));
    }

    Ok(Outline {
        title: payload.title,
        chapters: payload
            .chapters
            .into_iter()
            .map(|c| OutlineChapter {
                title: c.title,
                content: c.content,
            })
            .collect(),
    })
}

//=========================================================================================
// `CourseStructureService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseStructureService for OpenAiPlannerAdapter {
    /// Plans a titled chapter outline from the extracted text with a single
    /// structured-output model call.
    async fn plan_outline(&self, text: &str) -> PortResult<Outline> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "Analyze the following text and create a course structure:\n\n{}",
                    clip_chars(text, STRUCTURE_INPUT_LIMIT)
                ))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Structure planner returned no content".to_string())
            })?;

        parse_outline_payload(&content)
    }
}
