//! services/api/src/adapters/content_llm.rs
//!
//! This module contains the adapter for the per-chapter content LLM: the
//! educational summary and the multiple-choice quiz. It implements the
//! `ChapterContentService` port from the `core` crate.

const SUMMARY_INSTRUCTIONS: &str = r#"You are an expert teacher who writes detailed educational summaries.
Your goal is a complete, easy-to-follow summary that lets a student learn the chapter's content.

Rules:
- Use an educational, accessible tone
- Cover the key concepts and explain them
- Organize the information into clear, well-structured paragraphs
- Be detailed but concise
- Include examples where they help comprehension"#;

const QUESTION_INSTRUCTIONS: &str = r#"You are an expert teacher who writes multiple-choice questions to check student comprehension.

You must return JSON with the following shape:
{
  "questions": [
    {
      "question": "The question text",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_index": 0,
      "explanation": "Why this is the correct answer"
    }
  ]
}

Rules:
- Write between 3 and 5 questions per chapter
- Each question must have exactly 4 options
- correct_index is the 0-based index of the correct option
- Questions must test comprehension, not just recall
- Include a clear explanation for each correct answer"#;

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
    domain::QuestionDraft,
    ports::{ChapterContentService, PortError, PortResult},
};
use serde::Deserialize;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChapterContentService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiContentAdapter {
    client: Client<OpenAIConfig>,
    summary_model: String,
    question_model: String,
}

impl OpenAiContentAdapter {
    /// Creates a new `OpenAiContentAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        summary_model: String,
        question_model: String,
    ) -> Self {
        Self {
            client,
            summary_model,
            question_model,
        }
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: String,
        json_output: bool,
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(model).messages(messages);
        if json_output {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::Unexpected("Chat model returned no content".to_string()))
    }
}

//=========================================================================================
// Structured Payload Parsing
//=========================================================================================

#[derive(Deserialize)]
struct QuestionsPayload {
    questions: Vec<QuestionPayload>,
}

#[derive(Deserialize)]
struct QuestionPayload {
    question: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: String,
}

/// Parses the quiz payload, enforcing the four-options and in-bounds
/// correct-index invariants on every item.
pub(crate) fn parse_questions_payload(content: &str) -> PortResult<Vec<QuestionDraft>> {
    let payload: QuestionsPayload = serde_json::from_str(content)
        .map_err(|e| PortError::Unexpected(format!("Question payload did not parse: {}", e)))?;

    if payload.questions.is_empty() {
        return Err(PortError::Unexpected(
            "Question payload contains no questions".to_string(),
        ));
    }

    let drafts: Vec<QuestionDraft> = payload
        .questions
        .into_iter()
        .map(|q| QuestionDraft {
            question: q.question,
            options: q.options,
            correct_index: q.correct_index,
            explanation: q.explanation,
        })
        .collect();

    if let Some(bad) = drafts.iter().find(|d| !d.is_well_formed()) {
        return Err(PortError::Unexpected(format!(
            "Malformed question (needs exactly 4 options and an in-bounds answer): {}",
            bad.question
        )));
    }

    Ok(drafts)
}

fn chapter_prompt(task: &str, chapter_title: &str, chapter_content: &str) -> String {
    format!(
        "{} for the following chapter:\n\nTitle: {}\n\nContent:\n{}",
        task, chapter_title, chapter_content
    )
}

//=========================================================================================
// `ChapterContentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChapterContentService for OpenAiContentAdapter {
    async fn generate_summary(
        &self,
        chapter_title: &str,
        chapter_content: &str,
    ) -> PortResult<String> {
        self.chat(
            &self.summary_model,
            SUMMARY_INSTRUCTIONS,
            chapter_prompt(
                "Write a detailed educational summary",
                chapter_title,
                chapter_content,
            ),
            false,
        )
        .await
    }

    async fn generate_questions(
        &self,
        chapter_title: &str,
        chapter_content: &str,
    ) -> PortResult<Vec<QuestionDraft>> {
        let content = self
            .chat(
                &self.question_model,
                QUESTION_INSTRUCTIONS,
                chapter_prompt(
                    "Write multiple-choice questions",
                    chapter_title,
                    chapter_content,
                ),
                true,
            )
            .await?;

        parse_questions_payload(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_json(correct_index: usize, options: &[&str]) -> String {
        let options = options
            .iter()
            .map(|o| format!("\"{}\"", o))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"{{"questions": [{{"question": "Which one?", "options": [{}], "correct_index": {}, "explanation": "Because."}}]}}"#,
            options, correct_index
        )
    }

    #[test]
    fn parses_a_well_formed_quiz() {
        let drafts = parse_questions_payload(&quiz_json(2, &["a", "b", "c", "d"])).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].correct_index, 2);
        assert_eq!(drafts[0].options.len(), 4);
    }

    #[test]
    fn rejects_a_quiz_with_the_wrong_option_count() {
        assert!(parse_questions_payload(&quiz_json(0, &["a", "b", "c"])).is_err());
        assert!(parse_questions_payload(&quiz_json(0, &["a", "b", "c", "d", "e"])).is_err());
    }

    #[test]
    fn rejects_an_out_of_bounds_correct_index() {
        assert!(parse_questions_payload(&quiz_json(4, &["a", "b", "c", "d"])).is_err());
    }

    #[test]
    fn rejects_missing_or_empty_payloads() {
        assert!(parse_questions_payload(r#"{"questions": []}"#).is_err());
        assert!(parse_questions_payload("not json").is_err());
    }
}
