//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use coursegen_core::{
    domain::{Chapter, Course, Question, SourceInput},
    pipeline::{process_course, PLACEHOLDER_TITLE},
    ports::{DatabaseService, PortError},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_course_handler,
        list_courses_handler,
        get_course_handler,
        delete_course_handler,
    ),
    components(
        schemas(GenerateCourseResponse, CourseResponse, CourseDetailResponse, ChapterResponse, QuestionResponse)
    ),
    tags(
        (name = "Course Generation API", description = "API endpoints for generating and browsing AI-built courses.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The acknowledgment sent as soon as a generation job is accepted; the
/// actual work continues in the background.
#[derive(Serialize, ToSchema)]
pub struct GenerateCourseResponse {
    id: Uuid,
    status: String,
}

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    id: Uuid,
    title: String,
    source_type: String,
    source_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl CourseResponse {
    fn from_domain(course: Course) -> Self {
        Self {
            id: course.id,
            title: course.title,
            source_type: course.source_kind.as_str().to_string(),
            source_url: course.source_url,
            status: course.status.as_str().to_string(),
            created_at: course.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    id: Uuid,
    question: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: String,
}

impl QuestionResponse {
    fn from_domain(question: Question) -> Self {
        Self {
            id: question.id,
            question: question.question,
            options: question.options,
            correct_index: question.correct_index,
            explanation: question.explanation,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChapterResponse {
    id: Uuid,
    title: String,
    summary: String,
    audio_url: Option<String>,
    order_index: usize,
    questions: Vec<QuestionResponse>,
}

impl ChapterResponse {
    fn from_domain(chapter: Chapter, questions: Vec<Question>) -> Self {
        Self {
            id: chapter.id,
            title: chapter.title,
            summary: chapter.summary,
            audio_url: chapter.audio_url,
            order_index: chapter.order_index,
            questions: questions
                .into_iter()
                .map(QuestionResponse::from_domain)
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    course: CourseResponse,
    chapters: Vec<ChapterResponse>,
}

//=========================================================================================
// Request Validation
//=========================================================================================

/// Resolves the submitted multipart fields into a source variant. Exactly
/// one of {file, url} must be present; a url requires a valid source type.
pub(crate) fn resolve_source(
    file: Option<Vec<u8>>,
    url: Option<String>,
    source_type: Option<String>,
) -> Result<SourceInput, String> {
    match (file, url) {
        (Some(_), Some(_)) => Err("Provide either a document file or a URL, not both".to_string()),
        (None, None) => Err("You must provide a document file or a URL".to_string()),
        (Some(bytes), None) => {
            if bytes.is_empty() {
                Err("The uploaded file is empty".to_string())
            } else {
                Ok(SourceInput::Document { bytes })
            }
        }
        (None, Some(url)) => match source_type.as_deref() {
            Some("article") => Ok(SourceInput::Article { url }),
            Some("video") => Ok(SourceInput::Video { url }),
            _ => Err("Invalid source type. Use \"article\" or \"video\"".to_string()),
        },
    }
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unexpected(msg) => {
            error!("Request failed: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Submit a new course-generation job.
///
/// Accepts a multipart/form-data request with either a `file` part (a PDF
/// document) or `url` and `source_type` fields (`article` or `video`).
/// Responds immediately; generation continues in the background and is
/// observed by polling the course's `status`.
#[utoipa::path(
    post,
    path = "/courses/generate",
    request_body(content_type = "multipart/form-data", description = "A document file, or a url plus source_type."),
    responses(
        (status = 201, description = "Generation job accepted", body = GenerateCourseResponse),
        (status = 400, description = "Bad request (missing header, or not exactly one of file/url)"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_course_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;

    let mut file: Option<Vec<u8>> = None;
    let mut url: Option<String> = None;
    let mut source_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some(data.to_vec());
            }
            Some("url") => {
                url = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read url: {}", e))
                })?);
            }
            Some("source_type") => {
                source_type = Some(field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read source_type: {}", e),
                    )
                })?);
            }
            _ => {}
        }
    }

    // Rejected before any course row is created.
    let source = resolve_source(file, url, source_type)
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let course = app_state
        .services
        .db
        .create_course(user_id, PLACEHOLDER_TITLE, source.kind(), source.url())
        .await
        .map_err(port_error_response)?;

    // Fire-and-forget: the job handle is the course id; progress is polled
    // through the persisted status field.
    tokio::spawn(process_course(
        app_state.services.clone(),
        course.id,
        source,
    ));

    let response = GenerateCourseResponse {
        id: course.id,
        status: course.status.as_str().to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the requesting user's courses, newest first.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "The user's courses", body = [CourseResponse]),
        (status = 400, description = "Missing or invalid x-user-id header")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_courses_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;

    let courses = app_state
        .services
        .db
        .list_courses_for_user(user_id)
        .await
        .map_err(port_error_response)?;

    let response: Vec<CourseResponse> = courses
        .into_iter()
        .map(CourseResponse::from_domain)
        .collect();
    Ok(Json(response))
}

/// Fetch one course with its chapters and their questions.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    responses(
        (status = 200, description = "The course detail", body = CourseDetailResponse),
        (status = 404, description = "Course not found")
    ),
    params(
        ("id" = Uuid, Path, description = "The course id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_course_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let db = &app_state.services.db;

    let course = db
        .get_course(course_id, user_id)
        .await
        .map_err(port_error_response)?;

    let mut chapters = Vec::new();
    for chapter in db
        .get_chapters_for_course(course_id)
        .await
        .map_err(port_error_response)?
    {
        let questions = db
            .get_questions_for_chapter(chapter.id)
            .await
            .map_err(port_error_response)?;
        chapters.push(ChapterResponse::from_domain(chapter, questions));
    }

    Ok(Json(CourseDetailResponse {
        course: CourseResponse::from_domain(course),
        chapters,
    }))
}

/// Delete a course along with its chapters and questions.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    responses(
        (status = 204, description = "Course deleted"),
        (status = 404, description = "Course not found")
    ),
    params(
        ("id" = Uuid, Path, description = "The course id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_course_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;

    app_state
        .services
        .db
        .delete_course(course_id, user_id)
        .await
        .map_err(port_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_file_resolves_to_the_document_variant() {
        let source = resolve_source(Some(vec![1, 2, 3]), None, None).unwrap();
        assert!(matches!(source, SourceInput::Document { .. }));
    }

    #[test]
    fn a_url_needs_a_valid_source_type() {
        let article = resolve_source(
            None,
            Some("https://example.com".to_string()),
            Some("article".to_string()),
        )
        .unwrap();
        assert!(matches!(article, SourceInput::Article { .. }));

        let video = resolve_source(
            None,
            Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            Some("video".to_string()),
        )
        .unwrap();
        assert!(matches!(video, SourceInput::Video { .. }));

        assert!(resolve_source(None, Some("https://example.com".to_string()), None).is_err());
        assert!(resolve_source(
            None,
            Some("https://example.com".to_string()),
            Some("podcast".to_string())
        )
        .is_err());
    }

    #[test]
    fn exactly_one_of_file_and_url_is_required() {
        assert!(resolve_source(None, None, None).is_err());
        assert!(resolve_source(
            Some(vec![1]),
            Some("https://example.com".to_string()),
            Some("article".to_string())
        )
        .is_err());
        assert!(resolve_source(Some(Vec::new()), None, None).is_err());
    }
}
