//! API response types.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::catalog::IndustryTemplate;
use crate::error::{EngineError, QuoteError, Stage};

/// Catalog entry as listed by `GET /templates`.
#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub template_id: String,
    pub template_version: String,
    pub industry: String,
    pub subtype: Option<String>,
    pub use_case: String,
}

impl From<&IndustryTemplate> for TemplateSummary {
    fn from(t: &IndustryTemplate) -> Self {
        Self {
            template_id: t.template_id.clone(),
            template_version: t.template_version.clone(),
            industry: t.industry.clone(),
            subtype: t.subtype.clone(),
            use_case: t.use_case.clone(),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Pipeline stage, for quote failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Offending input field, for invalid input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            stage: None,
            field: None,
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps a quote failure to a status code.
///
/// Invalid input is the caller's to fix (422) and carries its message
/// verbatim. Unknown templates are 404. Anything else is an internal
/// failure whose detail stays in the server log.
pub fn quote_error(e: &QuoteError) -> ApiError {
    let (status, error, field) = match &e.source {
        EngineError::InvalidInput { field, message } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            message.clone(),
            Some(field.clone()),
        ),
        EngineError::UnknownIndustry(_) | EngineError::TemplateNotFound { .. } => {
            (StatusCode::NOT_FOUND, e.source.to_string(), None)
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "quote could not be computed".to_string(),
            None,
        ),
    };
    (
        status,
        Json(ErrorResponse {
            error,
            stage: Some(e.stage),
            field,
        }),
    )
}
