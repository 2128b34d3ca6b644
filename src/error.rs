use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint rejected the write. Carries the offending field name.
    #[error("conflict on {0}")]
    Conflict(String),

    /// A foreign key pointed at a row that does not exist. Carries the field name.
    #[error("missing reference in {0}")]
    MissingReference(String),
}

/// ValidationErrors
///
/// Field name to messages, collected while validating a submitted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// `Ok(())` when nothing was collected, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// ErrorBody
///
/// JSON body for every non-redirect error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// AppError
///
/// The error type of every handler. Missing and hidden content share `NotFound` so that
/// unauthorized viewers cannot tell them apart.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    /// The request needs an authenticated viewer. `redirect_to` is the login URL with the
    /// original path as its `next` parameter.
    #[error("login required")]
    LoginRequired { redirect_to: String },

    /// An authenticated non-owner tried to mutate content; nothing was changed.
    #[error("not the owner")]
    NotOwner { redirect_to: String },

    #[error("forbidden")]
    Forbidden,

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl AppError {
    /// Redirect target for a post the viewer is not allowed to change.
    pub fn not_owner_of_post(post_id: i64) -> Self {
        AppError::NotOwner {
            redirect_to: post_path(post_id),
        }
    }
}

pub fn post_path(post_id: i64) -> String {
    format!("/posts/{}", post_id)
}

fn error_body(status: StatusCode, error: &str) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
        fields: None,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => error_body(StatusCode::NOT_FOUND, "not_found"),
            AppError::LoginRequired { redirect_to } | AppError::NotOwner { redirect_to } => {
                Redirect::to(&redirect_to).into_response()
            }
            AppError::Forbidden => error_body(StatusCode::FORBIDDEN, "forbidden"),
            AppError::Validation(errors) => {
                let body = ErrorBody {
                    error: "validation_failed".to_string(),
                    fields: Some(errors.fields),
                };
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            AppError::Repository(e) => {
                tracing::error!("repository error: {:?}", e);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            AppError::Storage(e) => {
                tracing::error!("storage error: {}", e);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}
