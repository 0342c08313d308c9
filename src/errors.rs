use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sea_orm::DbErr;
use thiserror::Error;
use serde::Serialize;

use crate::database::types::DocumentType;

/// Унифицированная структура ответа об ошибке
#[derive(Serialize)]
pub struct ErrorResponse<'a> {
    pub code: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DbError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ошибка конфигурации шаблона номера, повторять бессмысленно.
    #[error("Invalid number format template: {0}")]
    InvalidFormatTemplate(String),

    /// Бюджет перебора кандидатов исчерпан, создание нужно повторить в новой транзакции.
    #[error(
        "Sequence exhausted for {document_type} of tenant {tenant_id} after {attempts} attempts"
    )]
    SequenceExhausted {
        document_type: DocumentType,
        tenant_id: i64,
        attempts: u32,
    },

    #[error("Document number already taken: {0}")]
    NumberTaken(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidFormatTemplate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SequenceExhausted { .. } | AppError::NumberTaken(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.code();
        let message = self.to_string();
        let details = self
            .is_retryable()
            .then(|| "Retry the request; the number was claimed concurrently".to_string());
        let body = ErrorResponse { code, message, details, trace_id: None };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DbError(_) => "DB_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::InvalidFormatTemplate(_) => "INVALID_FORMAT_TEMPLATE",
            AppError::SequenceExhausted { .. } => "SEQUENCE_EXHAUSTED",
            AppError::NumberTaken(_) => "NUMBER_TAKEN",
        }
    }

    /// Транзиентные ошибки гонки: вызывающий повторяет создание целиком.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::SequenceExhausted { .. } | AppError::NumberTaken(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_errors_are_retryable_conflicts() {
        let err = AppError::SequenceExhausted {
            document_type: DocumentType::Invoice,
            tenant_id: 7,
            attempts: 5,
        };
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "SEQUENCE_EXHAUSTED");

        let err = AppError::NumberTaken("INV-000001".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn template_errors_are_permanent() {
        let err = AppError::InvalidFormatTemplate("unknown placeholder".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
