use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::ApiResponse;

/// Status plus enveloped body, the return shape of every JSON handler.
pub type Enveloped<T> = (StatusCode, Json<ApiResponse<T>>);

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Enveloped<T> {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Enveloped<T> {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Standard no content response
pub fn no_content_response() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Flattens validator output into `field: message` lines.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            let field = field.to_string();
            errors.iter().map(move |error| {
                format!(
                    "{}: {}",
                    field,
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", error.code))
                )
            })
        })
        .collect();
    messages.sort();
    messages
}

/// Validate request input, producing a 400 envelope on failure
pub fn validate_input<T: Validate, R>(input: &T) -> Result<(), Enveloped<R>> {
    input.validate().map_err(|errors| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::validation_errors(validation_messages(&errors))),
        )
    })
}

/// Optional `q` search term
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

impl SearchParams {
    /// The trimmed term, or `None` when blank.
    pub fn term(self) -> Option<String> {
        self.q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    #[test]
    fn validation_failure_is_a_bad_request_envelope() {
        let (status, Json(body)) =
            validate_input::<_, ()>(&Named { name: String::new() }).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert_eq!(body.errors, Some(vec!["name: name is required".to_string()]));
    }

    #[test]
    fn valid_input_passes() {
        assert!(validate_input::<_, ()>(&Named { name: "Sakura".into() }).is_ok());
    }

    #[test]
    fn blank_search_term_is_none() {
        assert_eq!(SearchParams { q: Some("  ".into()) }.term(), None);
        assert_eq!(
            SearchParams { q: Some(" pasta ".into()) }.term().as_deref(),
            Some("pasta")
        );
        assert_eq!(SearchParams::default().term(), None);
    }
}
