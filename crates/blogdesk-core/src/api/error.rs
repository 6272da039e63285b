use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::StoreError;

/// Field-keyed validation messages, e.g. `username -> ["already taken"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for a single-field error raised client-side.
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    Rejected(String),

    #[error("Not signed in or credential rejected")]
    Unauthenticated,

    #[error("Session expired - please sign in again")]
    SessionExpired,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Session storage error: {0}")]
    Store(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Keys the backend uses for errors that are not tied to a form field.
const GENERAL_ERROR_KEYS: [&str; 3] = ["error", "detail", "non_field_errors"];

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 => Self::from_bad_request(body),
            401 => ApiError::Unauthenticated,
            403 => ApiError::Forbidden(Self::message_or_body(body)),
            404 => ApiError::NotFound(Self::message_or_body(body)),
            500..=599 => ApiError::Server(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, Self::truncate_body(body))),
        }
    }

    /// Map a non-2xx response from an endpoint that takes no credential
    /// (login, register, token refresh). A 401 there means the submitted
    /// username/password or refresh token was wrong, not that a session is
    /// missing.
    pub fn from_public_status(status: u16, body: &str) -> Self {
        if status == 401 {
            let message = Self::general_message(body)
                .unwrap_or_else(|| "Invalid credentials".to_string());
            ApiError::Rejected(message)
        } else {
            Self::from_status(status, body)
        }
    }

    /// 400 bodies are either `{"field": ["msg", ..], ..}` or a general
    /// `{"error": "msg"}` / `{"detail": "msg"}`.
    fn from_bad_request(body: &str) -> Self {
        if let Some(message) = Self::general_message(body) {
            return ApiError::Rejected(message);
        }

        let fields = Self::parse_field_errors(body);
        if fields.is_empty() {
            ApiError::Rejected(if body.trim().is_empty() {
                "Bad request".to_string()
            } else {
                Self::truncate_body(body)
            })
        } else {
            ApiError::Validation(fields)
        }
    }

    fn message_or_body(body: &str) -> String {
        Self::general_message(body).unwrap_or_else(|| Self::truncate_body(body))
    }

    fn general_message(body: &str) -> Option<String> {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return None;
        };
        GENERAL_ERROR_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|value| {
                let messages = Self::messages(value);
                (!messages.is_empty()).then(|| messages.join(" "))
            })
    }

    fn parse_field_errors(body: &str) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            for (field, value) in &map {
                for message in Self::messages(value) {
                    errors.add(field, &message);
                }
            }
        }
        errors
    }

    fn messages(value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().flat_map(Self::messages).collect(),
            Value::Null => Vec::new(),
            other => vec![other.to_string()],
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Errors after which the caller should send the user to the login entry point.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthenticated | ApiError::SessionExpired)
    }

    /// Errors the user can reasonably retry by hand (shown as a dismissible banner).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Timeout | ApiError::Server(_)
        )
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}
