//! Posts, comments and the request bodies that create or change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::FieldErrors;

use super::{Author, User};

/// Maximum post title length accepted by the backend.
pub const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub comments_count: i64,
    // Only populated by GET posts/{id}/
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Post {
    /// Whether `user` wrote this post. Only used to show or hide edit
    /// controls; the server enforces ownership.
    pub fn is_authored_by(&self, user: &User) -> bool {
        self.author.id == user.id
    }

    pub fn was_edited(&self) -> bool {
        self.updated_at > self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_title(&self.title, &mut errors);
        check_content(&self.content, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Partial update; fields left as `None` are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.title.is_none() && self.content.is_none() {
            errors.add("non_field_errors", "Nothing to update.");
        }
        if let Some(ref title) = self.title {
            check_title(title, &mut errors);
        }
        if let Some(ref content) = self.content {
            check_content(content, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub content: String,
}

impl NewComment {
    /// Trims the content and rejects it if nothing is left.
    pub fn parse(content: &str) -> Result<Self, FieldErrors> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(FieldErrors::single("content", "Comment cannot be empty."));
        }
        Ok(Self {
            content: trimmed.to_string(),
        })
    }
}

fn check_title(title: &str, errors: &mut FieldErrors) {
    if title.trim().is_empty() {
        errors.add("title", "Title is required.");
    } else if title.chars().count() > TITLE_MAX_CHARS {
        errors.add(
            "title",
            &format!("Title must be at most {} characters.", TITLE_MAX_CHARS),
        );
    }
}

fn check_content(content: &str, errors: &mut FieldErrors) {
    if content.trim().is_empty() {
        errors.add("content", "Content is required.");
    }
}
