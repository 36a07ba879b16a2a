// Request construction and validation.

use serde_json::Value;
use thiserror::Error;

use crate::normalize::normalize;
use crate::types::{PageSpec, WikiRequest};

/// Maximum length, in characters, of a document name or page title.
pub const MAX_TITLE_CHARS: usize = 500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request must be a JSON object")]
    NotAnObject,
    #[error("invalid request: {0}")]
    Malformed(String),
    #[error("`pages` must contain at least one page")]
    NoPages,
    #[error("`{field}` must be between 1 and {max} characters (got {len})")]
    Length { field: String, len: usize, max: usize },
}

impl WikiRequest {
    /// Normalize, deserialize and validate a raw JSON request.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        if !value.is_object() {
            return Err(RequestError::NotAnObject);
        }
        let request: WikiRequest = serde_json::from_value(normalize(value))
            .map_err(|e| RequestError::Malformed(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        check_length("doc_name", &self.doc_name)?;
        if self.pages.is_empty() {
            return Err(RequestError::NoPages);
        }
        validate_pages(&self.pages, "pages")
    }
}

fn validate_pages(pages: &[PageSpec], path: &str) -> Result<(), RequestError> {
    for (index, page) in pages.iter().enumerate() {
        let node = format!("{path}[{index}]");
        check_length(&format!("{node}.title"), &page.title)?;
        validate_pages(&page.children, &format!("{node}.children"))?;
    }
    Ok(())
}

fn check_length(field: &str, value: &str) -> Result<(), RequestError> {
    let len = value.chars().count();
    if (1..=MAX_TITLE_CHARS).contains(&len) {
        Ok(())
    } else {
        Err(RequestError::Length { field: field.to_string(), len, max: MAX_TITLE_CHARS })
    }
}
