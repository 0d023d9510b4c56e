//! Editable site content (FAQ, terms, privacy, cookies) and contact messages.

use serde::{Deserialize, Serialize};

/// Content kinds an admin may edit as plain text.
pub const TEXT_CONTENT_KINDS: [&str; 3] = ["terms", "privacy", "cookies"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTextContentRequest {
    pub content: String,
}
