//! Chat-completion request construction
//!
//! The request is built once per annotation and reused unchanged for every
//! retry attempt.

use pmlb_common::ImagePayload;
use serde::Serialize;

use super::prompts::{SYSTEM_PROMPT, USER_PROMPT};

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 2000;

/// Body posted to the chat-completion endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System { content: String },
    User { content: Vec<ContentPart> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Builds annotation requests for one model
#[derive(Debug, Clone)]
pub struct AnnotationRequestBuilder {
    model: String,
}

impl AnnotationRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// System instructions, then the JSON-structure instructions and the image
    /// (high detail) in the user message. Low temperature, JSON-object output.
    pub fn build(&self, image: &ImagePayload) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::System {
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.to_data_url(),
                                detail: "high",
                            },
                        },
                    ],
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}
