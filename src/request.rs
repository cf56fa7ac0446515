//! Chat-completion wire types

use std::time::Duration;
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ===== Message Types =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
}

impl Role
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   Role::System => "system"
          , Role::User => "user"
          , Role::Assistant => "assistant"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: Role
  , pub content: String
}

impl ChatMessage
{   pub fn system(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::User, content: content.into() }
    }
}

/// Turns for one call: the system turn (only when `system_prompt` is
/// non-empty) followed by exactly one user turn `pre + prompt + post`.
pub fn build_messages(
  system_prompt: &str
, pre_prompt: &str
, prompt: &str
, post_prompt: &str
) -> Vec<ChatMessage>
{   let user = ChatMessage::user(
      format!("{}{}{}", pre_prompt, prompt, post_prompt)
    );
    if system_prompt.is_empty()
    {   vec![user]
    } else
    {   vec![ChatMessage::system(system_prompt), user]
    }
}

// ===== Request =====

/// One chat-completion call, built fresh per prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub timeout: Duration
  , /// Operator passthrough; loses to the fields above on a key clash
    pub optional_params: Map<String, Value>
}

impl ChatCompletionRequest
{   /// The merged request object. Passthrough params go in first,
    /// then `model`, `messages` and `timeout` overwrite them.
    pub fn payload(&self) -> Map<String, Value>
    {   let mut payload = self.optional_params.clone();
        payload.insert(
          "model".to_string()
        , Value::String(self.model.clone())
        );
        payload.insert(
          "messages".to_string()
        , Value::Array(
            self.messages
              .iter()
              .map(|m| serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content
              }))
              .collect()
          )
        );
        payload.insert(
          "timeout".to_string()
        , serde_json::json!(self.timeout.as_secs_f64())
        );
        trace!("Merged payload keys: {:?}", payload.keys());
        payload
    }
}

// ===== Response Types =====

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion
{   #[serde(default)]
    pub id: Option<String>
  , #[serde(default)]
    pub model: Option<String>
  , pub choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: ResponseMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage
{   #[serde(default)]
    pub role: Option<String>
  , /// `null` when the output itself was filtered
    #[serde(default)]
    pub content: Option<String>
}

/// Text of the first choice.
///
/// An empty `choices` list is an error. A `null` content comes back
/// as an empty string.
pub fn first_choice_text(
  completion: &ChatCompletion
) -> Result<String, crate::error::Error>
{   let choice = completion.choices.first()
      .ok_or(crate::error::Error::NoChoicesInResponse)?;
    match &choice.message.content
    {   Some(text) => Ok(text.clone())
      , None => {
          warn!(
            "First choice has no content (finish_reason: {:?})",
            choice.finish_reason
          );
          Ok(String::new())
        }
    }
}
