#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use aoai_connector::error::Error;
use aoai_connector::request::{ChatCompletion, ChatCompletionRequest};
use aoai_connector::transport::ChatTransport;
use aoai_connector::EndpointArguments;
use serde_json::{json, Value};

pub fn init_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// Endpoint record with the given `params` object
pub fn endpoint(params: Value) -> EndpointArguments
{   EndpointArguments
    {   id: "azure-openai-test".to_string()
      , name: "Azure OpenAI test".to_string()
      , connector_type: "azure-openai-connector".to_string()
      , uri: "https://example.openai.azure.com".to_string()
      , token: "test-key".to_string()
      , max_calls_per_second: 1000
      , max_concurrency: 8
      , params: params.as_object().cloned().unwrap_or_default()
    }
}

pub fn completion(texts: &[&str]) -> ChatCompletion
{   let choices: Vec<Value> = texts
      .iter()
      .map(|t| json!({
        "index": 0,
        "finish_reason": "stop",
        "message": { "role": "assistant", "content": t }
      }))
      .collect();
    serde_json::from_value(json!({
      "id": "chatcmpl-1",
      "model": "gpt-4o",
      "choices": choices
    }))
    .expect("valid completion")
}

pub fn bad_request(body: Value) -> Error
{   Error::BadRequest
    {   message: body.get("message")
          .and_then(Value::as_str)
          .unwrap_or("bad request")
          .to_string()
      , body: Some(body)
    }
}

/// Replays scripted replies in order and records every request
#[derive(Clone, Default)]
pub struct ScriptedTransport
{   pub requests: Arc<Mutex<Vec<ChatCompletionRequest>>>
  , replies: Arc<Mutex<VecDeque<Result<ChatCompletion, Error>>>>
}

impl ScriptedTransport
{   pub fn new(
      replies: Vec<Result<ChatCompletion, Error>>
    ) -> Self
    {   ScriptedTransport
        {   requests: Arc::new(Mutex::new(vec![]))
          , replies: Arc::new(Mutex::new(replies.into()))
        }
    }

    pub fn sent(&self) -> Vec<ChatCompletionRequest>
    {   self.requests.lock().unwrap().clone()
    }
}

impl ChatTransport for ScriptedTransport
{   async fn send(
      &self
    , request: &ChatCompletionRequest
    ) -> Result<ChatCompletion, Error>
    {   self.requests.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap()
          .pop_front()
          .unwrap_or_else(|| Err(Error::Other("no scripted reply".into())))
    }
}
