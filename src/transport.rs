//! HTTP transport for chat-completion calls

use std::future::Future;
use log::{debug, error, trace};
use serde_json::Value;

use crate::request::{ChatCompletion, ChatCompletionRequest};

/// Sends one chat-completion request and returns the parsed reply.
pub trait ChatTransport: Send + Sync
{   fn send(
      &self
    , request: &ChatCompletionRequest
    ) -> impl Future<
        Output = Result<ChatCompletion, crate::error::Error>
      > + Send;
}

/// Azure OpenAI REST transport
pub struct HttpTransport
{   http_client: reqwest::Client
  , endpoint: String
  , api_key: String
  , api_version: String
}

impl HttpTransport
{   pub fn new(
      endpoint: impl Into<String>
    , api_key: impl Into<String>
    , api_version: impl Into<String>
    ) -> Self
    {   let endpoint: String = endpoint.into();
        let api_version: String = api_version.into();
        debug!(
          "Creating HttpTransport for {} (api-version {})",
          endpoint, api_version
        );
        HttpTransport
        {   http_client: reqwest::Client::new()
          , endpoint: endpoint.trim_end_matches('/').to_string()
          , api_key: api_key.into()
          , api_version
        }
    }

    pub fn api_version(&self) -> &str
    {   &self.api_version
    }

    /// Route for `model`, with the deployment name encoded as a
    /// single path segment
    pub fn completions_url(&self, model: &str)
      -> Result<reqwest::Url, crate::error::Error>
    {   let mut url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
          error!("Invalid endpoint {}: {}", self.endpoint, e);
          crate::error::Error::InvalidConfiguration(
            format!("endpoint {}: {}", self.endpoint, e)
          )
        })?;
        url.path_segments_mut()
          .map_err(|_| {
            error!("Endpoint {} cannot take a path", self.endpoint);
            crate::error::Error::InvalidConfiguration(
              format!("endpoint {} cannot take a path", self.endpoint)
            )
          })?
          .pop_if_empty()
          .extend(["openai", "deployments", model, "chat", "completions"]);
        Ok(url)
    }
}

impl ChatTransport for HttpTransport
{   async fn send(
      &self
    , request: &ChatCompletionRequest
    ) -> Result<ChatCompletion, crate::error::Error>
    {   let mut body = request.payload();
        // Client options, not body fields
        body.remove("timeout");
        body.remove("api_version");

        trace!("Chat completion body: {:?}", body);

        let url = self.completions_url(&request.model)?;
        let response = self.http_client
          .post(url)
          .query(&[("api-version", self.api_version.as_str())])
          .header("api-key", &self.api_key)
          .timeout(request.timeout)
          .json(&body)
          .send()
          .await
          .map_err(map_reqwest_error)?;

        let status = response.status();
        trace!("Chat completion response status: {}", status);

        if !status.is_success()
        {   let error_text = error_text_or_unknown(
              response.text().await
            );
            return Err(status_error(status.as_u16(), &error_text));
        }

        response.json::<ChatCompletion>().await.map_err(|e| {
          if e.is_timeout()
          {   error!("Timed out reading response body");
              return crate::error::Error::Timeout;
          }
          error!("Parse error: {}", e);
          crate::error::Error::ParseError(e.to_string())
        })
    }
}

/// Body of a failed reply, or `"Unknown error"` if it could not be read
pub fn error_text_or_unknown<E: std::fmt::Display>(
  body: Result<String, E>
) -> String
{   body.unwrap_or_else(|e| {
      error!("Failed to read error body: {}", e);
      "Unknown error".to_string()
    })
}

fn map_reqwest_error(e: reqwest::Error) -> crate::error::Error
{   if e.is_timeout()
    {   error!("Request timed out: {}", e);
        crate::error::Error::Timeout
    } else
    {   error!("HTTP error: {}", e);
        crate::error::Error::HttpError(e.to_string())
    }
}

/// Map a non-success reply onto the error taxonomy.
///
/// For a 400 the structured body is the `error` member of the reply
/// when present, else the reply itself.
pub fn status_error(status: u16, error_text: &str) -> crate::error::Error
{   let json: Option<Value> = serde_json::from_str(error_text).ok();
    let body = json.map(|mut v| {
      let inner = v.get_mut("error").map(Value::take);
      inner.unwrap_or(v)
    });

    let message = body.as_ref()
      .and_then(|b| b.get("message"))
      .and_then(Value::as_str)
      .map(str::to_string)
      .unwrap_or_else(|| error_text.to_string());

    match status
    {   400 => {
          debug!("Bad request: {}", message);
          crate::error::Error::BadRequest { message, body }
        }
      , 429 => {
          error!("Rate limited: {}", message);
          crate::error::Error::RateLimitExceeded
        }
      , _ => {
          error!("API error {}: {}", status, message);
          crate::error::Error::ApiError { status, message }
        }
    }
}
