use log::{debug, info, warn};
use serde_json::Value;

use crate::config::{ConnectorSettings, EndpointArguments};
use crate::policy::{RateLimiter, RetryPolicy};
use crate::request::{
  build_messages, first_choice_text, ChatCompletion, ChatCompletionRequest
};
use crate::transport::{ChatTransport, HttpTransport};

/// Used when the endpoint params carry no `api_version`
pub const DEFAULT_API_VERSION: &str = "2024-02-01";

/// Azure OpenAI chat-completion connector.
///
/// The transport, the settings and the policies are all read-only
/// after construction, so one instance can serve concurrent calls.
pub struct AzureOpenAIConnector<T = HttpTransport>
{   transport: T
  , settings: ConnectorSettings
  , model: String
  , api_version: String
  , rate_limiter: RateLimiter
  , retry_policy: RetryPolicy
}

impl AzureOpenAIConnector<HttpTransport>
{   /// Connector talking to `args.uri` with `args.token`
    pub fn new(args: &EndpointArguments)
      -> Result<Self, crate::error::Error>
    {   let api_version = resolve_api_version(&args.params);
        let transport = HttpTransport::new(
          args.uri.clone()
        , args.token.clone()
        , api_version
        );
        Self::with_transport(args, transport)
    }
}

impl<T: ChatTransport> AzureOpenAIConnector<T>
{   /// Connector sending through `transport`
    pub fn with_transport(args: &EndpointArguments, transport: T)
      -> Result<Self, crate::error::Error>
    {   args.validate()?;
        let settings = ConnectorSettings::from_params(&args.params)?;
        let api_version = resolve_api_version(&settings.optional_params);

        let model = settings.optional_params.get("model")
          .and_then(Value::as_str)
          .unwrap_or_default()
          .to_string();
        if model.is_empty()
        {   warn!("Endpoint {} has no model configured", args.id);
        }

        let retry_policy = if settings.allow_retries
        {   RetryPolicy
            {   max_retries: settings.num_of_retries
              , ..RetryPolicy::default()
            }
        } else
        {   RetryPolicy::disabled()
        };

        info!(
          "Azure OpenAI connector {} ready (model: {}, api-version: {})",
          args.id, model, api_version
        );

        Ok(AzureOpenAIConnector
        {   transport
          , rate_limiter: RateLimiter::new(
              args.max_calls_per_second
            , args.max_concurrency
            )
          , retry_policy
          , settings
          , model
          , api_version
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self
    {   self.retry_policy = retry_policy;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self
    {   self.rate_limiter = rate_limiter;
        self
    }

    pub fn model(&self) -> &str
    {   &self.model
    }

    pub fn api_version(&self) -> &str
    {   &self.api_version
    }

    pub fn settings(&self) -> &ConnectorSettings
    {   &self.settings
    }

    pub fn retry_policy(&self) -> &RetryPolicy
    {   &self.retry_policy
    }

    pub fn rate_limiter(&self) -> &RateLimiter
    {   &self.rate_limiter
    }

    /// The request `get_response` sends for `prompt`
    pub fn build_request(&self, prompt: &str) -> ChatCompletionRequest
    {   ChatCompletionRequest
        {   model: self.model.clone()
          , messages: build_messages(
              &self.settings.system_prompt
            , &self.settings.pre_prompt
            , prompt
            , &self.settings.post_prompt
            )
          , timeout: self.settings.timeout
          , optional_params: self.settings.optional_params.clone()
        }
    }

    /// Send `prompt` and return the model's text.
    ///
    /// Runs under the rate limiter, with the retry policy inside it.
    pub async fn get_response(&self, prompt: &str)
      -> Result<String, crate::error::Error>
    {   self.rate_limiter
          .run(|| self.retry_policy.run(|| self.send_once(prompt)))
          .await
    }

    async fn send_once(&self, prompt: &str)
      -> Result<String, crate::error::Error>
    {   let request = self.build_request(prompt);
        debug!(
          "Sending {} turn(s) to model {}",
          request.messages.len(), request.model
        );

        match self.transport.send(&request).await
        {   Ok(completion) => self.process_response(&completion)
          , Err(e) => match absorb_policy_violation(&e)
            {   Some(message) => {
                  info!("Content filter rejected prompt: {}", message);
                  Ok(message)
                }
              , None => Err(e)
            }
        }
    }

    /// Text of the first completion choice
    pub fn process_response(&self, completion: &ChatCompletion)
      -> Result<String, crate::error::Error>
    {   first_choice_text(completion)
    }
}

impl<T: ChatTransport> crate::Connector for AzureOpenAIConnector<T>
{   async fn get_response(&self, prompt: &str)
      -> Result<String, crate::error::Error>
    {   AzureOpenAIConnector::get_response(self, prompt).await
    }
}

/// The content filter reports a rejected prompt as a 400. Turn that
/// one shape back into text; anything else stays an error.
pub fn absorb_policy_violation(error: &crate::error::Error)
  -> Option<String>
{   let body = error.error_body()?;
    body.policy_violation_message().map(str::to_string)
}

fn resolve_api_version(params: &serde_json::Map<String, Value>) -> String
{   params.get("api_version")
      .and_then(Value::as_str)
      .unwrap_or(DEFAULT_API_VERSION)
      .to_string()
}
