use std::fmt;
use serde_json::Value;

/// Marker the content filter puts in `innererror.code`
pub const POLICY_VIOLATION_CODE: &str = "ResponsibleAIPolicyViolation";

/// Custom error type for connector operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq)]
pub enum Error
{   /// HTTP 400 from the endpoint, raw JSON body kept when there was one
    BadRequest
    {   message: String
      , body: Option<Value>
    }
  , /// API returned some other non-success status
    ApiError
    {   status: u16
      , message: String
    }
  , /// Rate limit exceeded (HTTP 429)
    RateLimitExceeded
  , /// HTTP transport error
    HttpError(String)
  , /// Timeout error
    Timeout
  , /// Failed to parse API response
    ParseError(String)
  , /// No choices in API response
    NoChoicesInResponse
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Generic error
    Other(String)
}

impl Error
{   /// Whether resending the same request could succeed
    pub fn is_retryable(&self) -> bool
    {   match self
        {   Error::HttpError(_)
          | Error::Timeout
          | Error::RateLimitExceeded => true
          , Error::ApiError { status, .. } => *status >= 500
          , _ => false
        }
    }

    /// Typed view of a bad-request body, if this is one and it has
    /// the expected object shape
    pub fn error_body(&self) -> Option<ErrorBody>
    {   match self
        {   Error::BadRequest { body: Some(body), .. } => {
              ErrorBody::parse(body)
            }
          , _ => None
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::BadRequest { message, .. } => {
              write!(f, "Bad request: {}", message)
            }
          , Error::ApiError { status, message } => {
              write!(f, "API error ({}): {}", status, message)
            }
          , Error::RateLimitExceeded => {
              write!(f, "API rate limit exceeded")
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no choices")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

// ===== Error Body =====

/// The parts of a bad-request body the content-filter check reads.
/// Every level is optional; a missing or non-string field is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody
{   pub message: Option<String>
  , pub innererror: Option<InnerError>
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InnerError
{   pub code: Option<String>
}

impl ErrorBody
{   /// Read a raw body field by field. Only a body that is not an
    /// object yields `None`; unrelated fields never get in the way.
    pub fn parse(value: &Value) -> Option<ErrorBody>
    {   let object = value.as_object()?;
        let innererror = object.get("innererror")
          .and_then(Value::as_object)
          .map(|inner| InnerError
          {   code: string_field(inner, "code")
          });
        Some(ErrorBody
        {   message: string_field(object, "message")
          , innererror
        })
    }

    /// The outer `message` when the content filter rejected the prompt.
    ///
    /// All three must hold: an `innererror` is present, its `code`
    /// contains [`POLICY_VIOLATION_CODE`], and the outer body carries
    /// a `message`.
    pub fn policy_violation_message(&self) -> Option<&str>
    {   let inner_code = self.innererror.as_ref()?
          .code.as_deref()?;
        if !inner_code.contains(POLICY_VIOLATION_CODE)
        {   return None;
        }
        self.message.as_deref()
    }
}

fn string_field(
  object: &serde_json::Map<String, Value>
, key: &str
) -> Option<String>
{   object.get(key)
      .and_then(Value::as_str)
      .map(str::to_string)
}
