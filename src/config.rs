//! Endpoint arguments and the connector settings derived from them

use std::path::Path;
use std::time::Duration;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_NUM_OF_RETRIES: usize = 3;

/// Params consumed by the connector itself; never forwarded.
const RESERVED_PARAMS: [&str; 6] = [
  "pre_prompt"
, "post_prompt"
, "system_prompt"
, "timeout"
, "allow_retries"
, "num_of_retries"
];

/// One endpoint record, as stored by the surrounding framework
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointArguments
{   /// Endpoint identifier
    pub id: String
  , /// Human-readable name
    #[serde(default)]
    pub name: String
  , /// Which connector handles this endpoint
    #[serde(default)]
    pub connector_type: String
  , /// Service URL
    pub uri: String
  , /// API key
    #[serde(default)]
    pub token: String
  , #[serde(default = "default_one")]
    pub max_calls_per_second: u32
  , #[serde(default = "default_one")]
    pub max_concurrency: u32
  , /// Connector and passthrough parameters
    #[serde(default)]
    pub params: Map<String, Value>
}

fn default_one() -> u32
{   1
}

impl EndpointArguments
{   /// Parse and validate a JSON record
    pub fn from_json(json: &str)
      -> Result<Self, crate::error::Error>
    {   let args: EndpointArguments
          = serde_json::from_str(json).map_err(|e| {
            error!("Endpoint arguments parse error: {}", e);
            crate::error::Error::InvalidConfiguration(e.to_string())
          })?;
        args.validate()?;
        Ok(args)
    }

    /// Load a JSON record from disk
    pub fn from_file(path: impl AsRef<Path>)
      -> Result<Self, crate::error::Error>
    {   let path = path.as_ref();
        debug!("Loading endpoint arguments from {}", path.display());
        let json = std::fs::read_to_string(path).map_err(|e| {
          error!("Cannot read {}: {}", path.display(), e);
          crate::error::Error::InvalidConfiguration(
            format!("{}: {}", path.display(), e)
          )
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if self.max_calls_per_second == 0
        {   return Err(crate::error::Error::InvalidConfiguration(
              format!("{}: max_calls_per_second must be > 0", self.id)
            ));
        }
        if self.max_concurrency == 0
        {   return Err(crate::error::Error::InvalidConfiguration(
              format!("{}: max_concurrency must be > 0", self.id)
            ));
        }
        Ok(())
    }
}

/// Connector-level settings split out of `params`
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorSettings
{   pub pre_prompt: String
  , pub post_prompt: String
  , pub system_prompt: String
  , pub timeout: Duration
  , pub allow_retries: bool
  , pub num_of_retries: usize
  , /// Everything not reserved above, forwarded with each request
    pub optional_params: Map<String, Value>
}

impl Default for ConnectorSettings
{   fn default() -> Self
    {   ConnectorSettings
        {   pre_prompt: String::new()
          , post_prompt: String::new()
          , system_prompt: String::new()
          , timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS)
          , allow_retries: true
          , num_of_retries: DEFAULT_NUM_OF_RETRIES
          , optional_params: Map::new()
        }
    }
}

impl ConnectorSettings
{   pub fn from_params(params: &Map<String, Value>)
      -> Result<Self, crate::error::Error>
    {   let defaults = ConnectorSettings::default();

        let timeout = match params.get("timeout")
        {   None | Some(Value::Null) => defaults.timeout
          , Some(v) => {
              v.as_f64()
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .ok_or_else(|| invalid("timeout", "a non-negative number"))?
            }
        };

        let num_of_retries = match params.get("num_of_retries")
        {   None | Some(Value::Null) => defaults.num_of_retries
          , Some(v) => v.as_u64()
              .ok_or_else(|| {
                invalid("num_of_retries", "a non-negative integer")
              })? as usize
        };

        let allow_retries = match params.get("allow_retries")
        {   None | Some(Value::Null) => defaults.allow_retries
          , Some(v) => v.as_bool()
              .ok_or_else(|| invalid("allow_retries", "a boolean"))?
        };

        let optional_params: Map<String, Value> = params
          .iter()
          .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect();

        debug!(
          "Connector settings: {} passthrough params",
          optional_params.len()
        );

        Ok(ConnectorSettings
        {   pre_prompt: string_param(params, "pre_prompt")?
          , post_prompt: string_param(params, "post_prompt")?
          , system_prompt: string_param(params, "system_prompt")?
          , timeout
          , allow_retries
          , num_of_retries
          , optional_params
        })
    }
}

fn string_param(params: &Map<String, Value>, key: &str)
  -> Result<String, crate::error::Error>
{   match params.get(key)
    {   None | Some(Value::Null) => Ok(String::new())
      , Some(Value::String(s)) => Ok(s.clone())
      , Some(_) => Err(invalid(key, "a string"))
    }
}

fn invalid(key: &str, expected: &str) -> crate::error::Error
{   error!("Param {} is not {}", key, expected);
    crate::error::Error::InvalidConfiguration(
      format!("param {} must be {}", key, expected)
    )
}
