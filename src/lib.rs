pub mod error;
pub mod config;
pub mod request;
pub mod transport;
pub mod policy;
pub mod providers;
pub mod client;

use std::future::Future;

pub use client::{ConnectorBackend, Prediction};
pub use config::{ConnectorSettings, EndpointArguments};
pub use error::Error;
pub use providers::AzureOpenAIConnector;

/*

async-only connector crate: takes a plain prompt, sends it to a hosted
chat-completion endpoint, hands back plain text.

aoai-connector/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Connector trait, backend channel types
│   ├── error.rs        # Error taxonomy and the typed 400 body
│   ├── config.rs       # Endpoint arguments, connector settings
│   ├── request.rs      # Turns, merged payload, response extraction
│   ├── transport.rs    # ChatTransport trait and the reqwest transport
│   ├── policy.rs       # Rate limiter and retry policy
│   ├── client.rs       # Timed predictions and the backend task
│   └── providers/
│       ├── mod.rs
│       └── azure_openai.rs
└── tests/

*/

// CONNECTOR INTERFACE:

/// Anything that turns a prompt into model text.
///
/// Calls must not mutate shared state, so a caller can run them
/// concurrently or retry them freely.
pub trait Connector: Send + Sync
{   fn get_response(
      &self
    , prompt: &str
    ) -> impl Future<Output = Result<String, crate::error::Error>> + Send;
}

/// Install an env_logger that honours `RUST_LOG`, `info` otherwise.
/// Safe to call more than once.
pub fn init_logger()
{   let _ = env_logger::Builder::from_env(
      env_logger::Env::default().default_filter_or("info")
    )
    .try_init();
}

// ===== SendPrompt =====

pub type SendPromptReply
  = Result<crate::client::Prediction, crate::error::Error>;
pub type SendPromptReplySender
  = tokio::sync::mpsc::UnboundedSender<SendPromptReply>;

pub struct SendPromptArgs
{   pub prompt: String
  , pub reply: SendPromptReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== ConnectorHand (sender side) =====

pub struct ConnectorHand
{   pub send_prompt_tx
      : tokio::sync::mpsc::UnboundedSender<SendPromptArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== ConnectorFoot (receiver side) =====

pub struct ConnectorFoot
{   pub send_prompt_rx
      : tokio::sync::mpsc::UnboundedReceiver<SendPromptArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}
