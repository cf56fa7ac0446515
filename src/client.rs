use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use log::{debug, error, info};
use crate::ConnectorFoot;

/// One timed connector call
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction
{   pub prompt: String
  , pub response: String
  , /// Wall time of the whole call, waits and retries included
    pub duration: Duration
}

/// Run `prompt` through `connector` and time it
pub async fn get_prediction<C: crate::Connector>(
  connector: &C
, prompt: String
) -> Result<Prediction, crate::error::Error>
{   let started = Instant::now();
    let response = connector.get_response(&prompt).await?;
    let duration = started.elapsed();
    debug!("Prediction took {:?}", duration);
    Ok(Prediction
    {   prompt
      , response
      , duration
    })
}

/// Public API for a connector backend - owns the task
pub struct ConnectorBackend
{   hand: crate::ConnectorHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl ConnectorBackend
{   /// Spawn a backend serving `connector`
    /// Returns immediately - spawns background task
    pub fn new<C>(connector: C) -> Self
    where
      C: crate::Connector + 'static
    {   debug!("Creating ConnectorBackend with task ownership");

        let (send_prompt_tx, send_prompt_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::ConnectorHand
        {   send_prompt_tx
          , kill_process_tx
        };

        let foot = crate::ConnectorFoot
        {   send_prompt_rx
          , kill_process_rx
        };

        let connector = Arc::new(connector);
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, connector).await
        });

        ConnectorBackend
        {   hand
          , _task_handle
        }
    }

    /// Send a prompt - returns almost immediately
    pub async fn send_prompt(
      &self
    , prompt: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::SendPromptReply>,
        crate::error::Error
      >
    {   let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::SendPromptArgs
        {   prompt
          , reply: reply_tx
        };

        self.hand.send_prompt_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::Other(
              "Backend disconnected".to_string()
            )
          })?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down ConnectorBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend shutdown timeout");
            Err(crate::error::Error::Timeout)
        }
    }
}

/// Main backend event loop
///
/// Each prompt is handed to its own task; the connector's rate
/// limiter is what bounds how many run at once.
async fn run_backend_loop<C>(
  foot: ConnectorFoot
, connector: Arc<C>
)
where
  C: crate::Connector + 'static
{   debug!("Starting ConnectorBackend event loop");
    let ConnectorFoot
    {   mut send_prompt_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = send_prompt_rx.recv() => {
          debug!("Received SendPrompt");
          let connector = Arc::clone(&connector);
          tokio::spawn(async move {
            let result = get_prediction(
              connector.as_ref(), cmd.prompt
            ).await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("ConnectorBackend shutting down");
          break;
        }
      , else => {
          debug!("Command channels closed");
          break;
        }
      }
    }
}
