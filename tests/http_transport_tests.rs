mod common;

use std::time::Duration;

use aoai_connector::error::Error;
use aoai_connector::policy::RetryPolicy;
use aoai_connector::request::{ChatCompletionRequest, ChatMessage};
use aoai_connector::transport::{
  error_text_or_unknown, status_error, ChatTransport, HttpTransport
};
use aoai_connector::AzureOpenAIConnector;
use mockito::{Matcher, Server};
use serde_json::{json, Map};

const COMPLETIONS_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";

fn request(timeout: Duration) -> ChatCompletionRequest
{   let mut optional_params = Map::new();
    optional_params.insert("temperature".to_string(), json!(0.5));
    optional_params.insert("api_version".to_string(), json!("2024-02-01"));
    ChatCompletionRequest
    {   model: "gpt-4o".to_string()
      , messages: vec![
          ChatMessage::system("be terse")
        , ChatMessage::user("hello")
        ]
      , timeout
      , optional_params
    }
}

fn connector_for(server: &Server) -> AzureOpenAIConnector
{   common::init_logging();
    let mut args = common::endpoint(json!({
      "model": "gpt-4o",
      "timeout": 5,
      "allow_retries": false
    }));
    args.uri = server.url();
    AzureOpenAIConnector::new(&args).expect("connector builds")
}

#[tokio::test]
async fn test_success_posts_to_deployment_route()
{   let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", COMPLETIONS_PATH)
      .match_query(Matcher::UrlEncoded(
        "api-version".to_string(), "2024-02-01".to_string()
      ))
      .match_header("api-key", "test-key")
      .match_body(Matcher::PartialJson(json!({
        "model": "gpt-4o",
        "temperature": 0.5,
        "messages": [
          { "role": "system", "content": "be terse" },
          { "role": "user", "content": "hello" }
        ]
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(json!({
        "id": "chatcmpl-1",
        "choices": [{
          "index": 0,
          "finish_reason": "stop",
          "message": { "role": "assistant", "content": "hi there" }
        }]
      }).to_string())
      .create_async()
      .await;

    let transport = HttpTransport::new(server.url(), "test-key", "2024-02-01");
    let completion = transport
      .send(&request(Duration::from_secs(5)))
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(completion.choices.len(), 1);
    assert_eq!(
      completion.choices[0].message.content.as_deref()
    , Some("hi there")
    );
}

#[tokio::test]
async fn test_timeout_and_api_version_stay_out_of_the_body()
{   let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", COMPLETIONS_PATH)
      .match_query(Matcher::Any)
      .match_body(Matcher::Json(json!({
        "model": "gpt-4o",
        "temperature": 0.5,
        "messages": [
          { "role": "system", "content": "be terse" },
          { "role": "user", "content": "hello" }
        ]
      })))
      .with_status(200)
      .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
      .create_async()
      .await;

    let transport = HttpTransport::new(server.url(), "test-key", "2024-02-01");
    let request = request(Duration::from_secs(5));
    assert!(request.payload().contains_key("timeout"));

    transport.send(&request).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_content_filter_rejection_comes_back_as_text()
{   let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", COMPLETIONS_PATH)
      .match_query(Matcher::Any)
      .with_status(400)
      .with_header("content-type", "application/json")
      .with_body(json!({
        "error": {
          "message": "The response was filtered due to the prompt triggering content management policy.",
          "type": null,
          "param": "prompt",
          "code": "content_filter",
          "status": 400,
          "innererror": {
            "code": "ResponsibleAIPolicyViolation",
            "content_filter_result": {
              "hate": { "filtered": true, "severity": "high" }
            }
          }
        }
      }).to_string())
      .create_async()
      .await;

    let text = connector_for(&server).get_response("bad words").await.unwrap();

    mock.assert_async().await;
    assert_eq!(
      text
    , "The response was filtered due to the prompt triggering content management policy."
    );
}

#[tokio::test]
async fn test_other_bad_request_is_raised_with_body()
{   let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", COMPLETIONS_PATH)
      .match_query(Matcher::Any)
      .with_status(400)
      .with_body(json!({
        "error": {
          "message": "This model's maximum context length is 8192 tokens.",
          "code": "context_length_exceeded"
        }
      }).to_string())
      .create_async()
      .await;

    let err = connector_for(&server).get_response("long").await.unwrap_err();

    match err
    {   Error::BadRequest { message, body } => {
          assert_eq!(message, "This model's maximum context length is 8192 tokens.");
          assert_eq!(
            body.unwrap()["code"]
          , json!("context_length_exceeded")
          );
        }
      , other => panic!("expected BadRequest, got {:?}", other)
    }
}

#[tokio::test]
async fn test_server_error_is_retried_then_raised()
{   let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", COMPLETIONS_PATH)
      .match_query(Matcher::Any)
      .with_status(500)
      .with_body("upstream exploded")
      .expect(3)
      .create_async()
      .await;

    let connector = connector_for(&server)
      .with_retry_policy(RetryPolicy::new(2, 1.0, 0));
    let err = connector.get_response("hi").await.unwrap_err();

    mock.assert_async().await;
    assert_eq!(
      err
    , Error::ApiError { status: 500, message: "upstream exploded".to_string() }
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error()
{   let transport = HttpTransport::new("http://127.0.0.1:1", "k", "2024-02-01");
    let err = transport
      .send(&request(Duration::from_secs(5)))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::HttpError(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_status_error_mapping()
{   let unwrapped = status_error(
      400
    , r#"{"error":{"message":"nope","innererror":{"code":"X"}}}"#
    );
    assert_eq!(
      unwrapped
    , Error::BadRequest
      {   message: "nope".to_string()
        , body: Some(json!({ "message": "nope", "innererror": { "code": "X" } }))
      }
    );

    let bare = status_error(400, r#"{"message":"flat"}"#);
    assert_eq!(
      bare
    , Error::BadRequest
      {   message: "flat".to_string()
        , body: Some(json!({ "message": "flat" }))
      }
    );

    let not_json = status_error(400, "garbage");
    assert_eq!(
      not_json
    , Error::BadRequest { message: "garbage".to_string(), body: None }
    );

    assert_eq!(status_error(429, "{}"), Error::RateLimitExceeded);
    assert_eq!(
      status_error(401, r#"{"error":{"message":"bad key"}}"#)
    , Error::ApiError { status: 401, message: "bad key".to_string() }
    );
}

#[test]
fn test_unreadable_error_body_becomes_unknown_error()
{   assert_eq!(
      error_text_or_unknown::<&str>(Err("connection closed mid-body"))
    , "Unknown error"
    );
    assert_eq!(
      error_text_or_unknown::<&str>(Ok("quota exceeded".to_string()))
    , "quota exceeded"
    );
    assert_eq!(
      status_error(503, &error_text_or_unknown(Err("eof")))
    , Error::ApiError { status: 503, message: "Unknown error".to_string() }
    );
}

#[test]
fn test_deployment_name_is_one_path_segment()
{   let transport = HttpTransport::new(
      "https://res.openai.azure.com/", "k", "2024-02-01"
    );

    let url = transport.completions_url("team/gpt?4#x").unwrap();
    assert_eq!(
      url.as_str()
    , "https://res.openai.azure.com/openai/deployments/team%2Fgpt%3F4%23x/chat/completions"
    );
    assert_eq!(url.query(), None);

    let plain = transport.completions_url("gpt-4o").unwrap();
    assert_eq!(
      plain.as_str()
    , "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions"
    );
}

#[test]
fn test_unparseable_endpoint_is_configuration_error()
{   let transport = HttpTransport::new("not a url", "k", "2024-02-01");
    assert!(matches!(
      transport.completions_url("gpt-4o")
    , Err(Error::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn test_odd_deployment_name_reaches_its_own_route()
{   let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/openai/deployments/team%2Fgpt%3F4/chat/completions")
      .match_query(Matcher::UrlEncoded(
        "api-version".to_string(), "2024-02-01".to_string()
      ))
      .with_status(200)
      .with_body(r#"{"choices":[{"message":{"content":"routed"}}]}"#)
      .create_async()
      .await;

    let transport = HttpTransport::new(server.url(), "test-key", "2024-02-01");
    let mut odd = request(Duration::from_secs(5));
    odd.model = "team/gpt?4".to_string();
    let completion = transport.send(&odd).await.unwrap();

    mock.assert_async().await;
    assert_eq!(completion.choices[0].message.content.as_deref(), Some("routed"));
}
