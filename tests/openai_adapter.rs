use httpmock::prelude::*;
use pipeline_engine::backend::openai::OPENAI_API_KEY_VAR;
use pipeline_engine::{ChatMessage, ChatProvider, ExecCtx, NodeRunError, OpenAiProvider};
use serde_json::{json, Map};

fn ctx() -> ExecCtx {
    ExecCtx::builder()
        .credential(OPENAI_API_KEY_VAR, "sk-test")
        .build()
        .expect("ctx")
}

#[tokio::test]
async fn openai_sends_messages_verbatim_and_maps_usage() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .json_body(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You translate."},
                    {"role": "user", "content": "Hello"}
                ],
                "temperature": 0.2
            }));
        then.status(200).json_body(json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Bonjour"}},
                {"index": 1, "message": {"role": "assistant", "content": "Salut"}}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }));
    });

    let provider = OpenAiProvider::new().with_base_url(server.url(""));
    let mut messages = vec![ChatMessage::system("You translate."), ChatMessage::user("Hello")];
    let params = json!({"temperature": 0.2}).as_object().cloned().unwrap_or_default();

    let completion = provider
        .chat_completion(&ctx(), &mut messages, "gpt-4o-mini", "You translate.", &params)
        .await
        .expect("completion");

    mock.assert();
    assert_eq!(completion.choices.len(), 1);
    assert_eq!(completion.first_text().unwrap(), "Bonjour");
    assert_eq!(completion.usage.prompt_tokens, 12);
    assert_eq!(completion.usage.completion_tokens, 3);
    assert_eq!(completion.usage.total_tokens, 15);
    assert!(completion.usage.approximate_cost.is_none());
}

#[tokio::test]
async fn openai_error_embeds_provider_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401).json_body(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        }));
    });

    let provider = OpenAiProvider::new().with_base_url(server.url(""));
    let mut messages = vec![ChatMessage::user("hi")];
    let err = provider
        .chat_completion(&ctx(), &mut messages, "gpt-4o", "", &Map::new())
        .await
        .unwrap_err();

    match err {
        NodeRunError::Provider {
            provider,
            status,
            ref message,
        } => {
            assert_eq!(provider, "openai");
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn openai_missing_key_sends_nothing() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200);
    });

    let provider = OpenAiProvider::new().with_base_url(server.url(""));
    let ctx = ExecCtx::builder().build().expect("ctx");
    let err = provider
        .chat_completion(&ctx, &mut [ChatMessage::user("hi")], "gpt-4o", "", &Map::new())
        .await
        .unwrap_err();

    assert!(matches!(err, NodeRunError::MissingCredential(ref k) if k == OPENAI_API_KEY_VAR));
    mock.assert_hits(0);
}
