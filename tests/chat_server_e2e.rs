//! The chat backend end to end: health, chat (JSON and streamed), quotes

mod test_helpers;

use anyhow::Result;
use http::StatusCode;
use serde_json::{Value, json};
use sunny_chat_client::{ChatClient, ChatClientError};
use sunny_server::SYSTEM_PROMPT;
use sunny_session_storage::ChatTurn;
use test_helpers::{ScriptedProvider, browser, spawn_chat_app};

#[tokio::test]
async fn test_health() -> Result<()> {
    let addr = spawn_chat_app(ScriptedProvider::replying(&["unused"])).await?;

    let response = browser()?
        .get(format!("http://{}/health", addr))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await?, json!({"status": "ok"}));
    Ok(())
}

#[tokio::test]
async fn test_conversation_keeps_history() -> Result<()> {
    let provider = ScriptedProvider::replying(&["Sun", "ny"]);
    let addr = spawn_chat_app(provider.clone()).await?;
    let client = ChatClient::new(&format!("http://{}/api/chat", addr))?;

    assert_eq!(client.send("hello").await?, "Sunny");
    assert_eq!(client.stream("  again  ", |_| {}).await?, "Sunny");

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(
        prompts[0],
        vec![ChatTurn::system(SYSTEM_PROMPT), ChatTurn::user("hello")]
    );
    assert_eq!(
        prompts[1],
        vec![
            ChatTurn::system(SYSTEM_PROMPT),
            ChatTurn::user("hello"),
            ChatTurn::assistant("Sunny"),
            ChatTurn::user("again"),
        ]
    );

    // A second client has its own session and history
    let other = ChatClient::new(&format!("http://{}/api/chat", addr))?;
    other.send("first").await?;
    assert_eq!(provider.prompts()[2].len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_streamed_tokens() -> Result<()> {
    let addr = spawn_chat_app(ScriptedProvider::replying(&["Hel", "lo"])).await?;
    let client = ChatClient::new(&format!("http://{}/api/chat", addr))?;

    let mut tokens = Vec::new();
    let reply = client
        .stream("hi", |token| tokens.push(token.to_string()))
        .await?;

    assert_eq!(reply, "Hello");
    assert_eq!(tokens, vec!["Hel", "lo"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_message_is_rejected() -> Result<()> {
    let addr = spawn_chat_app(ScriptedProvider::replying(&["unused"])).await?;
    let client = ChatClient::new(&format!("http://{}/api/chat", addr))?;

    match client.send("   ").await {
        Err(ChatClientError::Status { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "A non-empty message field is required.");
        }
        other => panic!("expected a 400, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure() -> Result<()> {
    let provider = ScriptedProvider::failing_after(&["par"], "model unavailable");
    let addr = spawn_chat_app(provider).await?;
    let client = ChatClient::new(&format!("http://{}/api/chat", addr))?;

    match client.send("hi").await {
        Err(ChatClientError::Status { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "Failed to generate response.");
        }
        other => panic!("expected a 502, got {:?}", other),
    }

    let mut tokens = Vec::new();
    match client.stream("hi", |t| tokens.push(t.to_string())).await {
        Err(ChatClientError::Server(message)) => {
            assert_eq!(message, "Failed to stream response.");
        }
        other => panic!("expected an error frame, got {:?}", other),
    }
    assert_eq!(tokens, vec!["par"]);
    Ok(())
}

#[tokio::test]
async fn test_quotes() -> Result<()> {
    let addr = spawn_chat_app(ScriptedProvider::replying(&["unused"])).await?;
    let client = browser()?;
    let url = format!("http://{}/api/quote", addr);

    let priced: Value = client
        .post(&url)
        .json(&json!({"panelCount": 4}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(priced["ok"], true);
    assert_eq!(priced["priceText"], "$99.00");
    assert_eq!(priced["panelCount"], 4);

    let large: Value = client
        .post(&url)
        .json(&json!({"panelCount": 120}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(large["ok"], false);
    assert_eq!(large["needs"], json!(["details"]));

    for bad in [json!({}), json!({"panelCount": 0}), json!({"panelCount": -3}), json!({"panelCount": "4"})] {
        let response = client.post(&url).json(&bad).send().await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", bad);
        assert_eq!(
            response.json::<Value>().await?,
            json!({"error": "panelCount must be a positive integer."})
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_pricing_question_is_answered_from_the_table() -> Result<()> {
    let provider = ScriptedProvider::replying(&["unused"]);
    let addr = spawn_chat_app(provider.clone()).await?;
    let client = ChatClient::new(&format!("http://{}/api/chat", addr))?;

    let reply = client
        .send("How much to clean 4 solar panels in Pismo Beach?")
        .await?;
    assert_eq!(reply, "$99.00");

    let streamed = client
        .stream("Price for 12 panels in Santa Maria, can I book Friday?", |_| {})
        .await?;
    assert!(streamed.starts_with("$102.00"), "{streamed}");
    assert!(streamed.ends_with("What day and time works best for you?"), "{streamed}");

    // The follow-up reaches the model with the quote exchange in history
    client.send("thanks").await?;
    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].len(), 6);
    assert_eq!(prompts[0][2], ChatTurn::assistant("$99.00"));
    Ok(())
}

#[tokio::test]
async fn test_wrong_method_is_405() -> Result<()> {
    let addr = spawn_chat_app(ScriptedProvider::replying(&["unused"])).await?;
    let client = browser()?;

    for path in ["/api/chat", "/api/quote"] {
        let response = client.get(format!("http://{}{}", addr, path)).send().await?;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{path}");
        assert_eq!(response.headers()[http::header::ALLOW], "POST");
        assert_eq!(
            response.json::<Value>().await?,
            json!({"error": "Only POST requests are allowed."})
        );
    }

    let response = client
        .get(format!("http://{}/api/chat/history", addr))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_cors_mirrors_origin() -> Result<()> {
    let addr = spawn_chat_app(ScriptedProvider::replying(&["unused"])).await?;

    let response = browser()?
        .request(reqwest::Method::OPTIONS, format!("http://{}/api/chat", addr))
        .header(http::header::ORIGIN, "https://widget.example")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://widget.example"
    );
    assert!(
        response
            .headers()
            .get(http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none()
    );
    Ok(())
}
