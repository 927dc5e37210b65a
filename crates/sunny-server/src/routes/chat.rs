//! `POST /api/chat`

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use http::StatusCode;
use serde_json::{Value, json};
use sunny_http_server::sse::{self, StreamFrame};
use sunny_http_server::{Handler, HttpError, Middleware, Next, Request, Response, Router};
use sunny_session_storage::{ChatTurn, SharedSession};
use tracing::{debug, info, warn};

use super::PostOnly;
use crate::intent::{self, Intent};
use crate::{CompletionError, CompletionProvider, Quote, QuoteProvider};

pub const SYSTEM_PROMPT: &str = "You are Sunny, a concise, friendly web assistant. Answer clearly without fluff. \
If asked about business information, say: \"I can connect you with the SunSweeper team\" and show a placeholder contact line. \
If you are unsure, say so.";

/// Conversation turns kept in the prompt; each turn is a user and an assistant entry
pub const MAX_HISTORY_TURNS: usize = 10;

const MESSAGE_REQUIRED: &str = "A non-empty message field is required.";
const SESSION_UNAVAILABLE: &str = "Session unavailable.";
const GENERATION_FAILED: &str = "Failed to generate response.";
const STREAM_FAILED: &str = "Failed to stream response.";

const QUOTE_DETAILS_NEEDED: &str =
    "I can help with solar panel cleaning pricing. How many panels do you have, and what city are you in?";
const QUOTE_UNAVAILABLE: &str = "Thanks, I have what I need, but I couldn't generate an instant quote for this one. \
Call or text 805-938-1515 and we'll finalize pricing quickly.";
const BOOKING_NUDGE: &str = "Want to get this scheduled? What day and time works best for you?";

/// Router mounted at `/api/chat`
pub fn router(provider: Arc<dyn CompletionProvider>, quotes: Arc<dyn QuoteProvider>) -> Router {
    Router::new()
        .post("/", ChatHandler::new(provider, quotes))
        .mount("/", vec![Handler::plain(PostOnly)])
}

/// Answers one chat message and records the exchange in the session.
///
/// Solar pricing and booking questions are answered from the quote provider;
/// everything else goes to the completion provider.
#[derive(Clone)]
pub struct ChatHandler {
    provider: Arc<dyn CompletionProvider>,
    quotes: Arc<dyn QuoteProvider>,
    system_prompt: String,
}

impl ChatHandler {
    pub fn new(provider: Arc<dyn CompletionProvider>, quotes: Arc<dyn QuoteProvider>) -> Self {
        Self::with_system_prompt(provider, quotes, SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(
        provider: Arc<dyn CompletionProvider>,
        quotes: Arc<dyn QuoteProvider>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            quotes,
            system_prompt: system_prompt.into(),
        }
    }

    /// Reply to a pricing or booking question without the language model
    async fn quote_reply(&self, intent: Intent, message: &str, body: &Value) -> String {
        let panel_count = intent::panel_count(message, body);
        let city = intent::city(message, body);

        let (Some(panel_count), Some(city)) = (panel_count, city) else {
            return QUOTE_DETAILS_NEEDED.to_string();
        };

        // Counts beyond u32 still land in the over-max branch
        let quote = if panel_count > 0 {
            let count = u32::try_from(panel_count).unwrap_or(u32::MAX);
            Some(self.quotes.quote(count).await)
        } else {
            None
        };

        match quote {
            Some(Ok(Quote::Priced(priced))) => {
                info!(panel_count, city = %city, ok = true, "Answered chat with a quote");
                if intent.booking {
                    format!("{} {}", priced.price_text, BOOKING_NUDGE)
                } else {
                    priced.price_text
                }
            }
            other => {
                if let Some(Err(err)) = &other {
                    warn!(error = %err, "Quote lookup failed");
                }
                info!(panel_count, city = %city, ok = false, "Answered chat with a quote");
                QUOTE_UNAVAILABLE.to_string()
            }
        }
    }

    /// Deliver a reply that is already complete, as JSON or as a one-token stream
    async fn canned_reply(
        &self,
        reply: &str,
        use_stream: bool,
        res: &mut Response,
    ) -> Result<(), HttpError> {
        if !use_stream {
            res.json(&json!({ "reply": reply }))?;
            return Ok(());
        }

        sse::open(res)?;
        sse::send(res, &StreamFrame::token(reply)).await?;
        sse::send(res, &StreamFrame::done()).await?;
        sse::close(res);
        Ok(())
    }

    fn prompt(&self, history: &[ChatTurn], message: &str) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn::system(self.system_prompt.as_str()));
        messages.extend_from_slice(history);
        messages.push(ChatTurn::user(message));
        messages
    }

    async fn reply(&self, messages: &[ChatTurn], res: &mut Response) -> Result<String, HttpError> {
        let reply = self.provider.complete(messages).await.map_err(|err| {
            warn!(error = %err, provider = self.provider.name(), "Completion failed");
            HttpError::upstream(GENERATION_FAILED)
        })?;
        res.json(&json!({ "reply": reply }))?;
        Ok(reply)
    }

    /// Relay provider tokens as SSE frames. `Ok(None)` means the client went
    /// away and the upstream read was abandoned.
    async fn relay(
        &self,
        messages: &[ChatTurn],
        res: &mut Response,
    ) -> Result<Option<String>, StreamFailure> {
        let mut tokens = self.provider.stream(messages).await?;
        let mut reply = String::new();

        loop {
            let next = tokio::select! {
                _ = res.closed() => return Ok(None),
                next = tokens.next() => next,
            };

            match next {
                Some(Ok(token)) => {
                    reply.push_str(&token);
                    if let Err(err) = sse::send(res, &StreamFrame::token(token)).await {
                        debug!(error = %err, "Token not delivered");
                        return Ok(None);
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }

        sse::send(res, &StreamFrame::done()).await?;
        Ok(Some(reply))
    }

    async fn stream_reply(
        &self,
        messages: &[ChatTurn],
        res: &mut Response,
    ) -> Result<Option<String>, HttpError> {
        sse::open(res)?;

        match self.relay(messages, res).await {
            Ok(outcome) => {
                if outcome.is_none() {
                    info!("Client disconnected, abandoning chat stream");
                }
                sse::close(res);
                Ok(outcome)
            }
            Err(failure) => {
                if let Err(err) = sse::send(res, &StreamFrame::error(STREAM_FAILED)).await {
                    debug!(error = %err, "Error frame not delivered");
                }
                sse::close(res);
                Err(failure.into())
            }
        }
    }
}

/// Why a stream stopped early
#[derive(Debug, thiserror::Error)]
enum StreamFailure {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Response(#[from] sunny_http_server::ResponseError),
}

impl From<StreamFailure> for HttpError {
    fn from(failure: StreamFailure) -> Self {
        match failure {
            StreamFailure::Completion(err) => HttpError::upstream(err.to_string()),
            StreamFailure::Response(err) => HttpError::Response(err),
        }
    }
}

#[async_trait]
impl Middleware for ChatHandler {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        let message = req
            .body
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .ok_or_else(|| HttpError::validation(MESSAGE_REQUIRED))?
            .to_string();

        let session: SharedSession = req.session.clone().ok_or_else(|| {
            HttpError::with_status(StatusCode::INTERNAL_SERVER_ERROR, SESSION_UNAVAILABLE)
        })?;

        let history = session
            .lock()
            .await
            .recent_history(MAX_HISTORY_TURNS * 2)
            .to_vec();

        let use_stream =
            req.query.get("stream").is_some_and(|v| v == "true") || req.accepts_event_stream();

        let intent = Intent::detect(&message);
        let reply = if intent.wants_quote() {
            let reply = self.quote_reply(intent, &message, &req.body).await;
            self.canned_reply(&reply, use_stream, res).await?;
            Some(reply)
        } else {
            let messages = self.prompt(&history, &message);
            if use_stream {
                self.stream_reply(&messages, res).await?
            } else {
                Some(self.reply(&messages, res).await?)
            }
        };

        if let Some(reply) = reply {
            let mut session = session.lock().await;
            let mut updated = history;
            updated.push(ChatTurn::user(message));
            updated.push(ChatTurn::assistant(reply));
            session.history = updated;
            debug!(session_id = %session.id, turns = session.history.len(), "Recorded chat exchange");
        }

        Ok(Next::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QuoteError, TieredPricing, TokenStream};
    use futures::stream;
    use http::Method;
    use http::header::ACCEPT;
    use http_body_util::BodyExt;
    use sunny_session_storage::Session;
    use tokio::sync::Mutex;

    /// Replays canned tokens and records the prompts it was given
    struct Scripted {
        tokens: Vec<Result<&'static str, &'static str>>,
        prompts: Arc<std::sync::Mutex<Vec<Vec<ChatTurn>>>>,
        /// Never finish the stream after the scripted tokens
        hang: bool,
    }

    impl Scripted {
        fn new(tokens: Vec<Result<&'static str, &'static str>>) -> Self {
            Self {
                tokens,
                prompts: Arc::default(),
                hang: false,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ChatTurn]) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let mut reply = String::new();
            for token in &self.tokens {
                match token {
                    Ok(token) => reply.push_str(token),
                    Err(err) => return Err(CompletionError::Decode(err.to_string())),
                }
            }
            Ok(reply)
        }

        async fn stream(&self, messages: &[ChatTurn]) -> Result<TokenStream, CompletionError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let items: Vec<_> = self
                .tokens
                .iter()
                .map(|t| {
                    t.map(str::to_string)
                        .map_err(|e| CompletionError::Decode(e.to_string()))
                })
                .collect();
            let tokens = stream::iter(items);
            if self.hang {
                Ok(tokens.chain(stream::pending()).boxed())
            } else {
                Ok(tokens.boxed())
            }
        }
    }

    fn chat(provider: Arc<dyn CompletionProvider>) -> ChatHandler {
        ChatHandler::new(provider, Arc::new(TieredPricing::default()))
    }

    /// Quote provider that always fails
    struct BrokenPricing;

    #[async_trait]
    impl QuoteProvider for BrokenPricing {
        async fn quote(&self, _panel_count: u32) -> Result<Quote, QuoteError> {
            Err(QuoteError::Config("pricing offline".to_string()))
        }
    }

    fn session_with_history(turns: usize) -> SharedSession {
        let mut session = Session::with_id("s1");
        for i in 0..turns {
            session.history.push(ChatTurn::user(format!("q{i}")));
            session.history.push(ChatTurn::assistant(format!("a{i}")));
        }
        Arc::new(Mutex::new(session))
    }

    fn chat_request(body: Value, session: Option<SharedSession>, uri: &str) -> Request {
        let mut req = Request::empty(Method::POST, uri);
        req.body = body;
        req.session = session;
        req
    }

    async fn run(
        handler: &ChatHandler,
        mut req: Request,
    ) -> (Result<Next, HttpError>, StatusCode, String) {
        let (mut res, pending) = Response::channel();
        let outcome = handler.handle(&mut req, &mut res).await;
        drop(res);
        match pending.await {
            Ok(response) => {
                let status = response.status();
                let body = response.into_body().collect().await.unwrap().to_bytes();
                (outcome, status, String::from_utf8(body.to_vec()).unwrap())
            }
            Err(_) => (outcome, StatusCode::OK, String::new()),
        }
    }

    #[tokio::test]
    async fn test_rejects_missing_or_blank_message() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("hi")])));

        for body in [json!({}), json!({"message": "   "}), json!({"message": 42})] {
            let req = chat_request(body, Some(session_with_history(0)), "/");
            let (outcome, _, _) = run(&handler, req).await;
            let err = outcome.unwrap_err();
            assert_eq!(err.response_status(), StatusCode::BAD_REQUEST);
            assert_eq!(err.client_message(), MESSAGE_REQUIRED);
        }
    }

    #[tokio::test]
    async fn test_requires_session() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("hi")])));
        let req = chat_request(json!({"message": "hi"}), None, "/");

        let err = run(&handler, req).await.0.unwrap_err();
        assert_eq!(err.response_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), SESSION_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_json_reply_updates_history() {
        let provider = Arc::new(Scripted::new(vec![Ok("Hello"), Ok(" there")]));
        let handler = chat(provider.clone());
        let session = session_with_history(1);

        let req = chat_request(json!({"message": "  hi  "}), Some(session.clone()), "/");
        let (outcome, status, body) = run(&handler, req).await;

        assert_eq!(outcome.unwrap(), Next::Done);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"reply":"Hello there"}"#);

        let history = session.lock().await.history.clone();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2], ChatTurn::user("hi"));
        assert_eq!(history[3], ChatTurn::assistant("Hello there"));

        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert_eq!(prompt[0], ChatTurn::system(SYSTEM_PROMPT));
        assert_eq!(prompt.last(), Some(&ChatTurn::user("hi")));
        assert_eq!(prompt.len(), 4);
    }

    #[tokio::test]
    async fn test_history_is_truncated() {
        let provider = Arc::new(Scripted::new(vec![Ok("ok")]));
        let handler = chat(provider.clone());
        let session = session_with_history(15);

        let req = chat_request(json!({"message": "next"}), Some(session.clone()), "/");
        run(&handler, req).await.0.unwrap();

        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert_eq!(prompt.len(), 1 + MAX_HISTORY_TURNS * 2 + 1);
        assert_eq!(prompt[1], ChatTurn::user("q5"));

        let history = session.lock().await.history.clone();
        assert_eq!(history.len(), MAX_HISTORY_TURNS * 2 + 2);
        assert_eq!(history[0], ChatTurn::user("q5"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_502() {
        let handler = chat(Arc::new(Scripted::new(vec![Err("down")])));
        let session = session_with_history(0);
        let req = chat_request(json!({"message": "hi"}), Some(session.clone()), "/");

        let err = run(&handler, req).await.0.unwrap_err();
        assert_eq!(err.response_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.client_message(), GENERATION_FAILED);
        assert!(session.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_stream_reply() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("Hel"), Ok("lo")])));
        let session = session_with_history(0);
        let req = chat_request(json!({"message": "hi"}), Some(session.clone()), "/?stream=true");

        let (outcome, status, body) = run(&handler, req).await;

        assert_eq!(outcome.unwrap(), Next::Done);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "data: {\"token\":\"Hel\"}\n\ndata: {\"token\":\"lo\"}\n\ndata: {\"done\":true}\n\n"
        );
        let history = session.lock().await.history.clone();
        assert_eq!(history, vec![ChatTurn::user("hi"), ChatTurn::assistant("Hello")]);
    }

    #[tokio::test]
    async fn test_accept_header_selects_stream() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("x")])));
        let req = chat_request(json!({"message": "hi"}), Some(session_with_history(0)), "/")
            .with_header(ACCEPT, "text/event-stream");

        let (_, _, body) = run(&handler, req).await;
        assert!(body.starts_with("data: {\"token\":\"x\"}\n\n"));
    }

    #[tokio::test]
    async fn test_stream_failure_emits_error_frame() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("par"), Err("boom")])));
        let session = session_with_history(0);
        let req = chat_request(json!({"message": "hi"}), Some(session.clone()), "/?stream=true");

        let (outcome, status, body) = run(&handler, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "data: {\"token\":\"par\"}\n\ndata: {\"error\":\"Failed to stream response.\"}\n\n"
        );
        assert!(matches!(outcome, Err(HttpError::Upstream(_))));
        assert!(session.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_abandons_stream() {
        let mut provider = Scripted::new(vec![Ok("a"), Ok("b")]);
        provider.hang = true;
        let handler = chat(Arc::new(provider));
        let session = session_with_history(0);
        let mut req = chat_request(json!({"message": "hi"}), Some(session.clone()), "/?stream=true");

        let (mut res, pending) = Response::channel();
        let client = async {
            let mut body = pending.await.unwrap().into_body();
            let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
            // Hang up after the first frame
            drop(body);
            first
        };

        let (outcome, first) = tokio::join!(handler.handle(&mut req, &mut res), client);

        assert_eq!(first, "data: {\"token\":\"a\"}\n\n");
        assert_eq!(outcome.unwrap(), Next::Done);
        assert!(session.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_gone_before_headers() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("a")])));
        let session = session_with_history(0);
        let mut req = chat_request(json!({"message": "hi"}), Some(session.clone()), "/?stream=true");

        let (mut res, pending) = Response::channel();
        drop(pending);
        let outcome = handler.handle(&mut req, &mut res).await;

        assert!(matches!(outcome, Err(HttpError::Response(_))));
        assert!(session.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_quote_intent_asks_for_details() {
        let provider = Arc::new(Scripted::new(vec![Ok("model")]));
        let handler = chat(provider.clone());
        let session = session_with_history(0);

        for message in ["How much to clean my solar panels?", "Quote for 12 panels please"] {
            let req = chat_request(json!({"message": message}), Some(session.clone()), "/");
            let (outcome, status, body) = run(&handler, req).await;

            assert_eq!(outcome.unwrap(), Next::Done);
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"reply": QUOTE_DETAILS_NEEDED}).to_string());
        }
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quote_intent_prices_from_table() {
        let provider = Arc::new(Scripted::new(vec![Ok("model")]));
        let handler = chat(provider.clone());
        let session = session_with_history(0);

        let req = chat_request(
            json!({"message": "What would it cost for 20 panels in San Luis Obispo?"}),
            Some(session.clone()),
            "/",
        );
        let (_, status, body) = run(&handler, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"reply":"$170.00"}"#);
        assert!(provider.prompts.lock().unwrap().is_empty());

        let history = session.lock().await.history.clone();
        assert_eq!(history.last(), Some(&ChatTurn::assistant("$170.00")));
    }

    #[tokio::test]
    async fn test_quote_intent_uses_body_fields() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("model")])));
        let req = chat_request(
            json!({"message": "solar price please", "panelCount": 4, "city": "Pismo Beach"}),
            Some(session_with_history(0)),
            "/",
        );

        let (_, _, body) = run(&handler, req).await;
        assert_eq!(body, r#"{"reply":"$99.00"}"#);
    }

    #[tokio::test]
    async fn test_booking_intent_adds_scheduling_nudge() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("model")])));
        let req = chat_request(
            json!({"message": "I want to book a cleaning for 4 panels in Santa Maria"}),
            Some(session_with_history(0)),
            "/",
        );

        let (_, _, body) = run(&handler, req).await;
        assert_eq!(
            body,
            json!({"reply": format!("$99.00 {}", BOOKING_NUDGE)}).to_string()
        );
    }

    #[tokio::test]
    async fn test_quote_intent_falls_back_when_unpriced() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("model")])));

        // Over the automatic pricing limit
        let req = chat_request(
            json!({"message": "Estimate for 80 panels in Lompoc"}),
            Some(session_with_history(0)),
            "/",
        );
        let (_, _, body) = run(&handler, req).await;
        assert_eq!(body, json!({"reply": QUOTE_UNAVAILABLE}).to_string());

        // Not a positive count
        let req = chat_request(
            json!({"message": "solar quote", "panelCount": 0, "city": "Lompoc"}),
            Some(session_with_history(0)),
            "/",
        );
        let (_, _, body) = run(&handler, req).await;
        assert_eq!(body, json!({"reply": QUOTE_UNAVAILABLE}).to_string());

        // Pricing source failing
        let handler = ChatHandler::new(
            Arc::new(Scripted::new(vec![Ok("model")])),
            Arc::new(BrokenPricing),
        );
        let req = chat_request(
            json!({"message": "Quote for 5 panels in Orcutt"}),
            Some(session_with_history(0)),
            "/",
        );
        let (_, _, body) = run(&handler, req).await;
        assert_eq!(body, json!({"reply": QUOTE_UNAVAILABLE}).to_string());
    }

    #[tokio::test]
    async fn test_quote_reply_streams_when_asked() {
        let handler = chat(Arc::new(Scripted::new(vec![Ok("model")])));
        let req = chat_request(
            json!({"message": "Price for 4 panels in Nipomo"}),
            Some(session_with_history(0)),
            "/?stream=true",
        );

        let (_, _, body) = run(&handler, req).await;
        assert_eq!(
            body,
            "data: {\"token\":\"$99.00\"}\n\ndata: {\"done\":true}\n\n"
        );
    }
}
