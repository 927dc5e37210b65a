use async_trait::async_trait;
use serde_json::json;
use sunny_http_server::{HttpError, Middleware, Next, Request, Response};

/// `GET /health`
#[derive(Debug, Clone, Copy)]
pub struct Health;

#[async_trait]
impl Middleware for Health {
    async fn handle(&self, _req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        res.json(&json!({ "status": "ok" }))?;
        Ok(Next::Done)
    }
}
