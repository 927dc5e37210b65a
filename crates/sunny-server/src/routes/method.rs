use async_trait::async_trait;
use http::StatusCode;
use http::header::ALLOW;
use serde_json::json;
use sunny_http_server::{HttpError, Middleware, Next, Request, Response};

const POST_ONLY: &str = "Only POST requests are allowed.";

/// Mounted behind a POST route: any other method on the same path gets a 405
/// with `Allow: POST`. Deeper paths fall through to the 404.
#[derive(Debug, Clone, Copy)]
pub struct PostOnly;

#[async_trait]
impl Middleware for PostOnly {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        if req.path != "/" {
            return Ok(Next::Continue);
        }

        res.status(StatusCode::METHOD_NOT_ALLOWED)
            .set_header(ALLOW, "POST")
            .json(&json!({ "error": POST_ONLY }))?;
        Ok(Next::Done)
    }
}
