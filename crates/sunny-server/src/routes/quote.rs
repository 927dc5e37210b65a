use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sunny_http_server::{HttpError, Middleware, Next, Request, Response};

use crate::QuoteProvider;

const PANEL_COUNT_REQUIRED: &str = "panelCount must be a positive integer.";

/// `POST /api/quote` with `{"panelCount": n}`
#[derive(Clone)]
pub struct QuoteHandler {
    provider: Arc<dyn QuoteProvider>,
}

impl QuoteHandler {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Middleware for QuoteHandler {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        let panel_count = req
            .body
            .get("panelCount")
            .and_then(parse_panel_count)
            .ok_or_else(|| HttpError::validation(PANEL_COUNT_REQUIRED))?;

        let quote = self
            .provider
            .quote(panel_count)
            .await
            .map_err(HttpError::internal)?;

        res.json(&quote.to_json())?;
        Ok(Next::Done)
    }
}

/// Any positive whole JSON number, `5.0` included. Counts beyond `u32` saturate
/// so they are priced as over the maximum rather than rejected.
fn parse_panel_count(value: &Value) -> Option<u32> {
    let count = value.as_f64()?;
    if count.fract() != 0.0 || count <= 0.0 {
        return None;
    }
    // Float to int casts saturate
    Some(count as u32)
}
