use async_trait::async_trait;
use sunny_http_server::{ErrorMiddleware, HttpError, Next, Request, Response};
use tracing::error;

/// Last-resort error handler: logs the error and reports it as
/// `{"error": message}` with its declared status
#[derive(Debug, Clone, Copy)]
pub struct GlobalErrorHandler;

#[async_trait]
impl ErrorMiddleware for GlobalErrorHandler {
    async fn handle_error(
        &self,
        err: HttpError,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<Next, HttpError> {
        error!(error = %err, method = %req.method, path = %req.original_path(), "Unhandled error");

        if res.headers_sent() {
            res.finish();
        } else {
            res.status(err.response_status()).json(&err.to_json())?;
        }
        Ok(Next::Done)
    }
}
