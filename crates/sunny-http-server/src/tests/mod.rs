//! Test modules for sunny-http-server
//!
//! Dispatcher behaviour and the full middleware pipeline, driven in-process
//! through [`crate::Router::dispatch`].


use http::StatusCode;
use http_body_util::BodyExt;

use crate::{Request, Response, Router};

/// What the client would have received
pub struct Outcome {
    pub status: StatusCode,
    pub headers: http::HeaderMap,
    pub body: String,
}

impl Outcome {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Dispatch one request and collect the response
pub async fn dispatch(router: &Router, mut req: Request) -> (Request, Outcome) {
    let (mut res, pending) = Response::channel();
    router.dispatch(&mut req, &mut res).await;
    drop(res);

    let response = pending.await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    (
        req,
        Outcome {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        },
    )
}
