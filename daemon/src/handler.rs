//! HTTP handler for batch validation

use crate::config::DaemonConfig;
use crate::metrics::Metrics;
use actcheck_protocol::{BatchError, ErrorBody, Record, Verdict, validate_batch};
use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// The only route served
pub const ISGOOD_PATH: &str = "/isgood";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Transport and decode failures, before any record is looked at
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("failed to read request body")]
    ReadBody(String),

    #[error("request body too large")]
    BodyTooLarge { limit: usize },

    #[error("failed to decode request body")]
    Decode(#[from] serde_json::Error),
}

impl RequestError {
    pub fn reason(&self) -> &'static str {
        match self {
            RequestError::EmptyBody => "empty_body",
            RequestError::ReadBody(_) => "read_error",
            RequestError::BodyTooLarge { .. } => "body_too_large",
            RequestError::Decode(_) => "decode",
        }
    }
}

/// Why a request did not get the success body
#[derive(Error, Debug)]
enum Rejection {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Invalid(#[from] BatchError),
}

impl Rejection {
    fn reason(&self) -> &'static str {
        match self {
            Rejection::Request(e) => e.reason(),
            Rejection::Invalid(e) => e.error.reason(),
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Rejection::Request(e) => ErrorBody::new(e.to_string()),
            Rejection::Invalid(e) => ErrorBody::from(e),
        }
    }
}

/// Per-server settings shared by every connection
///
/// Nothing in here is written during validation; each request builds its own
/// records and verdict.
pub struct HandlerContext {
    max_body_bytes: usize,
    metrics: Arc<Metrics>,
}

impl HandlerContext {
    pub fn new(config: &DaemonConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            max_body_bytes: config.server.max_body_bytes,
            metrics,
        }
    }
}

/// Run the validation server on the configured address
pub async fn run_handler(config: &DaemonConfig, metrics: Arc<Metrics>) -> Result<()> {
    let listener = TcpListener::bind(config.server.bind).await?;
    info!("Handler listening on {}", listener.local_addr()?);

    serve(listener, Arc::new(HandlerContext::new(config, metrics))).await
}

/// Accept connections on `listener` until it fails
pub async fn serve(listener: TcpListener, ctx: Arc<HandlerContext>) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);

        let ctx = ctx.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let ctx = ctx.clone();
                async move { handle_request(req, &ctx).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Route a request
async fn handle_request<B>(
    req: Request<B>,
    ctx: &HandlerContext,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    if req.uri().path() != ISGOOD_PATH {
        return Ok(empty_response(StatusCode::NOT_FOUND));
    }

    if req.method() != Method::POST {
        let mut response = empty_response(StatusCode::METHOD_NOT_ALLOWED);
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
        return Ok(response);
    }

    Ok(handle_is_good(req, ctx).await)
}

/// Validate a submitted batch and answer with the verdict or the first error
async fn handle_is_good<B>(req: Request<B>, ctx: &HandlerContext) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let start = Instant::now();
    ctx.metrics.requests.inc();

    let response = match check_batch(req.into_body(), ctx).await {
        Ok(count) => {
            debug!("Accepted batch of {} records", count);
            ctx.metrics.batches_accepted.inc();
            match serde_json::to_vec(&Verdict::accepted()) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(e) => error_response(&ErrorBody::new(e.to_string())),
            }
        }
        Err(rejection) => {
            ctx.metrics.reject(rejection.reason());
            error_response(&rejection.body())
        }
    };

    ctx.metrics
        .request_duration
        .observe(start.elapsed().as_secs_f64());

    response
}

async fn check_batch<B>(body: B, ctx: &HandlerContext) -> Result<usize, Rejection>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = read_body(body, ctx.max_body_bytes).await?;

    let records: Vec<Record> = serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Decode error: {}", e);
        RequestError::Decode(e)
    })?;

    ctx.metrics.records_per_batch.observe(records.len() as f64);

    if let Err(err) = validate_batch(&records) {
        let session = records
            .get(err.index)
            .map(|r| r.check_session_key.as_str())
            .unwrap_or_default();
        warn!(
            index = err.index,
            session = %session,
            "Rejected batch: {}",
            err.error
        );
        return Err(err.into());
    }

    Ok(records.len())
}

/// Collect the body, enforcing the size limit
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            RequestError::BodyTooLarge { limit }
        } else {
            RequestError::ReadBody(e.to_string())
        }
    })?;

    let bytes = collected.to_bytes();
    if bytes.is_empty() {
        return Err(RequestError::EmptyBody);
    }

    Ok(bytes)
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let has_body = !body.is_empty();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    if has_body {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    response
}

/// 500 with the encoded error, or an empty body if it cannot be encoded
fn error_response(body: &ErrorBody) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::to_vec(body).unwrap_or_default(),
    )
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    json_response(status, Vec::new())
}
