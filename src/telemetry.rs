//! # Request/Response Logging
//!
//! Two independent record streams share one subscriber:
//!
//! * target `access`: one completion line per request, emitted once the response body has
//!   been fully handed off (or abandoned by the client).
//! * target `failure`: internal failures and caught panics, with the captured backtrace.
//!
//! Both are written to the console and to the append-only `<LOG_DIR>/server.log`.

use std::{
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::ConnectInfo,
    http::{Extensions, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body::{Frame, SizeHint};
use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{AppConfig, Env},
    error::FailureReport,
};

/// File name of the persistent log inside `LOG_DIR`.
pub const LOG_FILE: &str = "server.log";

const DEFAULT_FILTER: &str = "college_erp=debug,access=info,failure=info,tower_http=info,axum=info";

/// init_tracing
///
/// Installs the global subscriber. The console layer and the file layer use the same
/// formatter so a completion line reads identically in both sinks. Span fields are
/// formatted once and shared by both layers, so colour is off on the console too. The file is written by
/// a dedicated worker thread; the returned guard flushes it on drop and must be held for
/// the lifetime of the process.
pub fn init_tracing(config: &AppConfig) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let appender = tracing_appender::rolling::never(&config.log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    // RUST_LOG wins; otherwise fall back to the crate defaults.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    match config.env {
        Env::Development => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_ansi(false))
                .with(fmt::layer().with_ansi(false).with_writer(file_writer))
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(file_writer))
                .init();
        }
    }

    Ok(guard)
}

/// Peer address recorded by `into_make_service_with_connect_info`, or `unknown`.
pub fn client_address(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// make_request_span
///
/// Used by `TraceLayer` to open the per-request span. Carries the correlation id so every
/// line emitted while serving the request, including the completion line, can be joined.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        client = %client_address(request.extensions()),
        req_id = %request_id,
    )
}

/// log_completion
///
/// Runs inside the request span, outside the error normalizer. Captures the final status
/// and defers the completion line until the response body has finished streaming.
pub async fn log_completion(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let span = Span::current();
    let response = next.run(request).await;

    let line = CompletionLine {
        span,
        status: response.status(),
        started,
    };
    response.map(|inner| {
        Body::new(CompletionBody {
            inner,
            line: Some(line),
        })
    })
}

struct CompletionLine {
    span: Span,
    status: StatusCode,
    started: Instant,
}

impl CompletionLine {
    fn emit(self) {
        let _entered = self.span.enter();
        tracing::info!(
            target: "access",
            status = self.status.as_u16(),
            latency_ms = self.started.elapsed().as_millis() as u64,
            "request completed"
        );
    }
}

/// Response body that emits the completion line when the stream ends. The server may drop
/// a body without polling past its last frame, so dropping it also counts as the end.
struct CompletionBody {
    inner: Body,
    line: Option<CompletionLine>,
}

impl CompletionBody {
    fn finish(&mut self) {
        if let Some(line) = self.line.take() {
            line.emit();
        }
    }
}

impl HttpBody for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.finish();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CompletionBody {
    fn drop(&mut self) {
        self.finish();
    }
}

/// record_failure
///
/// Writes an internal failure to the failure stream. Called by the error normalizer only.
pub fn record_failure(report: &FailureReport) {
    tracing::error!(
        target: "failure",
        kind = report.kind,
        message = %report.message,
        backtrace = %report.backtrace,
        "internal failure"
    );
}
