use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use surge_core::prelude::TransportError;
use surge_instruments::{report_operation, OperationRecord, Reporter};

use crate::check::Check;

/// The response to a request, or the reason there was none.
pub type HttpResult = Result<HttpResponse, TransportError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>, elapsed: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            elapsed,
        }
    }
}

/// The status code of a result, or 0 when the request never produced a response.
pub fn status_of(result: &HttpResult) -> u16 {
    result.as_ref().map(|r| r.status).unwrap_or(0)
}

/// A check that passes when the request produced a response with exactly `expected` status.
///
/// A transport failure has no status and always fails the check.
pub fn status_was(name: impl Into<String>, expected: u16) -> Check<HttpResult> {
    Check::new(name, move |result: &HttpResult| {
        matches!(result, Ok(response) if response.status == expected)
    })
}

/// An HTTP client that reports one `http_get` operation for each request it makes.
///
/// Cloning is cheap and clones share the same connection pool.
#[derive(Clone)]
pub struct HttpClientInstrumented {
    inner: reqwest::Client,
    reporter: Arc<Reporter>,
}

impl HttpClientInstrumented {
    pub fn new(timeout: Duration, reporter: Arc<Reporter>) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { inner, reporter })
    }

    /// Issue a GET and read the whole body. Never fails, transport problems are returned as the
    /// error side of the [HttpResult].
    pub async fn get(&self, url: &str) -> HttpResult {
        let mut operation_record = OperationRecord::new("http_get");
        let started = Instant::now();

        let result = match self.inner.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                response
                    .bytes()
                    .await
                    .map(|body| HttpResponse::new(status, body, started.elapsed()))
                    .map_err(classify)
            }
            Err(e) => Err(classify(e)),
        };

        match &result {
            Ok(response) => operation_record.add_attr("status", response.status),
            Err(e) => {
                log::trace!("GET {} failed: {}", url, e);
                operation_record.add_attr("error", e);
            }
        }
        report_operation(&self.reporter, operation_record, &result);

        result
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect {
            reason: error_chain(&err),
        }
    } else {
        TransportError::Other {
            reason: error_chain(&err),
        }
    }
}

// reqwest's own message is usually just "error sending request", the cause is further down.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
