//! Reporting spans to a zipkin collector over http.

use crate::error::TraceError;
use crate::report::{model, Reporter, SpanData};
use http::{header::CONTENT_TYPE, Method, Request, StatusCode, Uri};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default zipkin collector endpoint
const DEFAULT_COLLECTOR_ENDPOINT: &str = "http://localhost:9411/api/v2/spans";

/// The minimal http interface needed to post span batches.
///
/// An implementation for `reqwest::blocking::Client` ships behind the
/// `reqwest-blocking-client` feature; applications with their own http
/// stack provide this instead.
pub trait HttpClient: fmt::Debug + Send + Sync {
    /// Sends the request, returning the response status.
    fn send(&self, request: Request<Vec<u8>>) -> Result<StatusCode, Box<dyn Error + Send + Sync>>;
}

#[cfg(feature = "reqwest-blocking-client")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest-blocking-client")))]
impl HttpClient for reqwest::blocking::Client {
    fn send(&self, request: Request<Vec<u8>>) -> Result<StatusCode, Box<dyn Error + Send + Sync>> {
        let response = self.execute(request.try_into()?)?;
        Ok(response.status())
    }
}

/// Posts span batches to a zipkin collector as api v2 json.
///
/// Transport problems are absorbed: a failed upload is logged, counted in
/// [`dropped_spans`], and never surfaced to the instrumented application.
/// No retries are attempted; spans of a failed batch are gone.
///
/// [`dropped_spans`]: HttpReporter::dropped_spans
#[derive(Debug)]
pub struct HttpReporter {
    client: Box<dyn HttpClient>,
    collector_endpoint: Uri,
    dropped_spans: AtomicU64,
}

impl HttpReporter {
    /// Returns a builder used to configure an `HttpReporter`.
    pub fn builder() -> HttpReporterBuilder {
        HttpReporterBuilder::default()
    }

    /// The number of spans dropped because an upload failed.
    pub fn dropped_spans(&self) -> u64 {
        self.dropped_spans.load(Ordering::Relaxed)
    }

    fn upload(&self, spans: &[SpanData]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let batch: Vec<_> = spans.iter().map(model::into_json_span).collect();
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.collector_endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&batch)?)?;

        let status = self.client.send(request)?;
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("collector responded with status {status}").into())
        }
    }
}

impl Reporter for HttpReporter {
    fn report(&self, spans: Vec<SpanData>) {
        if spans.is_empty() {
            return;
        }
        if let Err(err) = self.upload(&spans) {
            self.dropped_spans
                .fetch_add(spans.len() as u64, Ordering::Relaxed);
            tracing::warn!(
                error = %err,
                spans = spans.len(),
                "failed to upload span batch"
            );
        }
    }
}

/// Configures and builds an [`HttpReporter`].
#[derive(Debug)]
pub struct HttpReporterBuilder {
    collector_endpoint: String,
    client: Option<Box<dyn HttpClient>>,
}

impl Default for HttpReporterBuilder {
    fn default() -> Self {
        HttpReporterBuilder {
            #[cfg(feature = "reqwest-blocking-client")]
            client: Some(Box::new(reqwest::blocking::Client::new())),
            #[cfg(not(feature = "reqwest-blocking-client"))]
            client: None,

            collector_endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_string(),
        }
    }
}

impl HttpReporterBuilder {
    /// Assign the zipkin collector endpoint. Defaults to
    /// `http://localhost:9411/api/v2/spans`.
    pub fn with_collector_endpoint<T: Into<String>>(mut self, endpoint: T) -> Self {
        self.collector_endpoint = endpoint.into();
        self
    }

    /// Assign the client implementation used to post batches.
    pub fn with_http_client<T: HttpClient + 'static>(mut self, client: T) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    /// Constructs the reporter.
    pub fn build(self) -> Result<HttpReporter, TraceError> {
        let client = self.client.ok_or(TraceError::NoHttpClient)?;
        Ok(HttpReporter {
            client,
            collector_endpoint: self.collector_endpoint.parse()?,
            dropped_spans: AtomicU64::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_span_data;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct FakeClient {
        status: StatusCode,
        requests: Arc<Mutex<Vec<(Request<()>, Vec<u8>)>>>,
    }

    impl FakeClient {
        fn new(status: StatusCode) -> Self {
            FakeClient {
                status,
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl HttpClient for FakeClient {
        fn send(
            &self,
            request: Request<Vec<u8>>,
        ) -> Result<StatusCode, Box<dyn Error + Send + Sync>> {
            let (parts, body) = request.into_parts();
            self.requests
                .lock()
                .unwrap()
                .push((Request::from_parts(parts, ()), body));
            Ok(self.status)
        }
    }

    #[derive(Debug)]
    struct UnreachableClient;

    impl HttpClient for UnreachableClient {
        fn send(
            &self,
            _request: Request<Vec<u8>>,
        ) -> Result<StatusCode, Box<dyn Error + Send + Sync>> {
            Err("connection refused".into())
        }
    }

    #[test]
    fn posts_json_to_the_collector() {
        let client = FakeClient::new(StatusCode::ACCEPTED);
        let reporter = HttpReporter::builder()
            .with_collector_endpoint("http://zipkin.test:9411/api/v2/spans")
            .with_http_client(client.clone())
            .build()
            .unwrap();

        reporter.report(vec![test_span_data()]);

        let requests = client.requests.lock().unwrap();
        let (request, body) = &requests[0];
        assert_eq!(request.method(), Method::POST);
        assert_eq!(
            request.uri().to_string(),
            "http://zipkin.test:9411/api/v2/spans"
        );
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value.as_array().map(|spans| spans.len()), Some(1));
        assert_eq!(reporter.dropped_spans(), 0);
    }

    #[test]
    fn empty_batches_are_not_posted() {
        let client = FakeClient::new(StatusCode::ACCEPTED);
        let reporter = HttpReporter::builder()
            .with_http_client(client.clone())
            .build()
            .unwrap();

        reporter.report(Vec::new());
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn collector_rejections_are_counted_not_raised() {
        let reporter = HttpReporter::builder()
            .with_http_client(FakeClient::new(StatusCode::INTERNAL_SERVER_ERROR))
            .build()
            .unwrap();

        reporter.report(vec![test_span_data(), test_span_data()]);
        assert_eq!(reporter.dropped_spans(), 2);
    }

    #[test]
    fn connection_failures_are_counted_not_raised() {
        let reporter = HttpReporter::builder()
            .with_http_client(UnreachableClient)
            .build()
            .unwrap();

        reporter.report(vec![test_span_data()]);
        assert_eq!(reporter.dropped_spans(), 1);
    }

    #[test]
    fn invalid_endpoints_fail_at_build_time() {
        let result = HttpReporter::builder()
            .with_http_client(UnreachableClient)
            .with_collector_endpoint("not a uri")
            .build();
        assert!(matches!(
            result,
            Err(TraceError::InvalidCollectorEndpoint(_))
        ));
    }
}
