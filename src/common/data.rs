use std::borrow::Cow;

use bytes::Bytes;
use http::{
    header::{HeaderName, HeaderValue},
    uri::InvalidUri,
    HeaderMap, Method, StatusCode, Uri,
};

use crate::api::application::ApplicationError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot normalize request input: {0}")]
    InvalidInput(String),
    #[error("invalid harness configuration: {0}")]
    Configuration(String),
    #[error("application failed while handling the request: {0}")]
    Handler(ApplicationError),
    #[error("local dispatch produced no response: {0}")]
    Capture(String),
    #[error("context capture requires local mode")]
    RemoteModeUnsupported,
    #[error("cannot parse captured response: {0}")]
    InvalidResponse(String),
    #[error("cannot reach remote server: {0}")]
    Transport(#[from] crate::common::http::Error),
}

/// A normalized HTTP request, fully resolved before it reaches a dispatcher.
///
/// Local dispatch serializes this structure onto the substitute transport;
/// remote dispatch rewrites its URI against the configured base URL first.
#[derive(Debug, Clone)]
pub struct HarnessRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl HarnessRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a GET request from a path with an optional query string.
    pub fn get<S: AsRef<str>>(path: S) -> Result<Self, Error> {
        path.as_ref().into_harness_request()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decoded query parameters in the order they appear in the query string.
    pub fn query_params(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.uri.query().unwrap_or("").as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Appends a header. Header names are case-insensitive and may appear
    /// multiple times.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidInput(format!("invalid header value: {}", e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub(crate) fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }
}

/// The response produced by one dispatch call, local or remote. Immutable
/// after construction and owned by the caller.
#[derive(Debug, Clone)]
pub struct HarnessResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HarnessResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of the given header, if present and valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The response body as text. Tries to borrow; invalid UTF-8 sequences
    /// are replaced with the Unicode replacement character.
    pub fn body_str(&self) -> Cow<'_, str> {
        match std::str::from_utf8(&self.body) {
            Ok(valid) => Cow::Borrowed(valid),
            Err(_) => Cow::Owned(String::from_utf8_lossy(&self.body).to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }
}

impl From<http::Response<Bytes>> for HarnessResponse {
    fn from(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self::new(parts.status, parts.headers, body)
    }
}

/// Conversion of call-site inputs into a [`HarnessRequest`].
///
/// Strings are interpreted as a path with an optional query string and
/// default to method GET. Pre-built `http::Request` values are taken as-is.
pub trait IntoHarnessRequest {
    fn into_harness_request(self) -> Result<HarnessRequest, Error>;
}

impl IntoHarnessRequest for HarnessRequest {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        Ok(self)
    }
}

impl IntoHarnessRequest for &str {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        let text: Cow<str> = if self.starts_with('/') || self.contains("://") {
            Cow::Borrowed(self)
        } else {
            Cow::Owned(format!("/{}", self))
        };

        let uri: Uri = text.parse().map_err(|e: InvalidUri| {
            Error::InvalidInput(format!("cannot parse '{}' as a request URI: {}", self, e))
        })?;

        Ok(HarnessRequest::new(Method::GET, uri))
    }
}

impl IntoHarnessRequest for String {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        self.as_str().into_harness_request()
    }
}

impl IntoHarnessRequest for http::Request<Bytes> {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        let (parts, body) = self.into_parts();
        Ok(HarnessRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: if body.is_empty() { None } else { Some(body) },
        })
    }
}

impl IntoHarnessRequest for http::Request<String> {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        self.map(Bytes::from).into_harness_request()
    }
}

impl IntoHarnessRequest for http::Request<Vec<u8>> {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        self.map(Bytes::from).into_harness_request()
    }
}

impl IntoHarnessRequest for http::Request<()> {
    fn into_harness_request(self) -> Result<HarnessRequest, Error> {
        self.map(|_| Bytes::new()).into_harness_request()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn string_input_normalizes_to_get_with_path_and_query() {
        let req = "/search?query=metallica&page=2"
            .into_harness_request()
            .unwrap();

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("query=metallica&page=2"));
        assert_eq!(
            req.query_params(),
            vec![
                ("query".to_string(), "metallica".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert!(req.body().is_none());
    }

    #[test]
    fn string_input_without_leading_slash_is_treated_as_path() {
        let req = "status".into_harness_request().unwrap();
        assert_eq!(req.path(), "/status");
    }

    #[test]
    fn invalid_string_input_is_rejected() {
        let result = "/with space".into_harness_request();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn prebuilt_request_passes_through_unchanged() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .header("content-type", "text/plain")
            .body("hello".to_string())
            .unwrap()
            .into_harness_request()
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/submit");
        assert_eq!(req.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(req.body().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn builder_collects_repeated_headers() {
        let req = HarnessRequest::get("/")
            .unwrap()
            .with_header("x-trace", "a")
            .unwrap()
            .with_header("X-Trace", "b")
            .unwrap();

        let values: Vec<_> = req.headers().get_all("x-trace").iter().collect();
        assert_eq!(values.len(), 2);
    }
}
