use std::sync::Arc;

use async_trait::async_trait;
use http::Uri;
use lazy_static::lazy_static;
use tokio::runtime::Runtime;
use url::Url;

use crate::{
    api::adapter::Dispatcher,
    common::{
        data::{Error, HarnessRequest, HarnessResponse},
        http::{HarnessHttpClient, HttpClient},
        runtime,
    },
};

/// Forwards requests to a live server after composing their URIs with the
/// configured base URL.
///
/// All instances share one lazily-created client with connection keep-alive.
/// Redirects are never followed; network failures surface as
/// [`Error::Transport`] and are not retried.
pub struct RemoteDispatcher {
    base: Url,
    http_client: Arc<dyn HttpClient + Send + Sync + 'static>,
}

impl RemoteDispatcher {
    pub fn new(base: Url) -> Self {
        Self::with_client(base, REMOTE_HTTP_CLIENT.clone())
    }

    pub fn with_client(base: Url, http_client: Arc<dyn HttpClient + Send + Sync + 'static>) -> Self {
        Self { base, http_client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn rewrite_uri(&self, request: &HarnessRequest) -> Result<Uri, Error> {
        let host = self.base.host_str().ok_or_else(|| {
            Error::Configuration(format!("remote base URL '{}' has no host", self.base))
        })?;

        let authority = match self.base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let path = compose_path(self.base.path(), request.path());
        let path_and_query = match request.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };

        format!("{}://{}{}", self.base.scheme(), authority, path_and_query)
            .parse::<Uri>()
            .map_err(|e| Error::Configuration(format!("cannot compose remote URI: {}", e)))
    }
}

#[async_trait]
impl Dispatcher for RemoteDispatcher {
    async fn dispatch(&self, mut request: HarnessRequest) -> Result<HarnessResponse, Error> {
        let target = self.rewrite_uri(&request)?;
        request.set_uri(target);

        tracing::debug!(
            method = %request.method(),
            uri = %request.uri(),
            "forwarding request to remote server"
        );

        let mut req = http::Request::builder()
            .method(request.method().clone())
            .uri(request.uri().clone())
            .body(request.body().cloned().unwrap_or_default())
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        *req.headers_mut() = request.headers().clone();

        let response = self.http_client.send(req).await?;
        Ok(response.into())
    }
}

/// Composes the remote request path from the base path and the request path.
///
/// Walks the base path segments in order, consuming a leading request
/// segment for each one that matches and stopping at the first mismatch, so
/// a prefix the caller already included is not duplicated. Only a literal
/// leading overlap is stripped; a base segment repeating deeper in the
/// request path is left alone.
fn compose_path(base_path: &str, request_path: &str) -> String {
    let base = base_path.strip_suffix('/').unwrap_or(base_path);

    let mut remaining: Vec<&str> = request_path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in base.split('/').filter(|s| !s.is_empty()) {
        if remaining.first() == Some(&segment) {
            remaining.remove(0);
        } else {
            break;
        }
    }

    let mut path = String::from(base);
    if request_path == "/" {
        path.push('/');
    } else {
        for segment in &remaining {
            path.push('/');
            path.push_str(segment);
        }
    }

    if path.is_empty() {
        path.push('/');
    }

    path
}

lazy_static! {
    static ref REMOTE_CLIENT_RUNTIME: Arc<Runtime> = Arc::new(
        runtime::new(1, 1).expect("cannot build the remote client runtime")
    );
    static ref REMOTE_HTTP_CLIENT: Arc<HarnessHttpClient> = Arc::new(HarnessHttpClient::new(
        Some(REMOTE_CLIENT_RUNTIME.clone())
    ));
}

#[cfg(test)]
mod test {
    use super::compose_path;

    #[test]
    fn base_prefix_already_present_is_not_duplicated() {
        assert_eq!(compose_path("/app", "/app/foo"), "/app/foo");
    }

    #[test]
    fn base_prefix_is_prepended_when_absent() {
        assert_eq!(compose_path("/app", "/foo"), "/app/foo");
    }

    #[test]
    fn root_request_path_keeps_a_trailing_slash() {
        assert_eq!(compose_path("/app", "/"), "/app/");
    }

    #[test]
    fn trailing_slash_on_base_path_is_normalized() {
        assert_eq!(compose_path("/app/", "/foo"), "/app/foo");
    }

    #[test]
    fn root_base_path_leaves_request_path_unchanged() {
        assert_eq!(compose_path("/", "/foo/bar"), "/foo/bar");
        assert_eq!(compose_path("/", "/"), "/");
    }

    #[test]
    fn overlap_stops_at_the_first_mismatching_segment() {
        // only "app" overlaps; "other" does not, so "v1" is not consumed
        assert_eq!(compose_path("/app/v1", "/app/other/v1"), "/app/v1/other/v1");
    }

    #[test]
    fn repeated_base_segment_deeper_in_the_path_is_kept() {
        assert_eq!(compose_path("/app", "/foo/app/bar"), "/app/foo/app/bar");
    }

    #[test]
    fn fully_overlapping_request_path_collapses_to_base() {
        assert_eq!(compose_path("/app/foo", "/app/foo"), "/app/foo");
    }
}
