use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::{
    client::legacy::{
        connect::{proxy::Tunnel, Connect, HttpConnector},
        Client,
    },
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::common::util::read_env_opt;

/// Per-request deadline enforced by the shared client.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot send request: {0}")]
    HyperError(#[from] hyper::Error),
    #[error("cannot send request: {0}")]
    HyperUtilError(#[from] hyper_util::client::legacy::Error),
    #[error("runtime error: {0}")]
    RuntimeError(#[from] tokio::task::JoinError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait HttpClient {
    async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error>;
}

/// A hyper-based client with connection keep-alive. Redirects are never
/// followed; 3xx responses are returned to the caller as-is. When the
/// ambient environment names a proxy (`http_proxy` / `HTTP_PROXY`), every
/// connection is tunneled through it.
pub struct HarnessHttpClient {
    runtime: Option<Arc<Runtime>>,
    client: InnerClient,
}

enum InnerClient {
    Direct(Arc<Client<HttpConnector, Full<Bytes>>>),
    Proxied(Arc<Client<Tunnel<HttpConnector>, Full<Bytes>>>),
}

impl HarnessHttpClient {
    /// Builds a client honoring the ambient proxy environment at
    /// construction time.
    pub fn new(runtime: Option<Arc<Runtime>>) -> Self {
        Self::with_proxy(runtime, proxy_from_env())
    }

    /// Builds a client with an explicit proxy choice, ignoring the
    /// environment.
    pub fn with_proxy(runtime: Option<Arc<Runtime>>, proxy: Option<Uri>) -> Self {
        let client = match proxy {
            Some(proxy_uri) => {
                tracing::debug!(proxy = %proxy_uri, "tunneling remote requests through proxy");
                InnerClient::Proxied(Arc::new(
                    Client::builder(TokioExecutor::new())
                        .build(Tunnel::new(proxy_uri, HttpConnector::new())),
                ))
            }
            None => InnerClient::Direct(Arc::new(
                Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            )),
        };

        Self { runtime, client }
    }

    async fn dispatch_on<C>(
        &self,
        client: Arc<Client<C, Full<Bytes>>>,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Bytes>, Error>
    where
        C: Connect + Clone + Send + Sync + 'static,
    {
        if let Some(rt) = self.runtime.clone() {
            rt.spawn(async move { Self::execute(client, req).await })
                .await?
        } else {
            Self::execute(client, req).await
        }
    }

    async fn execute<C>(
        client: Arc<Client<C, Full<Bytes>>>,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Bytes>, Error>
    where
        C: Connect + Clone + Send + Sync + 'static,
    {
        let res = match tokio::time::timeout(REQUEST_TIMEOUT, client.request(req)).await {
            Ok(res) => res?,
            Err(_) => return Err(Error::Timeout(REQUEST_TIMEOUT)),
        };

        let (res_parts, res_body) = res.into_parts();
        let body = res_body.collect().await?.to_bytes();

        Ok(Response::from_parts(res_parts, body))
    }
}

#[async_trait]
impl HttpClient for HarnessHttpClient {
    async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let (req_parts, req_body) = req.into_parts();

        // A caller-supplied Host header is kept; hyper only derives one
        // from the absolute URI when the header is absent.
        let hyper_req = Request::from_parts(req_parts, Full::new(req_body));

        match &self.client {
            InnerClient::Direct(client) => self.dispatch_on(client.clone(), hyper_req).await,
            InnerClient::Proxied(client) => self.dispatch_on(client.clone(), hyper_req).await,
        }
    }
}

/// Reads the proxy URL from the conventional environment variables,
/// lowercase name first. Unparsable values are ignored with a warning.
fn proxy_from_env() -> Option<Uri> {
    let value = read_env_opt("http_proxy").or_else(|| read_env_opt("HTTP_PROXY"))?;
    match value.parse::<Uri>() {
        Ok(uri) => Some(uri),
        Err(e) => {
            tracing::warn!("ignoring unparsable proxy configuration '{}': {}", value, e);
            None
        }
    }
}
