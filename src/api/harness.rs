use std::sync::Arc;

use url::Url;

use crate::{
    api::{
        adapter::{local::LocalDispatcher, remote::RemoteDispatcher, Dispatcher},
        application::{Application, NoApplication},
    },
    common::{
        data::{Error, HarnessResponse, IntoHarnessRequest},
        util::{read_env_opt, Join},
    },
};

/// Environment variable carrying the remote base URL. Its presence at
/// configuration time is the entire mode switch.
pub const REMOTE_URL_ENV: &str = "HTTPHARNESS_SERVER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Remote,
}

/// Immutable dispatch configuration, resolved once before a harness is
/// built. Remote always wins when a base URL is present.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    remote_base: Option<Url>,
}

impl HarnessConfig {
    /// Resolves the mode from the ambient environment: remote when
    /// [`REMOTE_URL_ENV`] holds a base URL, local otherwise. Changing the
    /// variable afterwards does not affect a harness already built from
    /// this configuration.
    pub fn from_env() -> Result<Self, Error> {
        match read_env_opt(REMOTE_URL_ENV) {
            Some(value) => {
                let base = Url::parse(&value).map_err(|e| {
                    Error::Configuration(format!(
                        "cannot parse {} value '{}' as a base URL: {}",
                        REMOTE_URL_ENV, value, e
                    ))
                })?;
                Ok(Self {
                    remote_base: Some(base),
                })
            }
            None => Ok(Self { remote_base: None }),
        }
    }

    pub fn local() -> Self {
        Self { remote_base: None }
    }

    pub fn remote(base: Url) -> Self {
        Self {
            remote_base: Some(base),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.remote_base {
            Some(_) => Mode::Remote,
            None => Mode::Local,
        }
    }
}

/// A dispatch harness bound to exactly one mode for its whole lifetime.
///
/// In local mode requests are executed against the in-process application;
/// in remote mode they are forwarded to the configured base URL. The same
/// call surface works in both modes, except for
/// [`context_request`](Harness::context_request), which is local-only.
///
/// ```no_run
/// use httpharness::Harness;
/// use url::Url;
///
/// let harness = Harness::remote(Url::parse("http://localhost:3000/app").unwrap());
/// let response = harness.get("/app/status").unwrap();
/// assert!(response.is_success());
/// ```
pub struct Harness<A: Application> {
    dispatcher: Arc<dyn Dispatcher>,
    local: Option<Arc<LocalDispatcher<A>>>,
    base_url: Option<Url>,
}

impl Harness<NoApplication> {
    /// Builds a harness that always forwards to the given base URL.
    pub fn remote(base_url: Url) -> Self {
        Self {
            dispatcher: Arc::new(RemoteDispatcher::new(base_url.clone())),
            local: None,
            base_url: Some(base_url),
        }
    }
}

impl<A: Application + 'static> Harness<A> {
    /// Builds a harness from an explicit configuration. Local mode requires
    /// a target application; remote mode ignores it.
    pub fn new(config: HarnessConfig, app: Option<Arc<A>>) -> Result<Self, Error> {
        match config.remote_base {
            Some(base_url) => Ok(Self {
                dispatcher: Arc::new(RemoteDispatcher::new(base_url.clone())),
                local: None,
                base_url: Some(base_url),
            }),
            None => {
                let app = app.ok_or_else(|| {
                    Error::Configuration(
                        "local mode requires a target application".to_string(),
                    )
                })?;
                Ok(Self::local(app))
            }
        }
    }

    /// Builds a harness from the ambient environment (see
    /// [`HarnessConfig::from_env`]).
    pub fn from_env(app: Option<Arc<A>>) -> Result<Self, Error> {
        Self::new(HarnessConfig::from_env()?, app)
    }

    /// Builds a harness that always dispatches in-process.
    pub fn local(app: Arc<A>) -> Self {
        let local = Arc::new(LocalDispatcher::new(app));
        Self {
            dispatcher: local.clone(),
            local: Some(local),
            base_url: None,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.local {
            Some(_) => Mode::Local,
            None => Mode::Remote,
        }
    }

    /// The remote base URL, when in remote mode.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Dispatches a GET request for the given path.
    pub fn get(&self, path: &str) -> Result<HarnessResponse, Error> {
        self.get_async(path).join()
    }

    /// Dispatches a GET request for the given path.
    pub async fn get_async(&self, path: &str) -> Result<HarnessResponse, Error> {
        self.request_async(path).await
    }

    /// Normalizes the input and dispatches it through the bound mode.
    pub fn request<R: IntoHarnessRequest>(&self, input: R) -> Result<HarnessResponse, Error> {
        self.request_async(input).join()
    }

    /// Normalizes the input and dispatches it through the bound mode.
    pub async fn request_async<R: IntoHarnessRequest>(
        &self,
        input: R,
    ) -> Result<HarnessResponse, Error> {
        let request = input.into_harness_request()?;
        self.dispatcher.dispatch(request).await
    }

    /// Dispatches in-process and additionally returns the per-request
    /// context the application reported, when it reported one.
    ///
    /// Fails with [`Error::RemoteModeUnsupported`] before dispatching when
    /// the harness is bound to remote mode: there is no in-process context
    /// to observe on a remote server.
    pub fn context_request<R: IntoHarnessRequest>(
        &self,
        input: R,
    ) -> Result<(HarnessResponse, Option<A::Context>), Error> {
        self.context_request_async(input).join()
    }

    /// Dispatches in-process and additionally returns the per-request
    /// context the application reported, when it reported one.
    pub async fn context_request_async<R: IntoHarnessRequest>(
        &self,
        input: R,
    ) -> Result<(HarnessResponse, Option<A::Context>), Error> {
        let local = self.local.as_ref().ok_or(Error::RemoteModeUnsupported)?;
        let request = input.into_harness_request()?;
        local.dispatch_captured(request).await
    }
}
