//! `httpharness` exercises a request-handling application either **in-process**
//! (simulating a full HTTP request/response cycle without a network listener)
//! or against a **live remote server**, and hands you the resulting response.
//! For in-process calls it can additionally capture the application's live
//! per-request context for inspection.
//!
//! The mode is decided once, when the harness is built, and never changes for
//! the lifetime of that harness:
//!
//! * **Local**: the harness serializes each request onto an in-memory
//!   [`Transport`] and drives the application's [`Application::handle`] entry
//!   point, then parses whatever the application wrote back into a
//!   [`HarnessResponse`].
//! * **Remote**: the harness rewrites each request URI against a base URL
//!   (composing path prefixes without duplicating them) and forwards it
//!   through one shared, keep-alive, non-redirecting client with a fixed
//!   per-request timeout.
//!
//! # Getting started
//!
//! Implement [`Application`] for the system under test and build a local
//! harness:
//!
//! ```
//! use async_trait::async_trait;
//! use httpharness::{Application, ApplicationError, ContextHook, Harness, Transport};
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! struct Minimal;
//!
//! #[async_trait]
//! impl Application for Minimal {
//!     type Context = ();
//!
//!     async fn handle(
//!         &self,
//!         transport: &mut Transport,
//!         _hook: Option<&ContextHook<()>>,
//!     ) -> Result<(), ApplicationError> {
//!         transport.write_all(
//!             b"HTTP/1.1 200 OK\r\ncontent-length: 11\r\n\r\nroot index\n",
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! let harness = Harness::local(Arc::new(Minimal));
//! let response = harness.get("/").unwrap();
//!
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body_str(), "root index\n");
//! ```
//!
//! # Remote mode
//!
//! Setting the `HTTPHARNESS_SERVER` environment variable to a base URL before
//! the harness is built switches every dispatch to that server; it always
//! wins over local mode:
//!
//! ```no_run
//! use httpharness::{Harness, NoApplication};
//!
//! // HTTPHARNESS_SERVER=http://localhost:3000/app
//! let harness = Harness::<NoApplication>::from_env(None).unwrap();
//! let response = harness.get("/app/status").unwrap();
//! ```
//!
//! Redirect responses are returned as-is, `Location` header intact; the
//! harness never follows them. Network failures surface as
//! [`Error::Transport`] and are never retried.
//!
//! # Context capture
//!
//! [`Harness::context_request`] returns the response together with the
//! per-request context the application reported to its [`ContextHook`]
//! during that one call. It is local-only by definition and fails with
//! [`Error::RemoteModeUnsupported`] before dispatching in remote mode.
//!
//! # Logging
//!
//! The harness emits [`tracing`] events at the dispatch boundaries; enable a
//! subscriber (or the `log` bridge) in your tests to see them.

mod api;
mod common;

pub use api::{
    adapter::{local::LocalDispatcher, remote::RemoteDispatcher, Dispatcher},
    application::{Application, ApplicationError, ContextHook, NoApplication, Transport},
    harness::{Harness, HarnessConfig, Mode, REMOTE_URL_ENV},
};
pub use common::{
    data::{Error, HarnessRequest, HarnessResponse, IntoHarnessRequest},
    http::{Error as HttpClientError, HarnessHttpClient, HttpClient},
};

#[doc(hidden)]
pub use common::util::Join;

pub mod prelude {
    pub use crate::{
        Application, ApplicationError, ContextHook, Error, Harness, HarnessConfig,
        HarnessRequest, HarnessResponse, IntoHarnessRequest, Mode, NoApplication, Transport,
    };
}
