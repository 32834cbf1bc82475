use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    api::{
        adapter::Dispatcher,
        application::{Application, ContextHook, Transport},
    },
    common::{
        data::{Error, HarnessRequest, HarnessResponse},
        wire,
    },
};

/// Executes requests against an in-process application, fully simulating the
/// network boundary with an in-memory [`Transport`].
pub struct LocalDispatcher<A: Application> {
    app: Arc<A>,
}

impl<A: Application> LocalDispatcher<A> {
    pub fn new(app: Arc<A>) -> Self {
        Self { app }
    }

    async fn run(
        &self,
        request: HarnessRequest,
        hook: Option<&ContextHook<A::Context>>,
    ) -> Result<HarnessResponse, Error> {
        let raw = wire::serialize_request(&request);
        tracing::debug!(
            method = %request.method(),
            uri = %request.uri(),
            "dispatching request in-process"
        );

        let mut transport = Transport::new(raw);

        // A handler error drops the partially written transport here.
        self.app
            .handle(&mut transport, hook)
            .await
            .map_err(Error::Handler)?;

        let output = transport.into_output();
        if output.is_empty() {
            return Err(Error::Capture(
                "application wrote no bytes to the transport".to_string(),
            ));
        }

        wire::parse_response(&output)
    }

    /// Dispatches one request with a context hook installed for its duration.
    /// The context is absent when the application never reported one.
    pub(crate) async fn dispatch_captured(
        &self,
        request: HarnessRequest,
    ) -> Result<(HarnessResponse, Option<A::Context>), Error> {
        let hook = ContextHook::new();
        let response = self.run(request, Some(&hook)).await?;
        Ok((response, hook.take()))
    }
}

#[async_trait]
impl<A: Application> Dispatcher for LocalDispatcher<A> {
    async fn dispatch(&self, request: HarnessRequest) -> Result<HarnessResponse, Error> {
        self.run(request, None).await
    }
}
