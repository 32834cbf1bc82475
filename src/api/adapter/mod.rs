use async_trait::async_trait;

use crate::common::data::{Error, HarnessRequest, HarnessResponse};

pub mod local;
pub mod remote;

/// The seam between the harness and its two dispatch strategies. The harness
/// binds exactly one implementation at construction time.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: HarnessRequest) -> Result<HarnessResponse, Error>;
}
