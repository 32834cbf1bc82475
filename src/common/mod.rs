pub mod data;
pub mod http;
pub(crate) mod runtime;
pub mod util;
pub(crate) mod wire;
