use std::{
    io::{Cursor, Read, Write},
    sync::Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;

/// Error type applications report from [`Application::handle`]. Propagated to
/// the caller unmodified inside [`Error::Handler`](crate::Error::Handler).
pub type ApplicationError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The contract a target application must expose to be exercised in local
/// mode.
///
/// The harness hands the application a [`Transport`] holding the serialized
/// request bytes, exactly as its transport layer would normally read them
/// from a socket. The application must write a complete HTTP/1.1 response
/// (status line, headers, body) back to the same transport before returning.
///
/// When a [`ContextHook`] is installed, the application reports its live
/// per-request context to it before normal processing continues. What the
/// context *is* belongs to the application: typically a clone or `Arc` of
/// the per-request state it builds during dispatch.
///
/// ```
/// use async_trait::async_trait;
/// use httpharness::{Application, ApplicationError, ContextHook, Transport};
/// use std::io::Write;
///
/// struct Hello;
///
/// #[async_trait]
/// impl Application for Hello {
///     type Context = String;
///
///     async fn handle(
///         &self,
///         transport: &mut Transport,
///         hook: Option<&ContextHook<String>>,
///     ) -> Result<(), ApplicationError> {
///         if let Some(hook) = hook {
///             hook.record("request context".to_string());
///         }
///         transport.write_all(
///             b"HTTP/1.1 200 OK\r\ncontent-length: 6\r\n\r\nhello\n",
///         )?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Application: Send + Sync {
    /// The observable per-request context, reported through a [`ContextHook`]
    /// during [`Harness::context_request`](crate::Harness::context_request).
    type Context: Send + 'static;

    /// Handles exactly one request read from `transport`, writing the full
    /// response back to it. Runs to completion before the dispatcher
    /// continues; one request per call.
    async fn handle(
        &self,
        transport: &mut Transport,
        hook: Option<&ContextHook<Self::Context>>,
    ) -> Result<(), ApplicationError>;
}

/// Placeholder application for harnesses that only ever dispatch remotely.
pub struct NoApplication;

#[async_trait]
impl Application for NoApplication {
    type Context = ();

    async fn handle(
        &self,
        _transport: &mut Transport,
        _hook: Option<&ContextHook<()>>,
    ) -> Result<(), ApplicationError> {
        Err("no local application is configured".into())
    }
}

/// In-memory substitute for the network stream between a client and the
/// application's transport layer.
///
/// Reading yields the serialized request bytes; everything written is
/// captured and parsed into the response after the handler returns. Each
/// dispatch call gets a fresh transport, so a failing handler cannot corrupt
/// a later call: the partially written transport is simply dropped.
pub struct Transport {
    inbound: Cursor<Bytes>,
    outbound: Vec<u8>,
}

impl Transport {
    pub(crate) fn new(request: Bytes) -> Self {
        Self {
            inbound: Cursor::new(request),
            outbound: Vec::new(),
        }
    }

    /// The full serialized request, regardless of how much has been read.
    pub fn request_bytes(&self) -> &[u8] {
        self.inbound.get_ref()
    }

    pub(crate) fn into_output(self) -> Vec<u8> {
        self.outbound
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inbound.read(buf)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Records the per-request context the application reports during a single
/// dispatch. Installed for exactly one call by
/// [`Harness::context_request`](crate::Harness::context_request) and dropped
/// when that call returns, whether it succeeded or failed.
pub struct ContextHook<C> {
    slot: Mutex<Option<C>>,
}

impl<C> ContextHook<C> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Stores the context for the current dispatch. A dispatch produces one
    /// context; later calls within the same dispatch are ignored.
    pub fn record(&self, context: C) {
        let mut slot = self.slot.lock().expect("context hook lock poisoned");
        if slot.is_none() {
            *slot = Some(context);
        }
    }

    pub(crate) fn take(&self) -> Option<C> {
        self.slot.lock().expect("context hook lock poisoned").take()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transport_reads_request_and_captures_output() {
        let mut transport = Transport::new(Bytes::from_static(b"GET / HTTP/1.1\r\n\r\n"));

        let mut read_back = String::new();
        transport.read_to_string(&mut read_back).unwrap();
        assert_eq!(read_back, "GET / HTTP/1.1\r\n\r\n");

        transport.write_all(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();
        assert_eq!(transport.into_output(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn context_hook_keeps_the_first_recorded_context() {
        let hook = ContextHook::new();
        hook.record("first");
        hook.record("second");
        assert_eq!(hook.take(), Some("first"));
        assert_eq!(hook.take(), None);
    }
}
