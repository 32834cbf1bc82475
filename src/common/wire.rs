//! HTTP/1.1 wire codec for the substitute transport: serializes a
//! [`HarnessRequest`](crate::common::data::HarnessRequest) into the bytes an
//! application transport layer would normally read from a socket, and parses
//! the bytes the application wrote back into a response.

use bytes::Bytes;
use http::{
    header::{HeaderName, HeaderValue, CONTENT_LENGTH, HOST},
    HeaderMap, StatusCode,
};

use crate::common::data::{Error, HarnessRequest, HarnessResponse};

const MAX_RESPONSE_HEADERS: usize = 64;

/// Serializes the request into status-line + headers + body wire shape.
///
/// A `Host` header is always present: an explicit header wins, then the
/// request URI's authority, then `localhost` for host-less requests.
pub(crate) fn serialize_request(req: &HarnessRequest) -> Bytes {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());

    let body = req.body().map(|b| b.as_ref()).unwrap_or(&[]);

    let mut buf = Vec::with_capacity(256 + body.len());
    buf.extend_from_slice(format!("{} {} HTTP/1.1\r\n", req.method(), path_and_query).as_bytes());
    buf.extend_from_slice(format!("host: {}\r\n", host).as_bytes());

    for (name, value) in req.headers() {
        if *name == HOST {
            continue;
        }
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    if !body.is_empty() && !req.headers().contains_key(CONTENT_LENGTH) {
        buf.extend_from_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
    }

    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);

    Bytes::from(buf)
}

/// Parses the captured transport output back into a response.
///
/// The body is everything after the header terminator, truncated to an
/// advertised `Content-Length` when one is present. A capture holding
/// fewer bytes than advertised is rejected. Chunked transfer encoding is
/// not decoded; in-process applications write plain bodies.
pub(crate) fn parse_response(raw: &[u8]) -> Result<HarnessResponse, Error> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut parsed = httparse::Response::new(&mut header_storage);

    let body_offset = match parsed.parse(raw) {
        Ok(httparse::Status::Complete(offset)) => offset,
        Ok(httparse::Status::Partial) => {
            return Err(Error::InvalidResponse(
                "response head is incomplete (missing header terminator)".to_string(),
            ))
        }
        Err(e) => return Err(Error::InvalidResponse(e.to_string())),
    };

    let code = parsed
        .code
        .ok_or_else(|| Error::InvalidResponse("response has no status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| Error::InvalidResponse(format!("invalid status code {}: {}", code, e)))?;

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    for header in parsed.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| Error::InvalidResponse(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|e| Error::InvalidResponse(format!("invalid header value: {}", e)))?;
        headers.append(name, value);
    }

    let mut body = &raw[body_offset..];
    if let Some(advertised) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if advertised > body.len() {
            return Err(Error::InvalidResponse(format!(
                "captured body holds {} of the advertised {} content-length bytes",
                body.len(),
                advertised
            )));
        }
        if advertised < body.len() {
            body = &body[..advertised];
        }
    }

    Ok(HarnessResponse::new(
        status,
        headers,
        Bytes::copy_from_slice(body),
    ))
}
