use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
};

use httpharness::{Dispatcher, HarnessHttpClient, IntoHarnessRequest, RemoteDispatcher};
use url::Url;

// These tests manipulate the process-wide proxy environment, so they live in
// their own test binary instead of alongside the other remote tests.

fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => break,
            Ok(_) => buf.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// A fake forward proxy: records the CONNECT it receives, confirms the
/// tunnel, then answers the tunneled request itself.
fn start_proxy(seen: Arc<Mutex<Vec<String>>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("cannot bind proxy");
    let addr = listener.local_addr().expect("cannot read proxy addr");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            let seen = seen.clone();
            thread::spawn(move || {
                let connect_head = read_head(&mut stream);
                record_request_line(&seen, &connect_head);
                let _ = stream.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n");

                let tunneled_head = read_head(&mut stream);
                record_request_line(&seen, &tunneled_head);
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 7\r\n\r\nproxied");
            });
        }
    });

    addr
}

fn record_request_line(seen: &Mutex<Vec<String>>, head: &str) {
    let line = head.lines().next().unwrap_or("").to_string();
    seen.lock().unwrap().push(line);
}

#[tokio::test]
async fn proxy_from_the_environment_is_honored() {
    let _ = env_logger::builder().is_test(true).try_init();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let proxy_addr = start_proxy(seen.clone());

    // the client reads the variable at construction time
    std::env::set_var("http_proxy", format!("http://{}", proxy_addr));
    let client = Arc::new(HarnessHttpClient::new(None));
    std::env::remove_var("http_proxy");

    // nothing listens on the target port; only the proxy can answer
    let base = Url::parse("http://127.0.0.1:1/app").unwrap();
    let dispatcher = RemoteDispatcher::with_client(base, client);

    let response = dispatcher
        .dispatch("/foo".into_harness_request().unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.body_str(), "proxied");

    let seen = seen.lock().unwrap();
    assert!(
        seen[0].starts_with("CONNECT 127.0.0.1:1"),
        "expected a CONNECT to the target, got: {}",
        seen[0]
    );
    assert!(
        seen[1].starts_with("GET /app/foo HTTP/1.1"),
        "expected the tunneled request, got: {}",
        seen[1]
    );
}

#[tokio::test]
async fn explicitly_configured_proxy_is_used() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let proxy_addr = start_proxy(seen.clone());

    let proxy = format!("http://{}", proxy_addr).parse().unwrap();
    let client = Arc::new(HarnessHttpClient::with_proxy(None, Some(proxy)));
    let dispatcher =
        RemoteDispatcher::with_client(Url::parse("http://127.0.0.1:1/").unwrap(), client);

    let response = dispatcher
        .dispatch("/x".into_harness_request().unwrap())
        .await
        .unwrap();

    assert_eq!(response.body_str(), "proxied");
    assert!(seen.lock().unwrap()[0].starts_with("CONNECT 127.0.0.1:1"));
}
