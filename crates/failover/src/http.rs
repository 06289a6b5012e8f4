//! HTTP GET against metadata servers.
//!
//! Metadata servers expose their state as plain-text variables over HTTP,
//! e.g. `/vars/mds_status`. A 503 means the server is up but not ready and
//! is retried; any other non-2xx status is final.

use crate::call::RpcStub;
use crate::error::StubError;
use crate::pool::{Connector, TcpConnector};
use std::io;
use std::time::Duration;

/// A reachable server and the agent that talks to it.
///
/// The agent keeps its own keep-alive connections, so pooling the session
/// pools those too.
#[derive(Clone)]
pub struct HttpSession {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSession {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Checks the address accepts TCP, then hands out an HTTP agent for it
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Conn = HttpSession;

    fn connect(&self, address: &str, timeout: Duration) -> io::Result<HttpSession> {
        // fail over on refusal here rather than inside the retry loop
        drop(TcpConnector.connect(address, timeout)?);

        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .http_status_as_error(false)
            .user_agent("clusteradm")
            .build();
        Ok(HttpSession {
            base_url: format!("http://{address}"),
            agent: config.into(),
        })
    }
}

/// Status and body of one GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// GET one path
#[derive(Debug, Clone)]
pub struct HttpGetStub {
    path: String,
}

impl HttpGetStub {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RpcStub<HttpSession> for HttpGetStub {
    type Response = HttpResponse;

    fn invoke(&self, conn: &mut HttpSession, timeout: Duration) -> Result<HttpResponse, StubError> {
        let url = format!("{}{}", conn.base_url, self.path);
        log::trace!("GET {url}");

        let mut response = conn
            .agent
            .get(&url)
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(stub_error)?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(stub_error)?;

        match status {
            200..=299 => Ok(HttpResponse { status, body }),
            503 => Err(StubError::Retryable(format!("HTTP 503 from {}", self.path))),
            status => Err(StubError::Fatal(format!("HTTP {status} from {}", self.path))),
        }
    }
}

/// Connection trouble is a transport error; anything else will not improve
fn stub_error(error: ureq::Error) -> StubError {
    match error {
        ureq::Error::Io(e) => StubError::Transport(e),
        ureq::Error::Timeout(_) => {
            StubError::Transport(io::Error::new(io::ErrorKind::TimedOut, error.to_string()))
        }
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => StubError::Transport(
            io::Error::new(io::ErrorKind::ConnectionRefused, error.to_string()),
        ),
        other => StubError::Fatal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{RpcOptions, call_with_callback};
    use crate::error::RpcError;
    use crate::pool::ConnectionPool;
    use playbook::ErrorCode;
    use std::collections::VecDeque;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Serves canned responses in order, one per request, across however
    /// many connections the client opens
    fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let queue = Arc::clone(&queue);
                thread::spawn(move || answer(stream, &queue));
            }
        });
        address
    }

    fn answer(stream: TcpStream, queue: &Mutex<VecDeque<&'static str>>) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut line = String::new();
        loop {
            // request head
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => return,
                    Ok(_) if line == "\r\n" => break,
                    Ok(_) => {}
                }
            }
            let Some(response) = queue.lock().unwrap().pop_front() else {
                return;
            };
            if writer.write_all(response.as_bytes()).is_err() {
                return;
            }
        }
    }

    /// Accepts connections and never answers
    fn silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                held.push(stream);
            }
        });
        address
    }

    fn opts(address: &str) -> RpcOptions {
        RpcOptions::new(vec![address.to_string()])
            .timeout(Duration::from_secs(2))
            .retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_get_reuses_session() {
        let address = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nleader",
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nfol\r\n5\r\nlower\r\n0\r\n\r\n",
        ]);
        let pool = ConnectionPool::new(HttpConnector);
        let stub = HttpGetStub::new("/vars/mds_status");

        let first = call_with_callback(&opts(&address), &pool, &stub, None).unwrap();
        assert_eq!(first.body, "leader");
        assert_eq!(pool.idle_count(&address), 1);

        let second = call_with_callback(&opts(&address), &pool, &stub, None).unwrap();
        assert_eq!(second.body, "follower");
        assert_eq!(pool.idle_count(&address), 1);
    }

    #[test]
    fn test_no_content_on_keep_alive() {
        let address = serve(vec!["HTTP/1.1 204 No Content\r\n\r\n"]);
        let pool = ConnectionPool::new(HttpConnector);
        let opts = opts(&address).timeout(Duration::from_millis(300));

        let response = call_with_callback(&opts, &pool, &HttpGetStub::new("/"), None).unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_503_is_retried() {
        let address = serve(vec![
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok",
        ]);
        let pool = ConnectionPool::new(HttpConnector);

        let response =
            call_with_callback(&opts(&address), &pool, &HttpGetStub::new("/"), None).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ok");
    }

    #[test]
    fn test_404_is_final() {
        let address = serve(vec!["HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"]);
        let pool = ConnectionPool::new(HttpConnector);

        let err = call_with_callback(&opts(&address), &pool, &HttpGetStub::new("/nope"), None)
            .unwrap_err();
        assert!(matches!(err, RpcError::Status { .. }));
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_slow_server_times_out() {
        let address = silent();
        let pool = ConnectionPool::new(HttpConnector);
        let opts = opts(&address)
            .timeout(Duration::from_millis(100))
            .retry_times(2);

        let err = call_with_callback(&opts, &pool, &HttpGetStub::new("/"), None).unwrap_err();
        assert!(matches!(err, RpcError::RpcFailed { attempts: 2, .. }));
        assert_eq!(err.code(), ErrorCode::Timeout);
    }

    #[test]
    fn test_refused_address_falls_through() {
        // bind then drop to get a port nobody listens on
        let closed = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .to_string();
        let live = serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nlive"]);
        let pool = ConnectionPool::new(HttpConnector);
        let opts = RpcOptions::new(vec![closed, live.clone()]).retry_delay(Duration::from_millis(1));

        let response = call_with_callback(&opts, &pool, &HttpGetStub::new("/"), None).unwrap();
        assert_eq!(response.body, "live");
        assert_eq!(pool.idle_count(&live), 1);
    }

    #[test]
    fn test_error_mapping() {
        assert!(stub_error(ureq::Error::ConnectionFailed).is_transport());
        assert!(stub_error(io::Error::from(io::ErrorKind::ConnectionReset).into()).is_transport());
        assert!(!stub_error(ureq::Error::BadUri("x".into())).is_retryable());
    }
}
