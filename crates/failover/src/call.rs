//! Retry and failover for one remote call.
//!
//! Candidate addresses are tried in order until one accepts a connection.
//! From then on the call is bound to that address: transport errors and
//! retryable statuses are retried there, `retry_delay` apart, until
//! `retry_times` invocations have been made. Later addresses are only
//! reached when connecting fails, never when retries run out.

use crate::error::{RpcError, StubError};
use crate::pool::{ConnectionPool, Connector};
use std::thread;
use std::time::Duration;

/// Where and how hard to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcOptions {
    /// Candidate addresses, most preferred first
    pub addresses: Vec<String>,
    pub connect_timeout: Duration,
    /// Per-invocation timeout handed to the stub
    pub timeout: Duration,
    /// Total invocations allowed on the connected address
    pub retry_times: u32,
    pub retry_delay: Duration,
}

impl RpcOptions {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            connect_timeout: Duration::from_secs(3),
            timeout: Duration::from_millis(500),
            retry_times: 3,
            retry_delay: Duration::from_millis(200),
        }
    }

    /// Parse a comma separated address list such as `10.0.0.1:6700,10.0.0.2:6700`
    pub fn from_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn retry_times(mut self, times: u32) -> Self {
        self.retry_times = times;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Marshals one request type over a connection and reads its response
pub trait RpcStub<Conn> {
    type Response;

    fn invoke(&self, conn: &mut Conn, timeout: Duration) -> Result<Self::Response, StubError>;
}

/// Notified before each retry
pub trait RetryCallback {
    /// `attempt` is the 1-indexed invocation that just failed
    fn on_retry(&self, address: &str, attempt: u32, max_attempts: u32, error: &StubError);
}

/// Logs retries at warn level
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, address: &str, attempt: u32, max_attempts: u32, error: &StubError) {
        log::warn!("rpc to {address}: attempt {attempt}/{max_attempts} failed: {error}");
    }
}

/// Call with retries logged through [`LogCallback`]
pub fn call<C, S>(
    opts: &RpcOptions,
    pool: &ConnectionPool<C>,
    stub: &S,
) -> Result<S::Response, RpcError>
where
    C: Connector,
    S: RpcStub<C::Conn>,
{
    call_with_callback(opts, pool, stub, Some(&LogCallback))
}

pub fn call_with_callback<C, S>(
    opts: &RpcOptions,
    pool: &ConnectionPool<C>,
    stub: &S,
    callback: Option<&dyn RetryCallback>,
) -> Result<S::Response, RpcError>
where
    C: Connector,
    S: RpcStub<C::Conn>,
{
    let mut last_connect = None;

    for address in &opts.addresses {
        match pool.checkout(address, opts.connect_timeout) {
            Ok(conn) => return call_connected(opts, pool, stub, address, conn, callback),
            Err(e) => {
                log::debug!("connect to {address} failed: {e}");
                last_connect = Some(e);
            }
        }
    }

    match last_connect {
        Some(last) => Err(RpcError::Connect {
            addresses: opts.addresses.clone(),
            last,
        }),
        None => Err(RpcError::NoAddress),
    }
}

/// Retry loop bound to the first address that accepted a connection
fn call_connected<C, S>(
    opts: &RpcOptions,
    pool: &ConnectionPool<C>,
    stub: &S,
    address: &str,
    conn: C::Conn,
    callback: Option<&dyn RetryCallback>,
) -> Result<S::Response, RpcError>
where
    C: Connector,
    S: RpcStub<C::Conn>,
{
    let max_attempts = opts.retry_times.max(1);
    let mut conn = Some(conn);
    let mut last = None;

    for attempt in 1..=max_attempts {
        let outcome = match conn.take() {
            Some(c) => Ok(c),
            None => pool.checkout(address, opts.connect_timeout),
        }
        .map_err(StubError::Transport)
        .and_then(|mut c| match stub.invoke(&mut c, opts.timeout) {
            Ok(response) => Ok((response, c)),
            Err(e) => {
                // a broken connection is dropped here and re-dialed next round
                if !e.is_transport() {
                    conn = Some(c);
                }
                Err(e)
            }
        });

        let error = match outcome {
            Ok((response, c)) => {
                pool.checkin(address, c);
                return Ok(response);
            }
            Err(e) => e,
        };

        if let StubError::Fatal(message) = error {
            if let Some(c) = conn.take() {
                pool.checkin(address, c);
            }
            return Err(RpcError::Status {
                address: address.to_string(),
                message,
            });
        }

        if attempt < max_attempts {
            if let Some(cb) = callback {
                cb.on_retry(address, attempt, max_attempts, &error);
            }
            thread::sleep(opts.retry_delay);
        }
        last = Some(error);
    }

    if let Some(c) = conn {
        pool.checkin(address, c);
    }
    Err(RpcError::RpcFailed {
        address: address.to_string(),
        attempts: max_attempts,
        last: last.unwrap_or_else(|| StubError::Fatal("no attempt made".to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::io;
    use std::sync::Mutex;

    /// Hands out numbered connections; refuses the listed addresses
    #[derive(Default)]
    struct FakeConnector {
        refuse: HashSet<&'static str>,
        dialed: Mutex<Vec<String>>,
    }

    impl FakeConnector {
        fn refusing(addresses: &[&'static str]) -> Self {
            Self {
                refuse: addresses.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn dialed(&self) -> Vec<String> {
            self.dialed.lock().unwrap().clone()
        }
    }

    impl Connector for FakeConnector {
        type Conn = String;

        fn connect(&self, address: &str, _timeout: Duration) -> io::Result<String> {
            self.dialed.lock().unwrap().push(address.to_string());
            if self.refuse.contains(address) {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            Ok(address.to_string())
        }
    }

    /// Fails the first `failures` invocations with the given error kind
    struct Flaky {
        failures: u32,
        calls: Cell<u32>,
        error: fn() -> StubError,
    }

    impl Flaky {
        fn new(failures: u32, error: fn() -> StubError) -> Self {
            Self {
                failures,
                calls: Cell::new(0),
                error,
            }
        }
    }

    impl RpcStub<String> for Flaky {
        type Response = String;

        fn invoke(&self, conn: &mut String, _timeout: Duration) -> Result<String, StubError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(format!("served by {conn}"))
            }
        }
    }

    fn transport() -> StubError {
        StubError::Transport(io::Error::from(io::ErrorKind::ConnectionReset))
    }

    fn unavailable() -> StubError {
        StubError::Retryable("HTTP 503".into())
    }

    fn not_found() -> StubError {
        StubError::Fatal("HTTP 404".into())
    }

    fn opts(addresses: &[&str]) -> RpcOptions {
        RpcOptions::new(addresses.iter().map(|s| (*s).to_string()).collect())
            .retry_times(3)
            .retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_success_after_transport_failures() {
        let pool = ConnectionPool::new(FakeConnector::default());
        let stub = Flaky::new(2, transport);

        let response = call_with_callback(&opts(&["a:1", "b:1"]), &pool, &stub, None).unwrap();

        assert_eq!(response, "served by a:1");
        assert_eq!(stub.calls.get(), 3);
        // every transport failure discards the connection and re-dials
        assert_eq!(pool_dials(&pool), vec!["a:1", "a:1", "a:1"]);
        assert_eq!(pool.idle_count("a:1"), 1);
    }

    #[test]
    fn test_exhausted_retries_never_reach_second_address() {
        let pool = ConnectionPool::new(FakeConnector::default());
        let stub = Flaky::new(u32::MAX, transport);

        let err = call_with_callback(&opts(&["a:1", "b:1"]), &pool, &stub, None).unwrap_err();

        match err {
            RpcError::RpcFailed {
                address, attempts, ..
            } => {
                assert_eq!(address, "a:1");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RpcFailed, got {other:?}"),
        }
        assert_eq!(stub.calls.get(), 3);
        assert!(!pool_dials(&pool).contains(&"b:1".to_string()));
    }

    #[test]
    fn test_connect_failure_falls_through() {
        let pool = ConnectionPool::new(FakeConnector::refusing(&["a:1"]));
        let stub = Flaky::new(0, transport);

        let response = call_with_callback(&opts(&["a:1", "b:1"]), &pool, &stub, None).unwrap();

        assert_eq!(response, "served by b:1");
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_all_addresses_refuse() {
        let pool = ConnectionPool::new(FakeConnector::refusing(&["a:1", "b:1"]));
        let stub = Flaky::new(0, transport);

        let err = call_with_callback(&opts(&["a:1", "b:1"]), &pool, &stub, None).unwrap_err();

        assert!(matches!(err, RpcError::Connect { .. }));
        assert_eq!(stub.calls.get(), 0);
        assert_eq!(err.code(), playbook::ErrorCode::RpcFailed);
    }

    #[test]
    fn test_no_addresses() {
        let pool = ConnectionPool::new(FakeConnector::default());
        let err = call_with_callback(&opts(&[]), &pool, &Flaky::new(0, transport), None).unwrap_err();
        assert!(matches!(err, RpcError::NoAddress));
    }

    #[test]
    fn test_retryable_status_keeps_connection() {
        let pool = ConnectionPool::new(FakeConnector::default());
        let stub = Flaky::new(2, unavailable);

        call_with_callback(&opts(&["a:1"]), &pool, &stub, None).unwrap();

        assert_eq!(stub.calls.get(), 3);
        assert_eq!(pool_dials(&pool), vec!["a:1"]);
    }

    #[test]
    fn test_fatal_status_is_not_retried() {
        let pool = ConnectionPool::new(FakeConnector::default());
        let stub = Flaky::new(1, not_found);

        let err = call_with_callback(&opts(&["a:1", "b:1"]), &pool, &stub, None).unwrap_err();

        assert!(matches!(err, RpcError::Status { .. }));
        assert_eq!(stub.calls.get(), 1);
        assert_eq!(pool.idle_count("a:1"), 1);
    }

    #[test]
    fn test_zero_retry_times_still_calls_once() {
        let pool = ConnectionPool::new(FakeConnector::default());
        let stub = Flaky::new(0, transport);
        call_with_callback(&opts(&["a:1"]).retry_times(0), &pool, &stub, None).unwrap();
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_callback_sees_each_retry() {
        struct Counting(Cell<u32>);
        impl RetryCallback for Counting {
            fn on_retry(&self, _: &str, _: u32, _: u32, _: &StubError) {
                self.0.set(self.0.get() + 1);
            }
        }

        let pool = ConnectionPool::new(FakeConnector::default());
        let stub = Flaky::new(u32::MAX, unavailable);
        let counting = Counting(Cell::new(0));

        let _ = call_with_callback(&opts(&["a:1"]), &pool, &stub, Some(&counting));

        // not after the last attempt
        assert_eq!(counting.0.get(), 2);
    }

    #[test]
    fn test_from_list() {
        let opts = RpcOptions::from_list("10.0.0.1:6700, 10.0.0.2:6700,");
        assert_eq!(opts.addresses, vec!["10.0.0.1:6700", "10.0.0.2:6700"]);
    }

    fn pool_dials(pool: &ConnectionPool<FakeConnector>) -> Vec<String> {
        pool.connector().dialed()
    }
}
