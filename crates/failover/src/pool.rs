//! Per-address connection reuse

use std::collections::HashMap;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Opens connections to an address
pub trait Connector: Send + Sync {
    type Conn: Send;

    fn connect(&self, address: &str, timeout: Duration) -> io::Result<Self::Conn>;
}

/// Plain TCP, trying every resolved socket address in turn
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Conn = TcpStream;

    fn connect(&self, address: &str, timeout: Duration) -> io::Result<TcpStream> {
        let mut last = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{address} did not resolve"),
            )
        }))
    }
}

/// Idle connections keyed by address.
///
/// A connection is checked out for one call and checked back in afterwards.
/// The pool never caps how many connections one address may have.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    idle: Mutex<HashMap<String, Vec<C::Conn>>>,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            idle: Mutex::new(HashMap::new()),
        }
    }

    fn idle(&self) -> MutexGuard<'_, HashMap<String, Vec<C::Conn>>> {
        match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reuse an idle connection to `address` or dial a new one
    pub fn checkout(&self, address: &str, connect_timeout: Duration) -> io::Result<C::Conn> {
        let reused = self.idle().get_mut(address).and_then(Vec::pop);
        match reused {
            Some(conn) => Ok(conn),
            None => {
                log::debug!("dialing {address}");
                self.connector.connect(address, connect_timeout)
            }
        }
    }

    /// Return a healthy connection for later calls
    pub fn checkin(&self, address: &str, conn: C::Conn) {
        self.idle().entry(address.to_string()).or_default().push(conn);
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn idle_count(&self, address: &str) -> usize {
        self.idle().get(address).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingConnector {
        dials: AtomicUsize,
    }

    impl Connector for CountingConnector {
        type Conn = usize;

        fn connect(&self, _address: &str, _timeout: Duration) -> io::Result<usize> {
            Ok(self.dials.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn test_checkin_enables_reuse() {
        let pool = ConnectionPool::new(CountingConnector::default());
        let conn = pool.checkout("a:1", Duration::from_secs(1)).unwrap();
        assert_eq!(pool.idle_count("a:1"), 0);
        pool.checkin("a:1", conn);
        assert_eq!(pool.idle_count("a:1"), 1);

        let again = pool.checkout("a:1", Duration::from_secs(1)).unwrap();
        assert_eq!(again, conn);
        assert_eq!(pool.connector.dials.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_addresses_are_pooled_separately() {
        let pool = ConnectionPool::new(CountingConnector::default());
        let a = pool.checkout("a:1", Duration::from_secs(1)).unwrap();
        pool.checkin("a:1", a);
        let b = pool.checkout("b:1", Duration::from_secs(1)).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.idle_count("a:1"), 1);
    }

    #[test]
    fn test_concurrent_checkouts_open_new_connections() {
        let pool = ConnectionPool::new(CountingConnector::default());
        let first = pool.checkout("a:1", Duration::from_secs(1)).unwrap();
        let second = pool.checkout("a:1", Duration::from_secs(1)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let stream = TcpConnector
            .connect(&address, Duration::from_secs(1))
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap().to_string(), address);
    }
}
