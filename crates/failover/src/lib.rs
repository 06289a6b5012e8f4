//! # Failover
//!
//! Issue one remote call against a preference-ordered list of server
//! addresses, with a per-call timeout, a fixed retry budget and connections
//! pooled per address.
//!
//! The first address that accepts a connection owns the call: failures after
//! that point are retried against it and never fall through to the next
//! candidate.
//!
//! ## Example
//!
//! ```no_run
//! use failover::{ConnectionPool, HttpConnector, HttpGetStub, RpcOptions, call};
//!
//! let pool = ConnectionPool::new(HttpConnector);
//! let opts = RpcOptions::from_list("10.0.0.1:6700,10.0.0.2:6700");
//! let status = call(&opts, &pool, &HttpGetStub::new("/vars/mds_status"))?;
//! println!("{}", status.body);
//! # Ok::<(), failover::RpcError>(())
//! ```

mod call;
mod error;
mod http;
mod pool;

pub use call::{LogCallback, RetryCallback, RpcOptions, RpcStub, call, call_with_callback};
pub use error::{RpcError, StubError};
pub use http::{HttpConnector, HttpGetStub, HttpResponse, HttpSession};
pub use pool::{ConnectionPool, Connector, TcpConnector};
