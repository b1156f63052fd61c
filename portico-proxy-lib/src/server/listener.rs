use std::io::ErrorKind;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::error::{ProxyError, Result};

const BACKLOG: i32 = 1024;

/// Bind a non-blocking listener with `SO_REUSEADDR`.
///
/// `AddrInUse` is reported as [`ProxyError::PortInUse`].
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    let _ = socket.set_tcp_nodelay(true);

    if let Err(e) = socket.bind(&addr.into()) {
        if e.kind() == ErrorKind::AddrInUse {
            return Err(ProxyError::PortInUse { port: addr.port() });
        }
        return Err(ProxyError::Io(e));
    }
    socket.listen(BACKLOG)?;

    Ok(TcpListener::from_std(socket.into())?)
}
