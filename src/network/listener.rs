//! TCP listener: blocking accept loop. Each accepted socket is handed off
//! to the caller, which spawns a thread for it.

use std::net::{SocketAddr, TcpListener, TcpStream};

use crate::error::{ForgeError, Result};

pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn bind(bind: &str, port: u16) -> Result<Self> {
        let inner = TcpListener::bind((bind, port))
            .map_err(|e| ForgeError::Connection(format!("failed to bind {}:{}: {}", bind, port, e)))?;
        Ok(Listener { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Block until a client connects.
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.inner.accept()?;
        stream.set_nodelay(true)?;
        Ok((stream, addr))
    }
}
