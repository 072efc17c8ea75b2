use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use crate::utils::error::{AppError, Result};

const LISTEN_BACKLOG: i32 = 1024;

/// Crée un socket d'écoute partageable entre plusieurs processus.
///
/// `SO_REUSEPORT` permet à chaque worker de lier le même port ; le noyau
/// répartit les connexions entrantes entre eux. L'hôte `*` écoute sur
/// toutes les interfaces (IPv6 dual-stack, repli IPv4).
pub fn create_listener(host: &str, port: u16) -> Result<(String, TcpListener)> {
    if host == "*" {
        return create_wildcard_listener(port);
    }

    let str_addr = format!("{}:{}", host, port);
    let addr = str_addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| AppError::Validation(format!("Adresse invalide: {}", str_addr)))?;

    tracing::debug!("Attempting to bind server to {}...", str_addr);
    let listener = bind_shared(addr)?;

    Ok((str_addr, listener))
}

fn create_wildcard_listener(port: u16) -> Result<(String, TcpListener)> {
    let v6: SocketAddr = SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, port));
    match bind_shared(v6) {
        Ok(listener) => return Ok((format!("[::]:{}", port), listener)),
        Err(e) => {
            tracing::warn!("⚠️  Failed to bind IPv6 listener ({}). Attempting IPv4 only.", e);
        }
    }

    let v4: SocketAddr = SocketAddr::from((std::net::Ipv4Addr::UNSPECIFIED, port));
    let listener = bind_shared(v4)?;
    Ok((format!("0.0.0.0:{}", port), listener))
}

fn bind_shared(addr: SocketAddr) -> Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if addr.is_ipv6() {
        if let Err(e) = socket.set_only_v6(false) {
            tracing::warn!("Failed to set dual-stack mode for IPv6 socket: {}", e);
        }
    }

    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;

    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let (addr, listener) = create_listener("127.0.0.1", 0).unwrap();
        assert_eq!(addr, "127.0.0.1:0");
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_two_listeners_share_a_port() {
        let (_, first) = create_listener("127.0.0.1", 0).unwrap();
        let port = first.local_addr().unwrap().port();

        let (_, second) = create_listener("127.0.0.1", port).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);
    }
}
