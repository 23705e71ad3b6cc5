use promexec_types::{PromexecError, PromexecResult};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use tracing::debug;

/// Asks the OS for a free TCP port. The probe listener is closed before returning.
pub fn allocate() -> PromexecResult<u16> {
    allocate_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
}

pub fn allocate_on(addr: SocketAddr) -> PromexecResult<u16> {
    let listener = TcpListener::bind(addr)
        .map_err(|e| PromexecError::Allocation(format!("Failed to bind {}: {}", addr, e)))?;

    let port = listener
        .local_addr()
        .map_err(|e| PromexecError::Allocation(format!("Failed to read bound address: {}", e)))?
        .port();

    drop(listener);
    debug!("Allocated ephemeral port {}", port);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_returns_nonzero_port() {
        let port = allocate().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_allocated_port_is_released() {
        let port = allocate_on(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
        let rebound = TcpListener::bind((Ipv4Addr::LOCALHOST, port));
        assert!(rebound.is_ok(), "port {} should be free again", port);
    }

    #[test]
    fn test_bind_failure_is_allocation_error() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = held.local_addr().unwrap();

        let err = allocate_on(taken).unwrap_err();
        assert!(matches!(err, PromexecError::Allocation(_)));
    }
}
