//! Host port allocation over a bounded range

use crate::error::{RuntimeError, RuntimeResult};
use std::net::{Ipv4Addr, TcpListener};

/// Probes an inclusive port range for a free port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAllocator {
    start: u16,
    end: u16,
}

impl PortAllocator {
    /// Range `start..=end`
    #[inline]
    #[must_use]
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// First port in range
    #[inline]
    #[must_use]
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Last port in range
    #[inline]
    #[must_use]
    pub fn end(&self) -> u16 {
        self.end
    }

    /// First port accepted by `is_free`, visiting each port at most once
    ///
    /// # Errors
    /// - `RuntimeError::PortExhausted` if no port qualifies
    pub fn probe(&self, mut is_free: impl FnMut(u16) -> bool) -> RuntimeResult<u16> {
        (self.start..=self.end)
            .find(|port| is_free(*port))
            .ok_or(RuntimeError::PortExhausted {
                start: self.start,
                end: self.end,
            })
    }

    /// First port that can be bound on all interfaces, skipping `reserved`
    ///
    /// # Errors
    /// - `RuntimeError::PortExhausted` if every port is taken
    pub fn allocate(&self, reserved: &[u16]) -> RuntimeResult<u16> {
        self.probe(|port| !reserved.contains(&port) && Self::bindable(port))
    }

    fn bindable(port: u16) -> bool {
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(3001, 3009)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_returns_first_free_port() {
        let ports = PortAllocator::new(4000, 4004);
        let port = ports.probe(|p| p >= 4002).unwrap();
        assert_eq!(port, 4002);
    }

    #[test]
    fn probe_is_bounded() {
        let ports = PortAllocator::new(4000, 4004);
        let mut visited = 0;
        let result = ports.probe(|_| {
            visited += 1;
            false
        });
        assert_eq!(
            result,
            Err(RuntimeError::PortExhausted {
                start: 4000,
                end: 4004
            })
        );
        assert_eq!(visited, 5);
    }

    #[test]
    fn allocate_skips_ports_in_use() {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let busy = listener.local_addr().unwrap().port();
        let ports = PortAllocator::new(busy, busy);
        assert!(matches!(
            ports.allocate(&[]),
            Err(RuntimeError::PortExhausted { .. })
        ));
    }

    #[test]
    fn allocate_skips_reserved_ports() {
        let ports = PortAllocator::new(4100, 4100);
        assert!(ports.allocate(&[4100]).is_err());
    }
}
