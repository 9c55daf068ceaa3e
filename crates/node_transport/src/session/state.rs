//! # Session Table
//!
//! Fixed-capacity table of connected sessions, enforcing the node-wide
//! and per-source-address session limits from the transport session
//! layer design.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use crate::session::connection::{ClientConnection, ConnectionId, ConnectionState};

/// Maximum concurrent sessions accepted by one node.
pub const MAX_SESSIONS: usize = 1000;

/// Maximum concurrent sessions accepted from a single source address.
pub const MAX_SESSIONS_PER_IP: usize = 5;

/// Reasons a new session may be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The node already holds `MAX_SESSIONS` active sessions.
    #[error("session table full ({MAX_SESSIONS} active)")]
    TableFull,
    /// The source address already holds `MAX_SESSIONS_PER_IP` sessions.
    #[error("source address already has {MAX_SESSIONS_PER_IP} active sessions")]
    PerAddressLimitExceeded,
}

/// Holds every active `ClientConnection`, indexed by id and by address.
pub struct SessionTable {
    slots: Vec<Option<ClientConnection>>,
    by_addr: HashMap<SocketAddr, ConnectionId>,
    per_ip_count: HashMap<IpAddr, usize>,
    next_id: u32,
}

impl SessionTable {
    /// Creates an empty table sized for `capacity` sessions (capped at `MAX_SESSIONS`).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_SESSIONS);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            by_addr: HashMap::new(),
            per_ip_count: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of currently active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.by_addr.len()
    }

    /// Admits a new session for `addr` owning `entity_id`, enforcing the
    /// node-wide and per-address limits.
    pub fn add_client(&mut self, addr: SocketAddr, entity_id: u32) -> Result<ConnectionId, SessionError> {
        if self.by_addr.contains_key(&addr) {
            return Ok(self.by_addr[&addr]);
        }
        if self.by_addr.len() >= self.slots.len() {
            return Err(SessionError::TableFull);
        }
        let ip = addr.ip();
        let count = self.per_ip_count.get(&ip).copied().unwrap_or(0);
        if count >= MAX_SESSIONS_PER_IP {
            return Err(SessionError::PerAddressLimitExceeded);
        }

        let slot_index = self.slots.iter().position(Option::is_none).ok_or(SessionError::TableFull)?;
        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let mut conn = ClientConnection::new_empty();
        conn.init(id, addr, entity_id);
        self.slots[slot_index] = Some(conn);
        self.by_addr.insert(addr, id);
        self.per_ip_count.insert(ip, count + 1);

        Ok(id)
    }

    /// Removes a session, freeing its slot and per-address accounting.
    pub fn remove_client(&mut self, id: ConnectionId) {
        if let Some(slot) = self.slots.iter_mut().find(|s| matches!(s, Some(c) if c.id == id)) {
            if let Some(conn) = slot.take() {
                self.by_addr.remove(&conn.addr);
                if let Some(count) = self.per_ip_count.get_mut(&conn.addr.ip()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.per_ip_count.remove(&conn.addr.ip());
                    }
                }
            }
        }
    }

    /// Finds a session id by its source address.
    #[must_use]
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.by_addr.get(&addr).copied()
    }

    /// Looks up a connection by address, mutably.
    pub fn find_by_addr_mut(&mut self, addr: SocketAddr) -> Option<&mut ClientConnection> {
        let id = self.by_addr.get(&addr).copied()?;
        self.get_mut(id)
    }

    /// Looks up a connection by id.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&ClientConnection> {
        self.slots.iter().flatten().find(|c| c.id == id)
    }

    /// Looks up a connection by id, mutably.
    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ClientConnection> {
        self.slots.iter_mut().flatten().find(|c| c.id == id)
    }

    /// Iterates over every active connection.
    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.slots.iter().flatten()
    }

    /// Reaps every session idle past `IDLE_TIMEOUT`, returning their ids.
    pub fn reap_idle(&mut self) -> Vec<ConnectionId> {
        let expired: Vec<ConnectionId> = self
            .iter()
            .filter(|c| c.is_idle_timed_out())
            .map(|c| c.id)
            .collect();
        for id in &expired {
            if let Some(conn) = self.get_mut(*id) {
                conn.state = ConnectionState::TimedOut;
            }
            self.remove_client(*id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn test_per_address_limit_enforced() {
        let mut table = SessionTable::new(MAX_SESSIONS);
        for i in 0..MAX_SESSIONS_PER_IP {
            assert!(table.add_client(addr(1000 + i as u16), i as u32).is_ok());
        }
        let result = table.add_client(addr(2000), 99);
        assert_eq!(result, Err(SessionError::PerAddressLimitExceeded));
    }

    #[test]
    fn test_table_full_rejects_new_session() {
        let mut table = SessionTable::new(2);
        let addrs: Vec<SocketAddr> = (0..2)
            .map(|i| format!("10.0.0.{i}:1000").parse().unwrap())
            .collect();
        for (i, a) in addrs.iter().enumerate() {
            assert!(table.add_client(*a, i as u32).is_ok());
        }
        let result = table.add_client("10.0.0.9:1000".parse().unwrap(), 9);
        assert_eq!(result, Err(SessionError::TableFull));
    }

    #[test]
    fn test_remove_frees_both_slot_and_address_accounting() {
        let mut table = SessionTable::new(MAX_SESSIONS);
        let id = table.add_client(addr(1), 0).unwrap();
        assert_eq!(table.active_count(), 1);
        table.remove_client(id);
        assert_eq!(table.active_count(), 0);
        assert!(table.add_client(addr(1), 0).is_ok());
    }
}
