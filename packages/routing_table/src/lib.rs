//! Bounded pool of recently-heard DHT node contacts.
//!
//! No k-bucket structure: the Sybil node does not need Kademlia lookup
//! accuracy, only a steady rotating supply of targets to pollinate with
//! `find_node` queries. A plain FIFO of bounded size is enough, and a lot
//! simpler to keep lock-free than a bucket tree.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddrV4;

use krpc_protocol::NodeID;
use rand::seq::IteratorRandom;

/// A node contact held in the routing table: its DHT identifier and the
/// UDP address it was last heard from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub id: NodeID,
    pub addr: SocketAddrV4,
}

impl Contact {
    pub fn new(id: NodeID, addr: SocketAddrV4) -> Contact {
        Contact { id, addr }
    }
}

/// FIFO set of contacts keyed by `NodeID`, capped at `capacity` entries.
pub struct RoutingTable {
    capacity: usize,
    order: VecDeque<NodeID>,
    contacts: HashMap<NodeID, Contact>,
}

impl RoutingTable {
    pub fn new(capacity: usize) -> RoutingTable {
        RoutingTable {
            capacity,
            order: VecDeque::with_capacity(capacity),
            contacts: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.len() >= self.capacity
    }

    pub fn contains(&self, id: &NodeID) -> bool {
        self.contacts.contains_key(id)
    }

    /// Inserts a contact, evicting the oldest entry first if the table is
    /// already at capacity. Re-inserting a known `NodeID` refreshes its
    /// address in place without disturbing FIFO order.
    pub fn insert(&mut self, contact: Contact) {
        if let Some(existing) = self.contacts.get_mut(&contact.id) {
            existing.addr = contact.addr;
            return;
        }
        if self.is_full() {
            if let Some(oldest) = self.order.pop_front() {
                self.contacts.remove(&oldest);
            }
        }
        self.order.push_back(contact.id);
        self.contacts.insert(contact.id, contact);
    }

    /// Inserts a contact only if there is room, refreshing an existing
    /// entry's address either way. Used when replenishing the table from
    /// incoming `find_node`/`get_peers` responses: at capacity, newly
    /// learned contacts are dropped rather than displacing an existing
    /// one, so the address distribution the Sybil presents to the swarm
    /// stays stable instead of churning.
    ///
    /// Returns `true` if the contact is now present in the table (either
    /// newly inserted or already known), `false` if it was dropped.
    pub fn insert_if_room(&mut self, contact: Contact) -> bool {
        if let Some(existing) = self.contacts.get_mut(&contact.id) {
            existing.addr = contact.addr;
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.order.push_back(contact.id);
        self.contacts.insert(contact.id, contact);
        true
    }

    /// Returns up to `k` contacts sampled without replacement.
    pub fn sample(&self, k: usize) -> Vec<Contact> {
        let mut rng = rand::thread_rng();
        self.contacts.values().copied().choose_multiple(&mut rng, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn contact(byte: u8, port: u16) -> Contact {
        Contact::new(
            NodeID([byte; 20]),
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, byte), port),
        )
    }

    #[test]
    fn insert_evicts_oldest_when_full() {
        let mut table = RoutingTable::new(2);
        table.insert(contact(1, 6881));
        table.insert(contact(2, 6881));
        table.insert(contact(3, 6881));

        assert_eq!(table.len(), 2);
        assert!(!table.contains(&NodeID([1u8; 20])));
        assert!(table.contains(&NodeID([2u8; 20])));
        assert!(table.contains(&NodeID([3u8; 20])));
    }

    #[test]
    fn insert_refreshes_known_contact_without_evicting() {
        let mut table = RoutingTable::new(2);
        table.insert(contact(1, 6881));
        table.insert(contact(2, 6881));
        table.insert(Contact::new(
            NodeID([1u8; 20]),
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 99), 6882),
        ));

        assert_eq!(table.len(), 2);
        assert!(table.contains(&NodeID([1u8; 20])));
        assert!(table.contains(&NodeID([2u8; 20])));
    }

    #[test]
    fn insert_if_room_drops_new_contacts_when_full() {
        let mut table = RoutingTable::new(1);
        table.insert(contact(1, 6881));

        let accepted = table.insert_if_room(contact(2, 6881));

        assert!(!accepted);
        assert_eq!(table.len(), 1);
        assert!(table.contains(&NodeID([1u8; 20])));
    }

    #[test]
    fn sample_never_returns_more_than_requested() {
        let mut table = RoutingTable::new(10);
        for i in 1..=5u8 {
            table.insert(contact(i, 6881));
        }

        let sampled = table.sample(3);
        assert_eq!(sampled.len(), 3);

        let sampled_all = table.sample(100);
        assert_eq!(sampled_all.len(), 5);
    }
}
