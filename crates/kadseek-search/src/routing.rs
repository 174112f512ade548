//! Contact candidates for new searches
//!
//! Full routing-table maintenance lives outside this crate. Searches only
//! need a way to ask "which peers are closest to this target", expressed by
//! [`ContactSource`]. [`ContactBook`] is a flat, capped implementation fed
//! from `nodes.dat` and from closer-peer responses nobody consumed.

use kadseek_proto::{Contact, KadId};
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Default number of contacts a [`ContactBook`] holds
pub const DEFAULT_BOOK_CAPACITY: usize = 5000;

/// Source of initial contact candidates for a target
pub trait ContactSource {
    /// Up to `max` contacts, closest to `target` first
    fn closest(&self, target: &KadId, max: usize) -> Vec<Contact>;
}

/// Flat contact set keyed by IP address
#[derive(Debug, Clone)]
pub struct ContactBook {
    contacts: HashMap<Ipv4Addr, Contact>,
    capacity: usize,
}

impl ContactBook {
    /// Create an empty book holding at most `capacity` contacts
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            contacts: HashMap::new(),
            capacity,
        }
    }

    /// Insert or refresh a contact
    ///
    /// Returns `false` when the contact is unroutable, or new while the book
    /// is full.
    pub fn insert(&mut self, contact: Contact) -> bool {
        if !contact.is_routable() {
            return false;
        }
        if let Some(existing) = self.contacts.get_mut(&contact.ip) {
            *existing = contact;
            return true;
        }
        if self.contacts.len() >= self.capacity {
            return false;
        }
        self.contacts.insert(contact.ip, contact);
        true
    }

    /// Insert many contacts, returning how many were accepted
    pub fn extend(&mut self, contacts: impl IntoIterator<Item = Contact>) -> usize {
        contacts
            .into_iter()
            .filter(|c| self.insert(*c))
            .count()
    }

    /// Number of contacts
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether the book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Look up a contact by address
    #[must_use]
    pub fn get(&self, ip: &Ipv4Addr) -> Option<&Contact> {
        self.contacts.get(ip)
    }
}

impl Default for ContactBook {
    fn default() -> Self {
        Self::new(DEFAULT_BOOK_CAPACITY)
    }
}

impl ContactSource for ContactBook {
    fn closest(&self, target: &KadId, max: usize) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = self.contacts.values().copied().collect();
        contacts.sort_by_key(|c| c.id.distance(target));
        contacts.truncate(max);
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(last: u8, first_id_byte: u8) -> Contact {
        let mut id = [0u8; 16];
        id[0] = first_id_byte;
        Contact::new(KadId::from_bytes(id), Ipv4Addr::new(10, 0, 0, last), 4672)
    }

    #[test]
    fn test_closest_ordering() {
        let mut book = ContactBook::default();
        book.extend([contact(1, 0xF0), contact(2, 0x01), contact(3, 0x10)]);

        let closest = book.closest(&KadId::from_bytes([0; 16]), 2);
        assert_eq!(closest.len(), 2);
        assert_eq!(closest[0].ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(closest[1].ip, Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test]
    fn test_capacity_and_refresh() {
        let mut book = ContactBook::new(2);
        assert_eq!(book.extend([contact(1, 1), contact(2, 2), contact(3, 3)]), 2);
        assert_eq!(book.len(), 2);

        // refreshing an existing address is allowed while full
        assert!(book.insert(contact(1, 9)));
        assert_eq!(book.get(&Ipv4Addr::new(10, 0, 0, 1)).unwrap().id.as_bytes()[0], 9);
    }

    #[test]
    fn test_rejects_unroutable() {
        let mut book = ContactBook::default();
        assert!(!book.insert(Contact::new(KadId::random(), Ipv4Addr::UNSPECIFIED, 4672)));
        assert!(!book.insert(Contact::new(KadId::random(), Ipv4Addr::new(1, 2, 3, 4), 0)));
        assert!(book.is_empty());
    }
}
