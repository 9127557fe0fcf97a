//! In-memory contact book.

use dashmap::DashMap;
use tracing::debug;

use tandem_core::error::{Result, TandemError};
use tandem_core::types::{Address, ContactRecord, OffChainId};

/// Contacts keyed by alias.
///
/// Safe to share between tasks; lookups never block each other.
#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: DashMap<String, ContactRecord>,
}

impl ContactBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from records, rejecting duplicate aliases.
    pub fn from_records(records: impl IntoIterator<Item = ContactRecord>) -> Result<Self> {
        let book = Self::new();
        for record in records {
            let alias = record.alias.clone();
            if book.insert(record).is_some() {
                return Err(TandemError::ContactError(format!(
                    "duplicate alias '{}'",
                    alias
                )));
            }
        }
        Ok(book)
    }

    /// Adds or replaces a contact, returning the previous record.
    pub fn insert(&self, record: ContactRecord) -> Option<ContactRecord> {
        debug!(alias = %record.alias, address = %record.on_chain_address, "contact stored");
        self.contacts.insert(record.alias.clone(), record)
    }

    /// Removes a contact.
    pub fn remove(&self, alias: &str) -> Option<ContactRecord> {
        self.contacts.remove(alias).map(|(_, record)| record)
    }

    /// Looks up a contact by alias.
    pub fn get(&self, alias: &str) -> Option<ContactRecord> {
        self.contacts.get(alias).map(|r| r.value().clone())
    }

    /// Channel identity of a contact.
    pub fn off_chain_id(&self, alias: &str) -> Option<OffChainId> {
        self.contacts.get(alias).map(|r| r.to_off_chain_id())
    }

    /// Finds the contact holding a ledger address.
    pub fn find_by_address(&self, address: &Address) -> Option<ContactRecord> {
        self.contacts
            .iter()
            .find(|r| r.on_chain_address == *address)
            .map(|r| r.value().clone())
    }

    /// All records, ordered by alias.
    pub fn records(&self) -> Vec<ContactRecord> {
        let mut records: Vec<_> = self.contacts.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.alias.cmp(&b.alias));
        records
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Returns true if the book holds no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
