//! Handles to the ledger contracts a channel runs against.

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// One deployed (or yet to be deployed) contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractHandle {
    /// Contract name, e.g. `LibSignatures`.
    pub name: String,
    /// Contract version.
    pub version: String,
    /// Deployed address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Set of contracts a channel uses. Stored as given; never validated here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStore {
    /// Contract handles.
    pub contracts: Vec<ContractHandle>,
}

impl ContractStore {
    /// Looks up a contract by name.
    pub fn get(&self, name: &str) -> Option<&ContractHandle> {
        self.contracts.iter().find(|c| c.name == name)
    }
}
