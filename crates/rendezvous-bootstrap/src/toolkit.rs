//! Chain-specific genesis operations.
//!
//! The coordinator decides *when* and *to whom* genesis data moves; a
//! [`GenesisToolkit`] decides what the data is. Real chains plug in their
//! own key and genesis tooling. [`DeterministicGenesisToolkit`] derives
//! everything from blake3 hashes so local runs and tests are reproducible.

use rendezvous_network::AccountAddress;
use rendezvous_network::GenesisBundle;
use rendezvous_network::Instance;
use rendezvous_network::JoinTransaction;
use rendezvous_network::ValidatorAccount;
use rendezvous_network::ValidatorIdentity;
use serde::Serialize;

use crate::error::BootstrapError;
use crate::error::ToolkitSnafu;

/// Key, genesis and join transaction tooling of one chain.
pub trait GenesisToolkit: Send + Sync {
    /// Account controlled by `instance`.
    fn identity_account(&self, instance: &Instance) -> AccountAddress;

    /// Build the genesis bundle from every validator's identity.
    ///
    /// `identities` are distinct and ordered by global sequence number.
    fn build_genesis(
        &self,
        chain_id: &str,
        identities: &[ValidatorIdentity],
        stake: u64,
    ) -> Result<GenesisBundle, BootstrapError>;

    /// Sign the join transaction of `account` against `genesis`.
    fn sign_join_transaction(
        &self,
        account: &AccountAddress,
        genesis: &GenesisBundle,
    ) -> Result<JoinTransaction, BootstrapError>;

    /// True if `tx` is a valid join transaction for `genesis`.
    fn verify_join_transaction(&self, tx: &JoinTransaction, genesis: &GenesisBundle) -> bool;

    /// Produce the final genesis from the bundle and every join transaction.
    ///
    /// `join_transactions` are sorted by signer.
    fn finalize(
        &self,
        genesis: &GenesisBundle,
        join_transactions: &[JoinTransaction],
    ) -> Result<Vec<u8>, BootstrapError>;
}

/// Hash-derived toolkit for local runs.
///
/// Accounts are `rdv1` followed by 40 hex characters of
/// `blake3(namespace, global_seq)`. A join transaction is
/// `blake3(signer, genesis_bytes)`.
#[derive(Debug, Clone)]
pub struct DeterministicGenesisToolkit {
    namespace: String,
}

#[derive(Serialize)]
struct GenesisDocument<'a> {
    chain_id: &'a str,
    validators: &'a [ValidatorAccount],
}

#[derive(Serialize)]
struct FinalDocument {
    genesis_hash: String,
    join_transactions: Vec<String>,
}

impl DeterministicGenesisToolkit {
    /// Toolkit whose accounts are unique to `namespace` (usually the run id).
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn join_payload(signer: &AccountAddress, genesis: &GenesisBundle) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(signer.as_str().as_bytes());
        hasher.update(&genesis.genesis_bytes);
        hasher.finalize().as_bytes().to_vec()
    }
}

impl GenesisToolkit for DeterministicGenesisToolkit {
    fn identity_account(&self, instance: &Instance) -> AccountAddress {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(&instance.global_seq.to_be_bytes());
        let digest = hasher.finalize();
        AccountAddress(format!("rdv1{}", &hex::encode(digest.as_bytes())[..40]))
    }

    fn build_genesis(
        &self,
        chain_id: &str,
        identities: &[ValidatorIdentity],
        stake: u64,
    ) -> Result<GenesisBundle, BootstrapError> {
        if identities.is_empty() {
            return ToolkitSnafu {
                operation: "build genesis",
                reason: "no validator identities",
            }
            .fail();
        }
        let validator_accounts: Vec<ValidatorAccount> = identities
            .iter()
            .map(|identity| ValidatorAccount {
                address: identity.account.clone(),
                stake,
            })
            .collect();
        let genesis_bytes = serde_json::to_vec(&GenesisDocument {
            chain_id,
            validators: &validator_accounts,
        })
        .map_err(|err| {
            ToolkitSnafu {
                operation: "build genesis",
                reason: err.to_string(),
            }
            .build()
        })?;

        Ok(GenesisBundle {
            chain_id: chain_id.to_string(),
            validator_accounts,
            genesis_bytes,
        })
    }

    fn sign_join_transaction(
        &self,
        account: &AccountAddress,
        genesis: &GenesisBundle,
    ) -> Result<JoinTransaction, BootstrapError> {
        if !genesis.has_account(account) {
            return ToolkitSnafu {
                operation: "sign join transaction",
                reason: format!("{account} has no genesis account"),
            }
            .fail();
        }
        Ok(JoinTransaction {
            signer: account.clone(),
            bytes: Self::join_payload(account, genesis),
        })
    }

    fn verify_join_transaction(&self, tx: &JoinTransaction, genesis: &GenesisBundle) -> bool {
        tx.bytes == Self::join_payload(&tx.signer, genesis)
    }

    fn finalize(
        &self,
        genesis: &GenesisBundle,
        join_transactions: &[JoinTransaction],
    ) -> Result<Vec<u8>, BootstrapError> {
        let document = FinalDocument {
            genesis_hash: blake3::hash(&genesis.genesis_bytes).to_hex().to_string(),
            join_transactions: join_transactions.iter().map(|tx| hex::encode(&tx.bytes)).collect(),
        };
        serde_json::to_vec(&document).map_err(|err| {
            ToolkitSnafu {
                operation: "finalize genesis",
                reason: err.to_string(),
            }
            .build()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use rendezvous_network::Role;

    use super::*;

    fn identity(toolkit: &DeterministicGenesisToolkit, seq: u32) -> ValidatorIdentity {
        let instance = Instance::new(seq, seq, Role::Validator);
        ValidatorIdentity {
            global_seq: seq,
            group_seq: seq,
            account: toolkit.identity_account(&instance),
            address: Ipv4Addr::new(10, 0, 1, seq as u8),
        }
    }

    #[test]
    fn test_accounts_unique_per_seq_and_namespace() {
        let a = DeterministicGenesisToolkit::new("run-a");
        let b = DeterministicGenesisToolkit::new("run-b");
        let one = Instance::new(1, 1, Role::Validator);
        let two = Instance::new(2, 2, Role::Validator);
        assert_ne!(a.identity_account(&one), a.identity_account(&two));
        assert_ne!(a.identity_account(&one), b.identity_account(&one));
        assert_eq!(a.identity_account(&one), a.identity_account(&one));
        assert_eq!(a.identity_account(&one).as_str().len(), 44);
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let toolkit = DeterministicGenesisToolkit::new("run");
        let identities: Vec<_> = (1..=4).map(|seq| identity(&toolkit, seq)).collect();
        let first = toolkit.build_genesis("chain", &identities, 100).unwrap();
        let second = toolkit.build_genesis("chain", &identities, 100).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.validator_accounts.len(), 4);
    }

    #[test]
    fn test_join_transaction_verifies_against_its_genesis() {
        let toolkit = DeterministicGenesisToolkit::new("run");
        let identities: Vec<_> = (1..=2).map(|seq| identity(&toolkit, seq)).collect();
        let genesis = toolkit.build_genesis("chain", &identities, 1).unwrap();
        let other = toolkit.build_genesis("other-chain", &identities, 1).unwrap();

        let tx = toolkit.sign_join_transaction(&identities[0].account, &genesis).unwrap();
        assert!(toolkit.verify_join_transaction(&tx, &genesis));
        assert!(!toolkit.verify_join_transaction(&tx, &other));
    }

    #[test]
    fn test_foreign_account_cannot_sign() {
        let toolkit = DeterministicGenesisToolkit::new("run");
        let identities = vec![identity(&toolkit, 1)];
        let genesis = toolkit.build_genesis("chain", &identities, 1).unwrap();
        let stranger = AccountAddress("rdv1stranger".into());
        assert!(toolkit.sign_join_transaction(&stranger, &genesis).is_err());
    }

    #[test]
    fn test_empty_genesis_rejected() {
        let toolkit = DeterministicGenesisToolkit::new("run");
        assert!(toolkit.build_genesis("chain", &[], 1).is_err());
    }
}
