//! Topic and state names shared by every process of a run.
//!
//! These names are the protocol schema. Every process of a run must agree on
//! them bit for bit.

use rendezvous_sync::Topic;

use crate::role::Role;

use crate::types::FundingRequest;
use crate::types::GenesisBundle;
use crate::types::JoinTransaction;
use crate::types::PeerInfo;
use crate::types::ServiceDescriptor;
use crate::types::ValidatorIdentity;

// ============================================================================
// Topics
// ============================================================================

/// Every validator's identity, collected by the orchestrator.
pub const VALIDATOR_IDENTITIES: Topic<ValidatorIdentity> = Topic::new("validator-identities");

/// The genesis bundle, published once by the orchestrator.
pub const GENESIS: Topic<GenesisBundle> = Topic::new("genesis");

/// One join transaction per validator.
pub const JOIN_TRANSACTIONS: Topic<JoinTransaction> = Topic::new("join-transactions");

/// Validator p2p endpoints for the persistent-peer exchange.
pub const PERSISTENT_PEERS: Topic<PeerInfo> = Topic::new("persistent-peers");

/// Seed node endpoints.
pub const SEED_PEERS: Topic<PeerInfo> = Topic::new("seed-peers");

/// Accounts the orchestrator funds after genesis.
pub const FUNDING_REQUESTS: Topic<FundingRequest> = Topic::new("funding-requests");

/// Validator core endpoints, consumed by bridges.
pub const VALIDATOR_DESCRIPTORS: Topic<ServiceDescriptor> = Topic::new("validator-descriptors");

/// Bridge endpoints, consumed by full nodes and light nodes.
pub const BRIDGE_DESCRIPTORS: Topic<ServiceDescriptor> = Topic::new("bridge-descriptors");

/// Full node endpoints, consumed by light nodes when configured.
pub const FULL_DESCRIPTORS: Topic<ServiceDescriptor> = Topic::new("full-descriptors");

// ============================================================================
// States
// ============================================================================

/// Every instance finished writing its node configuration.
pub const NETWORK_CONFIGURED: &str = "network-configured";

/// Every validator finalized genesis.
pub const GENESIS_READY: &str = "genesis-ready";

/// The orchestrator funded every requested account.
pub const ACCOUNTS_FUNDED: &str = "accounts-funded";

/// An instance is done with the run.
pub const FINISHED: &str = "finished";

/// All state names, for validation at startup.
pub const STATE_NAMES: [&str; 4] = [NETWORK_CONFIGURED, GENESIS_READY, ACCOUNTS_FUNDED, FINISHED];

/// Per-tier `finished` state, e.g. `finished-light`.
///
/// Every instance signals its tier's state alongside [`FINISHED`]. Upstream
/// tiers tear down on these so one tier's signals never count toward
/// another's. The orchestrator belongs to the validator tier.
pub fn finished_state(role: Role) -> String {
    let tier = match role {
        Role::Orchestrator => Role::Validator,
        other => other,
    };
    format!("{FINISHED}-{tier}")
}
