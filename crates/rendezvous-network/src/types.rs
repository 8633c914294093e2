//! Values exchanged between the instances of a run.
//!
//! Everything here is serialized as JSON onto a topic, so field names are
//! part of the wire contract. Byte payloads travel as lowercase hex.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::error::InvalidHashSnafu;
use crate::error::NetworkError;
use crate::role::Role;

/// Account address on the test chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountAddress(pub String);

impl AccountAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-byte block hash, hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BlockHash {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|err| {
            InvalidHashSnafu {
                input: s,
                reason: err.to_string(),
            }
            .build()
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            InvalidHashSnafu {
                input: s,
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            }
            .build()
        })?;
        Ok(BlockHash(array))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Block height and hash a joining node must sync from.
///
/// Downstream instances take this verbatim from their upstream's descriptor
/// and never derive it locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustedCheckpoint {
    pub height: u64,
    pub hash: BlockHash,
}

impl fmt::Display for TrustedCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.height, self.hash)
    }
}

/// Endpoint an upstream instance offers to downstream instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Group sequence number of the publisher.
    pub id: u32,
    pub multiaddr: String,
    pub trusted_checkpoint: TrustedCheckpoint,
    /// Number of upstream instances in the publisher's tier.
    pub group_size: u32,
}

impl ServiceDescriptor {
    /// A descriptor with `group_size == 0` cannot be partitioned on.
    pub fn is_well_formed(&self) -> bool {
        self.group_size > 0
    }
}

/// What a validator publishes so the orchestrator can include it in genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorIdentity {
    pub global_seq: u32,
    pub group_seq: u32,
    pub account: AccountAddress,
    pub address: Ipv4Addr,
}

/// A genesis account and its initial stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccount {
    pub address: AccountAddress,
    pub stake: u64,
}

/// Genesis state built once by the orchestrator and fanned out verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBundle {
    pub chain_id: String,
    /// Ordered by the owning validator's global sequence number.
    pub validator_accounts: Vec<ValidatorAccount>,
    #[serde(with = "hex_bytes")]
    pub genesis_bytes: Vec<u8>,
}

impl GenesisBundle {
    /// True if `account` is one of the genesis validators.
    pub fn has_account(&self, account: &AccountAddress) -> bool {
        self.validator_accounts.iter().any(|a| &a.address == account)
    }
}

/// Signed statement joining a validator to the genesis set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTransaction {
    pub signer: AccountAddress,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

/// A peer's p2p endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub global_seq: u32,
    pub node_id: String,
    pub address: Ipv4Addr,
    pub port: u16,
}

impl PeerInfo {
    /// `/ip4/{address}/tcp/{port}/p2p/{node_id}`.
    pub fn multiaddr(&self) -> String {
        format!("/ip4/{}/tcp/{}/p2p/{}", self.address, self.port, self.node_id)
    }
}

/// Request to the orchestrator to fund an account after genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub global_seq: u32,
    pub role: Role,
    pub account: AccountAddress,
}

mod hex_bytes {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint() -> TrustedCheckpoint {
        TrustedCheckpoint {
            height: 1,
            hash: BlockHash([0xab; 32]),
        }
    }

    #[test]
    fn test_block_hash_hex_on_the_wire() {
        let json = serde_json::to_value(checkpoint()).unwrap();
        assert_eq!(json["hash"], "ab".repeat(32));
        let back: TrustedCheckpoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, checkpoint());
    }

    #[test]
    fn test_block_hash_rejects_wrong_length() {
        assert!("abcd".parse::<BlockHash>().is_err());
        assert!("zz".repeat(32).parse::<BlockHash>().is_err());
    }

    #[test]
    fn test_genesis_bytes_hex() {
        let bundle = GenesisBundle {
            chain_id: "test-chain".into(),
            validator_accounts: vec![ValidatorAccount {
                address: AccountAddress("acct1".into()),
                stake: 10,
            }],
            genesis_bytes: vec![1, 2, 255],
        };
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["genesis_bytes"], "0102ff");
        assert!(bundle.has_account(&AccountAddress("acct1".into())));
        assert!(!bundle.has_account(&AccountAddress("acct2".into())));
    }

    #[test]
    fn test_peer_multiaddr() {
        let peer = PeerInfo {
            global_seq: 2,
            node_id: "node-2".into(),
            address: Ipv4Addr::new(10, 42, 1, 2),
            port: 26656,
        };
        assert_eq!(peer.multiaddr(), "/ip4/10.42.1.2/tcp/26656/p2p/node-2");
    }

    #[test]
    fn test_descriptor_well_formed() {
        let mut descriptor = ServiceDescriptor {
            id: 1,
            multiaddr: "/ip4/10.0.1.1/tcp/2121".into(),
            trusted_checkpoint: checkpoint(),
            group_size: 1,
        };
        assert!(descriptor.is_well_formed());
        descriptor.group_size = 0;
        assert!(!descriptor.is_well_formed());
    }
}
