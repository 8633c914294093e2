//! Who the instances of a run are, where they live, and what they exchange.
//!
//! - [`Instance`] and [`Role`]: identity derived from two harness-assigned
//!   sequence numbers
//! - [`addressing`]: pure IPv4 assignment from the global sequence number
//! - [`types`]: JSON wire types published on topics
//! - [`protocol`]: the topic and state names of the protocol

pub mod addressing;
pub mod error;
pub mod protocol;
pub mod role;
pub mod types;

pub use addressing::HOST_OFFSET;
pub use addressing::Subnet;
pub use addressing::assign_address;
pub use error::NetworkError;
pub use role::Instance;
pub use role::ORCHESTRATOR_GROUP_SEQ;
pub use role::Role;
pub use types::AccountAddress;
pub use types::BlockHash;
pub use types::FundingRequest;
pub use types::GenesisBundle;
pub use types::JoinTransaction;
pub use types::PeerInfo;
pub use types::ServiceDescriptor;
pub use types::TrustedCheckpoint;
pub use types::ValidatorAccount;
pub use types::ValidatorIdentity;
