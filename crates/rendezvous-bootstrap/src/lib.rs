//! Genesis bootstrap for the validators of a run.
//!
//! - [`GenesisCoordinator`]: identity collection, genesis build and fan-out,
//!   symmetric join transaction exchange, local finalization
//! - [`exchange_peers`]: capped persistent peer exchange with a seeded,
//!   contiguous peer window
//! - [`serve_funding`] / [`request_funding`]: post-genesis account funding
//! - [`GenesisToolkit`]: the chain-specific seam, with
//!   [`DeterministicGenesisToolkit`] for local runs
//!
//! The orchestrator is the validator with group sequence number 1. It is
//! fixed by rank; membership is known from configuration.

pub mod error;
pub mod funding;
pub mod genesis;
pub mod peers;
pub mod phase;
pub mod pure;
pub mod toolkit;

pub use error::BootstrapError;
pub use error::BoxError;
pub use funding::AccountFunder;
pub use funding::request_funding;
pub use funding::serve_funding;
pub use genesis::FinalizedGenesis;
pub use genesis::GenesisCoordinator;
pub use genesis::GenesisParams;
pub use peers::PeerExchangeParams;
pub use peers::exchange_peers;
pub use phase::BootstrapPhase;
pub use phase::PhaseTracker;
pub use toolkit::DeterministicGenesisToolkit;
pub use toolkit::GenesisToolkit;
