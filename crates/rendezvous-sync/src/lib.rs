//! Replayable typed topics and monotonic barriers for one run.
//!
//! Both primitives live in a shared [`KeyValueStore`] and are reached through
//! a [`SyncClient`], an explicit handle passed to every component of an
//! instance.
//!
//! ## Topics
//!
//! A [`Topic<T>`] is an append-only log. [`SyncClient::publish`] appends a
//! value and returns its 1-based sequence number. [`SyncClient::subscribe`]
//! opens an independent [`Subscription`] that replays the log from the first
//! entry and then follows new entries. All subscribers observe one total
//! order.
//!
//! ## States
//!
//! A state is a named countdown latch. [`SyncClient::signal_entry`]
//! increments it; [`SyncClient::barrier`] waits until it reaches a target.
//! Participants that give up record a failure with
//! [`SyncClient::signal_failure`], which wakes waiters early.
//!
//! Every blocking call takes a [`RunDeadline`](rendezvous_core::RunDeadline).
//!
//! [`KeyValueStore`]: rendezvous_core::KeyValueStore

mod barrier;
mod client;
pub mod cursor;
pub mod error;
pub mod keys;
pub mod pure;
mod stage;
mod subscription;
pub mod topic;

pub use barrier::BarrierState;
pub use barrier::FailureRecord;
pub use client::SyncClient;
pub use client::SyncConfig;
pub use cursor::Cursor;
pub use error::SyncError;
pub use subscription::Subscription;
pub use topic::Topic;
pub use topic::validate_name;
