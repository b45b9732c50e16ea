//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IWorkforceStore`] - The authoritative record store (storage collaborator)
//! - [`ITokenStore`] - Durable storage for the access/refresh token pair
//! - [`ISyncStateRepository`] - Durable sync cursor and local sync history
//! - [`ISyncTransport`] - Remote sync endpoint (push change set, read history)
//! - [`IConnectivityProbe`] - Reachability probe used by the network monitor

pub mod connectivity;
pub mod storage;
pub mod sync_state_repository;
pub mod token_store;
pub mod transport;

pub use connectivity::{IConnectivityProbe, ProbeResult};
pub use storage::IWorkforceStore;
pub use sync_state_repository::ISyncStateRepository;
pub use token_store::ITokenStore;
pub use transport::ISyncTransport;
