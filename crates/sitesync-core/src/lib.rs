//! SiteSync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Assignment`, `Site`, `User`, `Shift`, `ChangeSet`,
//!   `MobileSyncPayload`, `Conflict`, `NetworkStatus`, `TokenPair`
//! - **Port definitions** - Traits for adapters: `IWorkforceStore`, `ITokenStore`,
//!   `ISyncStateRepository`, `ISyncTransport`, `IConnectivityProbe`
//! - **Configuration** - YAML-backed typed configuration with validation
//! - **Clock** - Injectable wall-clock source for deterministic tests
//!
//! # Architecture
//!
//! The domain module contains pure data types and rules with no I/O.
//! Ports define trait interfaces that adapter crates implement. The
//! [`memory`] module ships in-memory adapters used by tests and by the
//! daemon when it runs against a JSON snapshot.

pub mod clock;
pub mod config;
pub mod domain;
pub mod memory;
pub mod ports;
