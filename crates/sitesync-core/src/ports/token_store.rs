//! Token store port
//!
//! Holds the access/refresh token pair. No logic beyond get/set/clear;
//! writes are last-write-wins. Implementations must persist the pair so it
//! survives a process restart (the in-memory adapter is for tests).

use crate::domain::TokenPair;

/// Port trait for durable token storage
pub trait ITokenStore: Send + Sync {
    /// Returns the stored pair, if any
    fn get(&self) -> anyhow::Result<Option<TokenPair>>;

    /// Replaces the stored pair
    fn set(&self, tokens: &TokenPair) -> anyhow::Result<()>;

    /// Removes the stored pair; succeeds when nothing is stored
    fn clear(&self) -> anyhow::Result<()>;
}
