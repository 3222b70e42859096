//! Engine modules: deterministic representation, registry, discovery,
//! content-addressed store, memoization.

pub mod discover;
pub mod error;
pub mod events;
pub mod frame;
pub mod memo;
pub mod registry;
pub mod report;
pub mod repr;
pub mod store;
