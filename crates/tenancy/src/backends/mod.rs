//! Backend implementations of the outbound contracts.
//!
//! Each backend is gated behind a feature flag.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | `memory` | Process-local store with call counters, for tests and embedding |
//! | PostgreSQL | `postgres` | Advisory locks, schema DDL and `search_path` scoped transactions |

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;
