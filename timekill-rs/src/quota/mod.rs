//! Usage quota enforcement
//!
//! Per-user, per-resource-kind counters scoped to a billing window, with
//! atomic check-and-increment so concurrent requests can never spend past
//! the plan limit.
//!
//! - [`store`]: the counter store abstraction (in-memory and SQLite backends)
//! - [`guard`]: reserve/release semantics on top of the store

pub mod guard;
pub mod store;

pub use guard::{QuotaGuard, Reservation};
pub use store::{CounterStore, MemoryCounterStore, SqliteCounterStore};
