//! Mock Infrastructure for Testing the Admission Gateway
//!
//! ## Components
//!
//! - `FaultyStore`: wraps a [`MemoryStore`](admit_core::store::MemoryStore) and injects
//!   failures or delays into selected operations and keys
//! - Fixture helpers for seeding sessions, plans and resources
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{FaultyStore, StoreOp};
//!
//! let store = FaultyStore::new().fail(StoreOp::Get, "xtoken_");
//! ```

pub mod faulty_store;

pub use faulty_store::{Fault, FaultyStore, StoreOp};
pub use fixtures::*;
