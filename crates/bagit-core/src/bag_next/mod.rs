//! Bag operation bodies. `bag.rs` is the facade; each file here holds the
//! `*_impl` functions for one group of operations.

pub(crate) mod create;
pub(crate) mod inventory;
pub(crate) mod paths;
pub(crate) mod read;
pub(crate) mod save;
pub(crate) mod tags;
