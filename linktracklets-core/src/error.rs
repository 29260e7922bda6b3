//! Extends the shared [`linktracklets_types::LinkError`] taxonomy with
//! `Timeout`, which only ever arises inside the algorithmic core (a
//! per-pair deadline expiring mid-recursion) and is deliberately not part
//! of the shared, fatal taxonomy: it is logged and the driver continues.

use thiserror::Error;

pub use linktracklets_types::{LinkError, LinkResult};

/// A per-pair deadline expired. Not fatal: the driver logs it and moves on
/// to the next `(firstImage, lastImage)` pair.
#[derive(Debug, Error)]
#[error("timed out linking endpoint pair (first image {first}, last image {last})")]
pub struct Timeout {
    pub first: u32,
    pub last: u32,
}
