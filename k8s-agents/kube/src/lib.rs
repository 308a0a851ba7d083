#![warn(clippy::indexing_slicing)]

pub mod error;
pub mod lookup;
pub mod owner;
pub mod retry;
