//! This crate contains definitions of the environment that gets stamped into instrumented
//! containers, together with the primitives used to edit a container's env list.
//!
//! Be aware that agents read these variables by name, so any changes made here must be backward
//! compatible.

pub mod checked_env;
pub mod envs;
pub mod list;
pub mod resource;
