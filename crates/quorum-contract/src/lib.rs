//! # quorum-contract
//!
//! The bridge contract: a deterministic table mapping stable method ids to
//! [`MethodDescriptor`]s.
//!
//! The descriptor type is all a running library needs. With the `generator`
//! feature enabled this crate also provides:
//! - Marker parsing for `#[bridge_api]` traits and `#[bridge]` methods
//! - Type-name erasure used for structural method matching
//! - Validation and deterministic code emission for the generated table
//!
//! ## Stable ids
//!
//! A method either carries an explicit id (`stable_id = "..."`) or gets a
//! derived one:
//! - `ns#name:key` when an overload key is given
//! - `ns#name/arity` in arity-only mode
//! - `ns#name(T1,T2)` otherwise, using erased parameter type names

mod descriptor;

#[cfg(feature = "generator")]
pub mod erase;
#[cfg(feature = "generator")]
pub mod generator;
#[cfg(feature = "generator")]
pub mod markers;

pub use descriptor::MethodDescriptor;

#[cfg(feature = "generator")]
pub use generator::{Contract, ContractError, ContractGenerator, Diagnostic, MethodSpec};
