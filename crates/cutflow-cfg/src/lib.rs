#![doc = include_str!("../README.md")]

//! Control-flow graphs for the cutflow encoder.
//!
//! This crate defines procedures as ordered sets of basic blocks over a
//! small guarded-command language, the loop-structure analysis that
//! classifies loop headers, and a bounded concrete interpreter used as
//! the reference semantics in tests.

pub mod cfg;
pub mod interp;
pub mod loops;
