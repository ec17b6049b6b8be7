#![doc = include_str!("../README.md")]

//! # Layout
//!
//! - [`terms`]: the interned term arena ([`TermFactory`]).
//! - [`store`]: the versioned symbolic store threaded through an edge.
//! - [`opsem`]: the operational-semantics seam and the bundled
//!   [`ExprOpSem`].
//! - [`vcgen`]: symbolic execution of one loop-free cutpoint edge.
//! - [`flatten`]: cutpoint selection, backward path enumeration, and
//!   the two flattening strategies.
//! - [`db`]: the transition-relation database and its export snapshot.

pub mod db;
pub mod flatten;
pub mod opsem;
pub mod store;
pub mod terms;
pub mod vcgen;

pub use db::{DbSnapshot, TransRelationDB, ValueVector};
pub use flatten::{encode_procedure, EncodingSession, FlatteningStrategy, PathEnumerator};
pub use opsem::{EncodeError, ExprOpSem, OpSem, SideCondKind, SideCondition};
pub use store::SymStore;
pub use terms::{Term, TermFactory, TermId, Value};
pub use vcgen::{CpEdge, VcGen};
