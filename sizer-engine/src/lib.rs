//! Position Sizer Engine Layer
//!
//! Pure computation, deterministic, no I/O.
//! Field values go in, derived risk figures come out.
//!
//! # Usage
//!
//! ```rust
//! use sizer_domain::{FieldId, FieldValue};
//! use sizer_engine::{DerivedNode, Graph};
//!
//! let mut graph = Graph::new([
//!     (FieldId::AccountBalance, FieldValue::new("1000")),
//!     (FieldId::RiskPercent, FieldValue::new("2")),
//! ])
//! .unwrap();
//!
//! assert_eq!(graph.value(DerivedNode::RiskInUsd).as_number(), 20.0);
//!
//! graph.set_field(FieldId::RiskPercent, FieldValue::new("1"));
//! assert_eq!(graph.value(DerivedNode::RiskInUsd).as_number(), 10.0);
//! ```

#![warn(clippy::all)]

mod error;
pub mod formulas;
pub mod graph;

pub use error::{EngineError, EngineResult};
pub use graph::{
    topological_order, Callback, Change, DerivedNode, DerivedSnapshot, Graph, NodeId,
    SubscriptionId,
};
