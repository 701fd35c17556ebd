#![deny(missing_docs)]

//! # Runtime Module
//!
//! Request-time half of the engine. Everything here is a pure function of the
//! raw input and an immutable [`OperationModel`](crate::OperationModel), so it
//! runs concurrently across requests without coordination.

pub mod body;
pub mod composition;
pub mod deserialize;
pub mod request;

pub use body::project_body;
pub use composition::{Direction, Evaluator};
pub use deserialize::{deserialize, serialize_parameter};
pub use request::RawRequest;
