#![deny(missing_docs)]

//! # Resolver Module
//!
//! Turns the raw objects of one operation into resolved contracts.
//!
//! Handles:
//! - Parameter resolution (inline and referenced) with style/explode defaults.
//! - Default and nullability reconciliation for parameters.
//! - Request body and response content resolution per media type.

pub mod body;
pub mod defaults;
pub mod params;
pub mod responses;

pub use body::{BodySpec, MediaSchema};
pub use defaults::{explicit_null, omitted, reconcile};
pub use params::{ContentSchema, ParameterSpec};
pub use responses::{select_response, HeaderSpec, ResponseSpec};
