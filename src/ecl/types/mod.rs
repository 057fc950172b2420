//! Foundational data structures, error types, and the element type table.

pub mod datatype;
pub mod error;
pub mod keyword;
pub mod models;
