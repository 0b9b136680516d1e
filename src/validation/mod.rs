//! Dataset validation against the column schema

mod validator;

pub use validator::{DataValidator, ValidationMode, ValidationReport, Violation};
