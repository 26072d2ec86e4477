//! Procedural level generation and validation.
//!
//! - `builder`: difficulty-driven level parameters and rhythm flags
//! - `validator`: range checks plus advisory solvability and rating

pub mod builder;
pub mod validator;

pub use builder::{derive_level_seed, generate_level, generate_level_with, rhythm_flags, GeneratedLevel};
pub use validator::{validate_level, validate_level_with, ValidationResult};
