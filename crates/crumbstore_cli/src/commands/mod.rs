//! CLI command implementations.

pub mod add;
pub mod clear;
pub mod dump;
pub mod inspect;
