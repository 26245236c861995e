//! Shared helpers for knowledge validation and fingerprinting.

pub mod validation;
