//! Command implementations: plan, apply, validate, verify, info.

pub mod apply;
pub mod info;
pub mod plan;
pub mod validate;
pub mod verify;
