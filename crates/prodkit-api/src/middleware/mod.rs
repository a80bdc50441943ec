//! Axum middleware stack.
//!
//! Applied outermost first: [`correlation`], [`tenant`], [`flush`].

pub mod correlation;
pub mod flush;
pub mod tenant;
