//! Domain layer
//!
//! The two memory tiers and the services that feed and maintain them.

pub mod cache;
pub mod distiller;
pub mod embedding;
pub mod gardener;
pub mod knowledge;
pub mod pipeline;
