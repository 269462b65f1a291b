//! Chain adapters

pub mod eth;
pub mod neo;
