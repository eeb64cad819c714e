//! Route handlers

pub mod alerts;
pub mod readings;
pub mod sessions;
