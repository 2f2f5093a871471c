#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]

pub mod compare;
pub mod comparison;
pub mod config;
pub mod container;
pub mod distance;
pub mod indiv;
pub mod io;
pub mod marker;
pub mod matrix;
pub mod relatedness;
pub mod relation;
pub mod report;
pub mod session;
pub mod store;
#[cfg(test)]
pub mod tests;
pub mod utils;
