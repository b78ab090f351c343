//! File system module

pub mod interface;

pub use interface::*;
