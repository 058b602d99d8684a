//! Process-level helpers.

pub mod bootstrap;
