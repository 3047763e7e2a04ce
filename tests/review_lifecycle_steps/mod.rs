//! Step definitions for review lifecycle scenarios.

mod given;
mod then;
mod when;
pub mod world;
