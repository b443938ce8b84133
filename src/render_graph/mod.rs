//! Render Graph System
//!
//! Passes declare which resources they read and write; the graph derives the
//! execution order from those declarations and the executor owns the textures
//! behind them. Dependencies between passes exist only through declared
//! resources, so any change to ordering or concurrency is checked against them.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
