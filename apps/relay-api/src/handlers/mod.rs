//! Handlers 模块

pub mod health;
pub mod instruments;
pub mod metrics;

pub use health::*;
pub use instruments::*;
pub use metrics::*;
