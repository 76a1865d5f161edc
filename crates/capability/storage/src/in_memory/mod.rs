//! 内存存储实现，用于本地演示和测试。

pub mod instrument;
pub mod output;
pub mod seed;

pub use instrument::*;
pub use output::*;
pub use seed::*;
