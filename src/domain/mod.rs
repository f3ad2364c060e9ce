//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod instruction;
pub mod published;
pub mod tunnel;

// Re-exports for convenience
pub use instruction::{ExecutionReport, WorkInstruction};
pub use published::PublishedConfig;
pub use tunnel::{TunnelEntry, TunnelsResponse};
