//! 业务服务模块

pub mod execution;
pub mod ngrok;
pub mod publisher;

pub use execution::spawn_execution;
pub use ngrok::{TunnelError, TunnelInfo, TunnelLauncher};
pub use publisher::{ConfigPublisher, PublishError};
