//! 基础设施模块
//!
//! 封装外部依赖（HTTP client、命令执行、后台任务）

pub mod command;
pub mod detached;
pub mod executor_client;
pub mod github;

pub use command::{CommandError, CommandRunner, SystemCommandRunner};
pub use detached::Detached;
pub use executor_client::InstructionSender;
pub use github::ConfigFetcher;
