//! # Core Module / 核心模块
//!
//! The merge pipeline: configuration, target resolution, script matching,
//! TAP parsing, concurrent execution, ordered multiplexing and the
//! aggregation engine.
//!
//! 合并管线：配置、目标解析、脚本匹配、TAP 解析、并发执行、
//! 有序多路复用和聚合引擎。

pub mod config;
pub mod execution;
pub mod merge;
pub mod models;
pub mod mux;
pub mod resolver;
pub mod script;
pub mod tap;

// Re-exports
pub use config::RunConfig;
pub use merge::{merge_tasks, run};
pub use models::RunSummary;
