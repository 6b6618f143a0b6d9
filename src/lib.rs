//! # tap-mux Library / tap-mux 库
//!
//! Merges the TAP output of many independently executed test programs into
//! one well-formed, sequentially numbered TAP document. Targets are script
//! files or npm-style packages whose declared scripts are selected by
//! hierarchical run patterns; all children run concurrently while the
//! merged document strictly follows resolution order.
//!
//! 将许多独立执行的测试程序的 TAP 输出合并为一个格式良好、顺序编号的
//! TAP 文档。目标是脚本文件或 npm 风格的包，其声明的脚本由分层运行
//! 模式选择；所有子进程并发运行，而合并后的文档严格遵循解析顺序。
//!
//! ## Modules / 模块
//!
//! - `core` - Configuration, resolution, parsing and the merge engine
//! - `infra` - Process command construction and file system access
//! - `cli` - Command-line interface
//!
//! - `core` - 配置、解析、TAP 解析和合并引擎
//! - `infra` - 进程命令构造和文件系统访问
//! - `cli` - 命令行接口

pub mod cli;
pub mod core;
pub mod infra;

// Re-export commonly used items
pub use crate::core::config::RunConfig;
pub use crate::core::merge;
pub use crate::core::models;
pub use crate::core::tap;
