//! # Factor Runner Library / Factor Runner 库
//!
//! This library provides the core functionality for the Factor Runner tool,
//! a factor-driven test environment orchestrator: environment names are
//! chains of factors, factor-conditioned configuration rules resolve into
//! concrete environment descriptors, and each descriptor runs its command
//! sequence inside an isolated, cached context.
//!
//! 此库为 Factor Runner 工具提供核心功能，
//! 这是一个因子驱动的测试环境编排器：环境名称是因子链，
//! 因子条件化的配置规则解析为具体的环境描述符，
//! 每个描述符在隔离的缓存上下文中运行其命令序列。
//!
//! ## Modules / 模块
//!
//! - `core` - Factor engine, configuration, resolution and execution
//! - `infra` - Infrastructure services like command execution and file system operations
//! - `reporting` - Run result reporting and visualization
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 因子引擎、配置、解析与执行
//! - `infra` - 基础设施服务，如命令执行和文件系统操作
//! - `reporting` - 运行结果报告和可视化
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use crate::core::config;
pub use crate::core::errors;
pub use crate::core::models;
pub use crate::core::resolver;

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
