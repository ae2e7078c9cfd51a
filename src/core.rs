//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Factor Runner:
//! the factor engine, configuration and resolution, context provisioning
//! and environment execution.
//!
//! 此模块包含 Factor Runner 的核心功能：
//! 因子引擎、配置与解析、上下文配置以及环境执行。

pub mod config;
pub mod coverage;
pub mod errors;
pub mod execution;
pub mod factor;
pub mod interp;
pub mod models;
pub mod planner;
pub mod provision;
pub mod resolver;

// Re-exports
pub use config::MatrixConfig;
pub use errors::{RunnerError, RunnerResult};
pub use models::{EnvDescriptor, EnvResult, RunSummary};
pub use planner::ExecutionPlan;
