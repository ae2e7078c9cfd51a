//! # Error Taxonomy Module / 错误分类模块
//!
//! This module defines the typed errors produced while parsing configuration,
//! resolving environments, provisioning contexts and running commands.
//! The error class decides the process exit code.
//!
//! 此模块定义了在解析配置、解析环境、配置上下文和运行命令时
//! 产生的类型化错误。错误类别决定进程退出码。

use thiserror::Error;

/// Exit code when every selected environment succeeded or was skipped.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when provisioning or command execution failed, or the run was cancelled.
pub const EXIT_EXECUTION_FAILURE: u8 = 1;
/// Exit code for configuration and resolution errors.
pub const EXIT_RESOLUTION_FAILURE: u8 = 2;

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

/// All error conditions the runner distinguishes.
/// 运行器区分的所有错误情况。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    /// The configuration file could not be parsed.
    /// 配置文件无法解析。
    #[error("config parse error at {path}:{line}: {message}")]
    ConfigParse {
        path: String,
        line: usize,
        message: String,
    },

    /// An environment name is empty, reserved, or contains illegal characters.
    /// 环境名称为空、是保留名称或包含非法字符。
    #[error("malformed environment name '{name}': {reason}")]
    MalformedEnvironmentName { name: String, reason: String },

    /// A placeholder in a configuration value has no binding.
    /// 配置值中的占位符没有对应的绑定。
    #[error("unresolved placeholder '{{{placeholder}}}' in {location}")]
    UnresolvedPlaceholder {
        placeholder: String,
        location: String,
    },

    /// A resolved value is structurally invalid for its key.
    /// 已解析的值对其键而言在结构上无效。
    #[error("failed to resolve environment '{env}': {message}")]
    Resolution { env: String, message: String },

    /// The interpreter named by the descriptor could not be found on this host.
    /// 描述符指定的解释器在此主机上未找到。
    #[error("interpreter '{interpreter}' for environment '{env}' was not found")]
    MissingInterpreter { env: String, interpreter: String },

    /// Context creation or dependency installation failed.
    /// 上下文创建或依赖安装失败。
    #[error("provisioning failed for environment '{env}': {message}")]
    Provision { env: String, message: String },

    /// A non-ignored command exited with a nonzero status.
    /// 未被忽略的命令以非零状态退出。
    #[error("command `{command}` in environment '{env}' failed with exit code {code}")]
    CommandFailure {
        env: String,
        command: String,
        code: i32,
    },

    /// An environment ran longer than its configured time budget.
    /// 环境的运行时间超出了其配置的时间预算。
    #[error("environment '{env}' exceeded its timeout of {secs}s")]
    TimeoutExceeded { env: String, secs: u64 },
}

impl RunnerError {
    /// Whether this error belongs to the configuration/resolution class,
    /// which maps to [`EXIT_RESOLUTION_FAILURE`] instead of
    /// [`EXIT_EXECUTION_FAILURE`].
    pub fn is_resolution_class(&self) -> bool {
        matches!(
            self,
            RunnerError::ConfigParse { .. }
                | RunnerError::MalformedEnvironmentName { .. }
                | RunnerError::UnresolvedPlaceholder { .. }
                | RunnerError::Resolution { .. }
        )
    }

    /// The process exit code this error maps to.
    /// 此错误对应的进程退出码。
    pub fn exit_code(&self) -> u8 {
        if self.is_resolution_class() {
            EXIT_RESOLUTION_FAILURE
        } else {
            EXIT_EXECUTION_FAILURE
        }
    }
}
