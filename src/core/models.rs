//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures of the runner: resolved
//! environment descriptors, command specifications, per-command outcomes and
//! the final per-environment results that feed the reports.
//!
//! 此模块定义了运行器的核心数据结构：已解析的环境描述符、
//! 命令规格、每条命令的结果以及供报告使用的最终环境结果。

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

use crate::infra::t;

/// One command of an environment's sequence.
/// A leading `-` on the configuration entry sets `ignore_failure`.
///
/// 环境命令序列中的一条命令。
/// 配置条目的前导 `-` 会设置 `ignore_failure`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The resolved command line. Late-bound placeholders may remain until
    /// the context directory is known.
    pub line: String,
    /// A nonzero exit status is logged but does not fail the environment.
    /// 非零退出状态会被记录，但不会使环境失败。
    pub ignore_failure: bool,
}

/// One `setenv` entry: the name is taken verbatim, the value was
/// interpolated during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvAssignment {
    pub name: String,
    pub value: String,
}

/// A fully resolved environment: every configuration value interpolated,
/// every factor condition applied. Resolution is pure, so equal inputs
/// produce equal descriptors.
///
/// 一个完全解析的环境：所有配置值都已插值，所有因子条件都已应用。
/// 解析是纯函数，相同的输入产生相同的描述符。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvDescriptor {
    /// The environment name as requested.
    pub name: String,
    /// The ordered, deduplicated factor set of the name.
    pub factors: Vec<String>,
    /// Free-form description for listings.
    pub description: String,
    /// Interpreter identity. Part of the context cache key.
    pub interpreter: String,
    /// Working directory for the command sequence.
    pub changedir: PathBuf,
    /// Optional wall-clock budget for the environment, in seconds.
    pub timeout: Option<u64>,
    /// Skip installing the project itself into the context.
    pub skip_install: bool,
    /// Install command template; `{packages}` is substituted late.
    pub install_command: String,
    /// Optional command creating the context, e.g. a venv invocation.
    pub provision_command: String,
    /// Dependency specifications, in accumulation order, duplicates kept.
    pub deps: Vec<String>,
    /// Project extras to request on install.
    pub extras: Vec<String>,
    /// Extra child-process environment variables; they win over inherited
    /// values.
    pub setenv: Vec<EnvAssignment>,
    /// The command sequence, in declaration order.
    pub commands: Vec<CommandSpec>,
    /// Paths of coverage fragments this environment produces.
    pub coverage: Vec<String>,
    /// Per-environment state directory.
    pub envdir: PathBuf,
    /// Scratch directory, recreated empty for every run.
    pub envtmpdir: PathBuf,
}

impl EnvDescriptor {
    /// The content key identifying the isolated context this descriptor
    /// needs: SHA-256 over the interpreter identity and the ordered deps
    /// and extras lists, in 16 hex characters.
    ///
    /// Order is part of the key: installation order can change what ends up
    /// in the context.
    ///
    /// 标识此描述符所需隔离上下文的内容键：对解释器标识以及有序的
    /// deps 和 extras 列表计算 SHA-256，取 16 个十六进制字符。
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.interpreter.as_bytes());
        hasher.update([0x1f]);
        for dep in &self.deps {
            hasher.update(dep.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update([0x1f]);
        for extra in &self.extras {
            hasher.update(extra.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update([0x1f]);
        hasher.update([u8::from(self.skip_install)]);
        let digest = hasher.finalize();
        hex::encode(digest)[..16].to_string()
    }

    /// Whether this environment produces coverage fragments that the merge
    /// step must collect.
    pub fn produces_coverage(&self) -> bool {
        !self.coverage.is_empty()
    }

    /// The declared coverage fragment paths, absolute entries taken as-is
    /// and relative ones anchored at the environment's working directory.
    /// Existence is not checked here.
    ///
    /// 声明的覆盖率片段路径，绝对路径按原样使用，
    /// 相对路径以环境的工作目录为基准。此处不检查是否存在。
    pub fn coverage_paths(&self) -> Vec<PathBuf> {
        self.coverage
            .iter()
            .map(|entry| {
                let path = PathBuf::from(entry);
                if path.is_absolute() {
                    path
                } else {
                    self.changedir.join(path)
                }
            })
            .collect()
    }
}

/// Why an environment failed.
/// 环境失败的原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum FailureReason {
    /// The environment never resolved; nothing was executed for it.
    /// 环境从未完成解析；没有为其执行任何操作。
    Resolution,
    /// Context creation or dependency installation failed.
    /// 上下文创建或依赖安装失败。
    Provision,
    /// A non-ignored command exited with a nonzero status.
    /// 未被忽略的命令以非零状态退出。
    Command,
    /// The environment exceeded its time budget.
    /// 环境超出了其时间预算。
    Timeout,
    /// The invocation was cancelled while this environment was running.
    /// 此环境运行期间，本次调用被取消。
    Cancelled,
}

/// The final state of one command after the sequence ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Succeeded,
    Failed,
    /// Failed, but the command was marked ignore-failure.
    Ignored,
    /// Never ran because an earlier command failed or the run was cancelled.
    Skipped,
}

/// The recorded outcome of one command in an environment's sequence.
/// 环境命令序列中一条命令的记录结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// The command line as executed (late placeholders substituted).
    pub line: String,
    pub status: CommandStatus,
    /// Exit code, `None` when the command never produced one.
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CommandOutcome {
    /// Records a command that never started.
    pub fn skipped(line: &str) -> Self {
        CommandOutcome {
            line: line.to_string(),
            status: CommandStatus::Skipped,
            exit_code: None,
            duration: Duration::default(),
        }
    }
}

/// The final result of one environment.
/// 单个环境的最终结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnvResult {
    /// Provisioning and every non-ignored command succeeded.
    /// 配置和所有未被忽略的命令均成功。
    Passed {
        /// The environment name as requested / 请求的环境名称
        name: String,
        /// Per-command outcomes in sequence order / 按顺序的每条命令结果
        outcomes: Vec<CommandOutcome>,
        /// Combined captured output of the whole run / 整次运行合并捕获的输出
        output: String,
        /// Wall-clock time of the environment pipeline / 环境流水线的墙钟时间
        duration: Duration,
        /// Coverage fragments found after the run / 运行后找到的覆盖率片段
        artifacts: Vec<PathBuf>,
        /// The isolated context was reused from the cache.
        /// 隔离上下文是从缓存中复用的。
        reused_context: bool,
    },
    /// The environment failed; `reason` says in which phase.
    /// 环境失败；`reason` 指明失败发生在哪个阶段。
    Failed {
        name: String,
        outcomes: Vec<CommandOutcome>,
        output: String,
        reason: FailureReason,
        duration: Duration,
        artifacts: Vec<PathBuf>,
    },
    /// The environment never started: missing interpreter with
    /// `skip_missing_interpreters`, or the run was cancelled first.
    /// 环境从未启动：缺少解释器且设置了 `skip_missing_interpreters`，
    /// 或在启动前本次运行已被取消。
    Skipped {
        name: String,
        /// Human-readable reason for the skip / 跳过的可读原因
        detail: String,
    },
}

impl EnvResult {
    /// The environment name this result belongs to.
    pub fn env_name(&self) -> &str {
        match self {
            EnvResult::Passed { name, .. } => name,
            EnvResult::Failed { name, .. } => name,
            EnvResult::Skipped { name, .. } => name,
        }
    }

    /// Whether the result is any kind of failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, EnvResult::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, EnvResult::Skipped { .. })
    }

    /// Whether the environment failed before any command ran.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            EnvResult::Failed {
                reason: FailureReason::Resolution,
                ..
            }
        )
    }

    /// The failure reason, if this result is a failure.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            EnvResult::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The first command that failed the environment, if any.
    /// 使环境失败的第一条命令（如果有）。
    pub fn first_failed_command(&self) -> Option<&CommandOutcome> {
        match self {
            EnvResult::Failed { outcomes, .. } => {
                outcomes.iter().find(|o| o.status == CommandStatus::Failed)
            }
            _ => None,
        }
    }

    /// Gets the status of the result as a localized string for display.
    /// 以本地化字符串形式获取结果状态以供显示。
    pub fn get_status_str(&self, locale: &str) -> String {
        match self {
            EnvResult::Passed { .. } => t!("report.status_passed", locale = locale).to_string(),
            EnvResult::Failed { reason, .. } => match reason {
                FailureReason::Resolution => {
                    t!("report.status_resolution_error", locale = locale).to_string()
                }
                FailureReason::Provision => {
                    t!("report.status_provision_failed", locale = locale).to_string()
                }
                FailureReason::Timeout => t!("report.status_timeout", locale = locale).to_string(),
                FailureReason::Cancelled => {
                    t!("report.status_cancelled", locale = locale).to_string()
                }
                FailureReason::Command => t!("report.status_failed", locale = locale).to_string(),
            },
            EnvResult::Skipped { .. } => t!("report.status_skipped", locale = locale).to_string(),
        }
    }

    /// Gets the appropriate CSS class for the result status.
    pub fn get_status_class(&self) -> &str {
        match self {
            EnvResult::Passed { .. } => "status-Passed",
            EnvResult::Failed { reason, .. } => match reason {
                FailureReason::Timeout => "status-Timeout",
                FailureReason::Resolution => "status-Resolution",
                _ => "status-Failed",
            },
            EnvResult::Skipped { .. } => "status-Skipped",
        }
    }

    /// The captured output, empty for skipped environments.
    /// 捕获的输出，跳过的环境为空。
    pub fn get_output(&self) -> &str {
        match self {
            EnvResult::Passed { output, .. } => output,
            EnvResult::Failed { output, .. } => output,
            EnvResult::Skipped { .. } => "",
        }
    }

    /// Wall-clock duration, `None` for skipped environments.
    pub fn get_duration(&self) -> Option<Duration> {
        match self {
            EnvResult::Passed { duration, .. } => Some(*duration),
            EnvResult::Failed { duration, .. } => Some(*duration),
            EnvResult::Skipped { .. } => None,
        }
    }

    /// Coverage fragments this environment produced.
    pub fn artifacts(&self) -> &[PathBuf] {
        match self {
            EnvResult::Passed { artifacts, .. } => artifacts,
            EnvResult::Failed { artifacts, .. } => artifacts,
            EnvResult::Skipped { .. } => &[],
        }
    }
}

/// Aggregate counts over one invocation's results.
/// 一次调用的结果的聚合计数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_results(results: &[EnvResult]) -> Self {
        let mut summary = RunSummary {
            passed: 0,
            failed: 0,
            skipped: 0,
        };
        for result in results {
            match result {
                EnvResult::Passed { .. } => summary.passed += 1,
                EnvResult::Failed { .. } => summary.failed += 1,
                EnvResult::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }

    /// Whether every environment either passed or was skipped.
    pub fn all_green(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}
