//! # Execution Planner Module / 执行计划模块
//!
//! This module turns a configuration and a requested environment selection
//! into an execution plan, then drives the plan with bounded parallelism.
//! Every selected name is resolved up front; names that fail to resolve
//! keep their slot in the plan so the final results stay in request order.
//!
//! 此模块将配置和请求的环境选择转换为执行计划，
//! 然后以有限的并行度驱动该计划。所有选定的名称都预先解析；
//! 解析失败的名称在计划中保留其位置，使最终结果保持请求顺序。

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::config::MatrixConfig;
use crate::core::errors::{RunnerError, RunnerResult};
use crate::core::execution;
use crate::core::factor;
use crate::core::models::{CommandOutcome, EnvDescriptor, EnvResult, FailureReason};
use crate::core::provision::Provisioner;
use crate::core::resolver;

/// One position of the execution plan.
/// 执行计划中的一个位置。
#[derive(Debug, Clone)]
pub enum EnvSlot {
    /// The environment resolved; it is ready to provision and run.
    Ready(EnvDescriptor),
    /// The name never resolved. The slot is kept so the result list stays
    /// aligned with the request order.
    /// 名称从未完成解析。保留该位置以使结果列表与请求顺序对齐。
    Unresolvable { name: String, error: RunnerError },
}

impl EnvSlot {
    pub fn env_name(&self) -> &str {
        match self {
            EnvSlot::Ready(descriptor) => &descriptor.name,
            EnvSlot::Unresolvable { name, .. } => name,
        }
    }
}

/// A fully resolved plan: one slot per selected environment, in request
/// order.
/// 一个完全解析的计划：每个选定环境一个位置，按请求顺序排列。
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub slots: Vec<EnvSlot>,
}

impl ExecutionPlan {
    /// The resolution failures of the plan, in request order.
    pub fn resolution_failures(&self) -> Vec<(&str, &RunnerError)> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                EnvSlot::Unresolvable { name, error } => Some((name.as_str(), error)),
                EnvSlot::Ready(_) => None,
            })
            .collect()
    }

    /// The resolved descriptors of the plan, in request order.
    pub fn descriptors(&self) -> Vec<&EnvDescriptor> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                EnvSlot::Ready(descriptor) => Some(descriptor),
                EnvSlot::Unresolvable { .. } => None,
            })
            .collect()
    }

    /// Whether any resolved environment declares coverage fragments, which
    /// makes the merge step run after all environments complete.
    pub fn produces_coverage(&self) -> bool {
        self.descriptors().iter().any(|d| d.produces_coverage())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The default parallelism: half the logical cores, plus one.
/// 默认并行度：逻辑核心数的一半加一。
pub fn default_jobs() -> usize {
    num_cpus::get() / 2 + 1
}

/// Selects the environment names of this invocation: the `-e` list when
/// given, the configuration's `envlist` otherwise. Both forms are
/// brace-expanded and deduplicated with order preserved.
///
/// # Errors
/// Fails when brace expansion produces a malformed name, or when the
/// selection ends up empty.
///
/// 选择本次调用的环境名称：给定时使用 `-e` 列表，否则使用配置的
/// `envlist`。两种形式都会进行花括号展开并去重，同时保持顺序。
pub fn select_env_names(
    config: &MatrixConfig,
    requested: &[String],
) -> RunnerResult<Vec<String>> {
    let names = if requested.is_empty() {
        config.default_env_names()?
    } else {
        factor::expand_name_list(requested)?
    };
    if names.is_empty() {
        return Err(RunnerError::ConfigParse {
            path: config.config_path.display().to_string(),
            line: 0,
            message: "no environments selected; set 'envlist' under [default] or pass -e"
                .to_string(),
        });
    }
    Ok(names)
}

/// Creates an execution plan for the selection: every name is resolved
/// before anything runs, and failures occupy their slot instead of
/// aborting the siblings.
///
/// # Arguments
/// * `config` - The parsed configuration matrix
/// * `requested` - Environment names from the command line, possibly empty
/// * `posargs` - Positional arguments forwarded to `{posargs}`
///
/// # Returns
/// The plan, or the selection error when no environment could be chosen.
///
/// 为所选环境创建执行计划：所有名称在任何运行开始前解析，
/// 失败的名称占据其位置而不是中止其余环境。
pub fn plan_execution(
    config: &MatrixConfig,
    requested: &[String],
    posargs: &[String],
) -> RunnerResult<ExecutionPlan> {
    let names = select_env_names(config, requested)?;
    let slots = names
        .into_iter()
        .map(|name| match resolver::resolve(config, &name, posargs) {
            Ok(descriptor) => EnvSlot::Ready(descriptor),
            Err(error) => EnvSlot::Unresolvable { name, error },
        })
        .collect();
    Ok(ExecutionPlan { slots })
}

/// Runs every slot of the plan with at most `jobs` environments in flight.
/// Results come back in request order regardless of completion order.
///
/// # Arguments
/// * `plan` - The execution plan to drive
/// * `provisioner` - Shared context provisioner of this invocation
/// * `jobs` - Concurrency bound, clamped to at least one
/// * `stop_token` - Invocation-wide cancellation
///
/// 以最多 `jobs` 个并发环境运行计划中的每个位置。
/// 无论完成顺序如何，结果都按请求顺序返回。
pub async fn run_all(
    plan: ExecutionPlan,
    provisioner: Arc<Provisioner>,
    jobs: usize,
    stop_token: CancellationToken,
) -> Vec<EnvResult> {
    let results = stream::iter(plan.slots.into_iter().map(|slot| {
        let provisioner = provisioner.clone();
        let stop_token = stop_token.clone();
        let slot_name = slot.env_name().to_string();

        tokio::spawn(async move {
            match slot {
                EnvSlot::Ready(descriptor) => {
                    execution::run_environment(&descriptor, &provisioner, &stop_token).await
                }
                EnvSlot::Unresolvable { name, error } => EnvResult::Failed {
                    name,
                    outcomes: Vec::new(),
                    output: error.to_string(),
                    reason: FailureReason::Resolution,
                    duration: Duration::default(),
                    artifacts: Vec::new(),
                },
            }
        })
        .map(move |joined| (slot_name, joined))
    }))
    // `buffered`, not `buffer_unordered`: the stable output order is part
    // of the interface.
    // 使用 `buffered` 而非 `buffer_unordered`：稳定的输出顺序是接口的一部分。
    .buffered(jobs.max(1))
    .collect::<Vec<(String, Result<EnvResult, tokio::task::JoinError>)>>()
    .await;

    results
        .into_iter()
        .map(|(name, joined)| match joined {
            Ok(result) => result,
            Err(e) => EnvResult::Failed {
                name,
                outcomes: vec![CommandOutcome::skipped("<environment task>")],
                output: format!("Critical error during environment execution: {}", e),
                reason: FailureReason::Cancelled,
                duration: Duration::default(),
                artifacts: Vec::new(),
            },
        })
        .collect()
}
