//! # Environment Execution Module / 环境执行模块
//!
//! This module runs one environment end to end: provision its isolated
//! context, then run the command sequence strictly in order. A failed
//! command skips the rest unless it was marked ignore-failure; the
//! per-environment timeout and the invocation-wide cancellation token both
//! stop the sequence and kill the running child.
//!
//! 此模块端到端地运行一个环境：先配置其隔离上下文，
//! 然后严格按顺序运行命令序列。除非命令被标记为忽略失败，
//! 否则失败的命令会跳过其余命令；按环境的超时和整个调用范围的
//! 取消令牌都会停止序列并终止正在运行的子进程。

use colored::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::errors::RunnerError;
use crate::core::interp::LateBindings;
use crate::core::models::{
    CommandOutcome, CommandSpec, CommandStatus, EnvDescriptor, EnvResult, FailureReason,
};
use crate::core::provision::{IsolatedContext, Provisioner};
use crate::infra::{command, fs, t};

/// Runs one environment: provision, then the command sequence.
/// The descriptor's `timeout` bounds the whole pipeline.
///
/// # Arguments
/// * `descriptor` - The resolved environment to run
/// * `provisioner` - Shared context provisioner of this invocation
/// * `stop_token` - Invocation-wide cancellation
///
/// # Returns
/// The final `EnvResult`; errors are folded into it, never propagated.
///
/// 运行一个环境：先配置，然后执行命令序列。
/// 描述符的 `timeout` 约束整条流水线。
pub async fn run_environment(
    descriptor: &EnvDescriptor,
    provisioner: &Provisioner,
    stop_token: &CancellationToken,
) -> EnvResult {
    if stop_token.is_cancelled() {
        return EnvResult::Skipped {
            name: descriptor.name.clone(),
            detail: t!("exec.skipped_cancelled").to_string(),
        };
    }

    let timeout = descriptor.timeout.map(Duration::from_secs);
    let pipeline = run_environment_inner(descriptor, provisioner, stop_token);

    if let Some(limit) = timeout {
        match tokio::time::timeout(limit, pipeline).await {
            Ok(result) => result,
            Err(_) => {
                println!(
                    "{}",
                    t!(
                        "exec.env_timeout",
                        name = descriptor.name,
                        timeout = limit.as_secs()
                    )
                    .red()
                );
                let error = RunnerError::TimeoutExceeded {
                    env: descriptor.name.clone(),
                    secs: limit.as_secs(),
                };
                EnvResult::Failed {
                    name: descriptor.name.clone(),
                    outcomes: Vec::new(),
                    output: error.to_string(),
                    reason: FailureReason::Timeout,
                    duration: limit,
                    artifacts: collect_artifacts(descriptor),
                }
            }
        }
    } else {
        pipeline.await
    }
}

async fn run_environment_inner(
    descriptor: &EnvDescriptor,
    provisioner: &Provisioner,
    stop_token: &CancellationToken,
) -> EnvResult {
    let start = Instant::now();
    let name = descriptor.name.clone();

    println!("{}", t!("exec.starting_env", name = name).blue());

    let provisioned = match provisioner.provision(descriptor, stop_token).await {
        Ok(provisioned) => provisioned,
        Err(RunnerError::MissingInterpreter { interpreter, .. })
            if provisioner.skips_missing_interpreters() =>
        {
            println!(
                "{}",
                t!(
                    "exec.skipped_missing_interpreter",
                    name = name,
                    interpreter = interpreter
                )
                .yellow()
            );
            return EnvResult::Skipped {
                name,
                detail: t!("exec.skipped_missing_interpreter_detail", interpreter = interpreter)
                    .to_string(),
            };
        }
        Err(error) => {
            let reason = if stop_token.is_cancelled() {
                FailureReason::Cancelled
            } else {
                FailureReason::Provision
            };
            println!("{}", t!("exec.provision_failed", name = name).red());
            return EnvResult::Failed {
                name,
                outcomes: descriptor
                    .commands
                    .iter()
                    .map(|spec| CommandOutcome::skipped(&spec.line))
                    .collect(),
                output: error.to_string(),
                reason,
                duration: start.elapsed(),
                artifacts: Vec::new(),
            };
        }
    };

    if let Err(e) = prepare_env_dirs(descriptor) {
        return EnvResult::Failed {
            name,
            outcomes: Vec::new(),
            output: format!("{:#}", e),
            reason: FailureReason::Provision,
            duration: start.elapsed(),
            artifacts: Vec::new(),
        };
    }

    let late = LateBindings {
        ctxdir: provisioned.context.dir.clone(),
        envbindir: provisioned.context.bin_dir.clone(),
        packages: String::new(),
    };

    let mut output = provisioned.output.clone();
    let mut outcomes = Vec::with_capacity(descriptor.commands.len());
    let mut failure: Option<FailureReason> = None;

    for spec in &descriptor.commands {
        if failure.is_some() {
            outcomes.push(CommandOutcome::skipped(&spec.line));
            continue;
        }
        if stop_token.is_cancelled() {
            failure = Some(FailureReason::Cancelled);
            outcomes.push(CommandOutcome::skipped(&spec.line));
            continue;
        }

        let (outcome, chunk, was_cancelled) = run_command(
            descriptor,
            &provisioned.context,
            provisioner.workdir(),
            spec,
            &late,
            stop_token,
        )
        .await;
        output.push_str(&chunk);

        match outcome.status {
            CommandStatus::Failed => {
                failure = Some(if was_cancelled {
                    FailureReason::Cancelled
                } else {
                    FailureReason::Command
                });
            }
            CommandStatus::Ignored => {
                println!(
                    "{}",
                    t!(
                        "exec.ignored_failure",
                        name = name,
                        code = outcome.exit_code.unwrap_or(-1)
                    )
                    .yellow()
                );
            }
            _ => {}
        }
        outcomes.push(outcome);
    }

    let duration = start.elapsed();
    let artifacts = collect_artifacts(descriptor);
    write_env_log(descriptor, provisioner, &output, failure.is_some());

    match failure {
        None => {
            println!(
                "{}",
                t!(
                    "exec.env_passed",
                    name = name,
                    duration = format!("{:.2}", duration.as_secs_f64())
                )
                .green()
            );
            EnvResult::Passed {
                name,
                outcomes,
                output,
                duration,
                artifacts,
                reused_context: provisioned.reused,
            }
        }
        Some(reason) => {
            println!(
                "{}",
                t!(
                    "exec.env_failed",
                    name = name,
                    duration = format!("{:.2}", duration.as_secs_f64())
                )
                .red()
            );
            EnvResult::Failed {
                name,
                outcomes,
                output,
                reason,
                duration,
                artifacts,
            }
        }
    }
}

/// Runs a single command of the sequence.
async fn run_command(
    descriptor: &EnvDescriptor,
    context: &IsolatedContext,
    workdir: &std::path::Path,
    spec: &CommandSpec,
    late: &LateBindings,
    stop_token: &CancellationToken,
) -> (CommandOutcome, String, bool) {
    let line = late.substitute(&spec.line);
    let command_log = format!("{} {}\n", t!("exec.command_prefix").blue(), line);
    let start = Instant::now();

    let failed = |message: String| {
        (
            CommandOutcome {
                line: line.clone(),
                status: CommandStatus::Failed,
                exit_code: None,
                duration: start.elapsed(),
            },
            format!("{}{}\n", command_log, message),
            false,
        )
    };

    let expanded = match shellexpand::full(&line) {
        Ok(expanded) => expanded.to_string(),
        Err(e) => return failed(format!("Failed to expand command: {}", e)),
    };
    let parts = match shlex::split(&expanded) {
        Some(parts) if !parts.is_empty() => parts,
        _ => return failed(format!("Failed to parse command: {}", expanded)),
    };

    let mut cmd = tokio::process::Command::new(&parts[0]);
    cmd.args(&parts[1..])
        .current_dir(&descriptor.changedir)
        .kill_on_drop(true);
    cmd.env("PATH", command::prepend_to_path(&context.bin_dir))
        .env("FACTOR_ENV_NAME", &descriptor.name)
        .env("FACTOR_ENV_DIR", &descriptor.envdir)
        .env("FACTOR_WORK_DIR", workdir)
        .env("FACTOR_CTX_DIR", &context.dir);
    // The descriptor's env table is applied last, so it wins over the
    // inherited and runner-provided values.
    // 描述符的环境变量表最后应用，因此它优先于继承值和运行器提供的值。
    for assign in &descriptor.setenv {
        cmd.env(&assign.name, &assign.value);
    }

    let (status_res, captured, was_cancelled) =
        command::spawn_and_capture(cmd, Some(stop_token)).await;
    let duration = start.elapsed();
    let chunk = format!("{}{}", command_log, captured);

    match status_res {
        Ok(status) => {
            let exit_code = status.code();
            let status = if status.success() {
                CommandStatus::Succeeded
            } else if spec.ignore_failure && !was_cancelled {
                CommandStatus::Ignored
            } else {
                CommandStatus::Failed
            };
            (
                CommandOutcome {
                    line,
                    status,
                    exit_code,
                    duration,
                },
                chunk,
                was_cancelled,
            )
        }
        Err(e) => (
            CommandOutcome {
                line: line.clone(),
                status: CommandStatus::Failed,
                exit_code: None,
                duration,
            },
            format!("{}Failed to spawn command: {}\n", chunk, e),
            was_cancelled,
        ),
    }
}

/// Creates the per-environment directories; the scratch directory starts
/// empty on every run.
fn prepare_env_dirs(descriptor: &EnvDescriptor) -> anyhow::Result<()> {
    fs::ensure_dir(&descriptor.envdir)?;
    fs::fresh_dir(&descriptor.envtmpdir)?;
    fs::ensure_dir(&descriptor.envdir.join("log"))?;
    Ok(())
}

/// Coverage fragments that exist on disk after the run.
fn collect_artifacts(descriptor: &EnvDescriptor) -> Vec<PathBuf> {
    descriptor
        .coverage_paths()
        .into_iter()
        .filter(|path| path.exists())
        .collect()
}

/// Persists the combined output under `{envdir}/log/`; failed runs also get
/// a copy under `{workdir}/errors/{envname}/` for post-mortem.
/// 将合并输出持久化到 `{envdir}/log/` 下；失败的运行还会在
/// `{workdir}/errors/{envname}/` 下保留一份副本以供事后分析。
fn write_env_log(
    descriptor: &EnvDescriptor,
    provisioner: &Provisioner,
    output: &str,
    failed: bool,
) {
    let log_dir = descriptor.envdir.join("log");
    if let Err(e) = std::fs::write(log_dir.join("output.log"), output) {
        eprintln!("Failed to write environment log: {}", e);
        return;
    }
    if failed {
        let errors_dir = provisioner.workdir().join("errors").join(&descriptor.name);
        if let Err(e) = fs::fresh_dir(&errors_dir)
            .and_then(|_| fs::copy_dir_all(&log_dir, &errors_dir))
        {
            eprintln!("Failed to preserve failure logs: {:#}", e);
        }
    }
}
