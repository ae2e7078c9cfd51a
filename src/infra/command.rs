//! # Command Execution Module / 命令执行模块
//!
//! This module spawns child processes and captures their merged output.
//! The output streams are read line by line and combined into a single
//! string in arrival order; an optional cancellation token kills the child
//! as soon as the invocation is stopped.
//!
//! 此模块派生子进程并捕获其合并的输出。输出流按行读取，
//! 按到达顺序合并为一个字符串；可选的取消令牌会在本次调用停止时
//! 立即终止子进程。

use std::ffi::OsString;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{StreamExt, wrappers::LinesStream};
use tokio_util::sync::CancellationToken;

use crate::infra::t;

/// Builds a `PATH` value with `dir` prepended to the inherited one, so
/// context executables shadow system ones for child processes.
/// 构建一个将 `dir` 前置于继承值的 `PATH`，
/// 使上下文中的可执行文件对子进程优先于系统中的同名文件。
pub fn prepend_to_path(dir: &Path) -> OsString {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![dir.to_path_buf()];
    paths.extend(std::env::split_paths(&current));
    std::env::join_paths(paths).unwrap_or(current)
}

/// Spawns a command and captures its stdout and stderr as one stream.
///
/// # Arguments
/// * `cmd` - The `tokio::process::Command` to execute.
/// * `stop_token` - Cancellation for the whole invocation; when it fires the
///   child receives a kill signal and the function still reaps it.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
/// - Whether the child was killed because the token fired.
///
/// 派生一个命令，并将其 stdout 和 stderr 作为一个流捕获。
/// 当取消令牌触发时，子进程会收到终止信号，本函数仍会回收它。
pub async fn spawn_and_capture(
    mut cmd: tokio::process::Command,
    stop_token: Option<&CancellationToken>,
) -> (std::io::Result<std::process::ExitStatus>, String, bool) {
    let mut child = match cmd
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            // If spawning fails, we return the error and an empty string for the output.
            // 如果派生失败，我们返回错误和空字符串作为输出。
            return (Err(e), String::new(), false);
        }
    };

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            return (
                Err(std::io::Error::other(
                    t!("exec.capture_stdout_failed").to_string(),
                )),
                String::new(),
                false,
            );
        }
    };
    let stderr = match child.stderr.take() {
        Some(stderr) => stderr,
        None => {
            return (
                Err(std::io::Error::other(
                    t!("exec.capture_stderr_failed").to_string(),
                )),
                String::new(),
                false,
            );
        }
    };

    // Merge both pipes into one line stream so the combined output keeps
    // arrival order.
    // 将两个管道合并为一个行流，使合并后的输出保持到达顺序。
    let out_lines = LinesStream::new(BufReader::new(stdout).lines());
    let err_lines = LinesStream::new(BufReader::new(stderr).lines());
    let mut merged = out_lines.merge(err_lines);

    let collector = tokio::spawn(async move {
        let mut combined = String::new();
        while let Some(Ok(line)) = merged.next().await {
            combined.push_str(&line);
            combined.push('\n');
        }
        combined
    });

    let mut was_cancelled = false;
    let mut early_status = None;
    if let Some(token) = stop_token {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                was_cancelled = true;
            }
            status = child.wait() => {
                early_status = Some(status);
            }
        }
    }

    let status = match early_status {
        Some(status) => status,
        None => {
            if was_cancelled {
                let _ = child.start_kill();
            }
            child.wait().await
        }
    };

    // Wait for the reader task so the full output is captured.
    // 等待读取任务完成，以确保捕获全部输出。
    let output = collector.await.unwrap_or_default();

    (status, output, was_cancelled)
}
