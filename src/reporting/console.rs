//! # Console Reporting Module / 控制台报告模块
//!
//! This module handles the generation and display of run reports in the
//! console. It provides functionality for printing colorful, formatted
//! summaries with internationalization support.
//!
//! 此模块处理控制台中运行报告的生成和显示。
//! 它提供打印彩色格式化摘要的功能，支持国际化。

use colored::*;
use std::path::Path;

use crate::core::errors::RunnerError;
use crate::core::models::{EnvResult, RunSummary};
use crate::infra::t;

/// How many trailing output lines a failure detail block shows.
const OUTPUT_TAIL_LINES: usize = 25;

/// Prints a formatted summary of environment results to the console.
/// Displays a table with status, environment name, duration and a hint at
/// the first failure, followed by a totals line and a pointer to the work
/// directory.
///
/// 在控制台打印格式化的环境结果摘要。
/// 显示一个包含状态、环境名称、持续时间和首个失败提示的表格，
/// 随后是总计行和指向工作目录的提示。
///
/// # Arguments / 参数
/// * `results` - Environment results in request order
///               按请求顺序排列的环境结果
/// * `workdir` - The invocation's working directory root
///               本次调用的工作目录根
/// * `locale` - The language locale to use for messages
///              用于消息的语言区域设置
///
/// # Output Format / 输出格式
/// ```text
/// --- Run Summary ---
///   - Passed           | py311-unit                   |      1.23s
///   - Failed           | py311-lint                   |      0.45s  (ruff check src)
///   - Skipped          | pypy-unit                    |        N/A
/// ```
pub fn print_summary(results: &[EnvResult], workdir: &Path, locale: &str) {
    println!("\n{}", t!("report.summary_banner", locale = locale).bold());

    for result in results {
        let status_str = result.get_status_str(locale);
        let duration_str = result
            .get_duration()
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "N/A".to_string());

        let status_colored = match result {
            EnvResult::Passed { .. } => status_str.green(),
            EnvResult::Failed { .. } => status_str.red(),
            EnvResult::Skipped { .. } => status_str.dimmed(),
        };

        println!(
            "  - {:<18} | {:<28} | {:>10}  {}",
            status_colored,
            result.env_name(),
            duration_str,
            failure_hint(result).dimmed()
        );
    }

    let summary = RunSummary::from_results(results);
    println!(
        "\n{}",
        t!(
            "report.totals",
            locale = locale,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped
        )
    );
    println!(
        "{}",
        t!(
            "report.workdir_pointer",
            locale = locale,
            workdir = workdir.display()
        )
        .dimmed()
    );
}

/// Prints detailed information about failed environments: the failure
/// reason, the first failing command and the tail of the captured output.
/// Returns early when nothing failed.
///
/// 打印失败环境的详细信息：失败原因、第一条失败的命令以及
/// 捕获输出的尾部。没有失败时提前返回。
///
/// # Arguments / 参数
/// * `failures` - The failed environment results, in request order
///                按请求顺序排列的失败环境结果
/// * `locale` - The language locale to use for messages
///              用于消息的语言区域设置
pub fn print_failure_details(failures: &[&EnvResult], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("report.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            t!("report.header_failure", locale = locale).red(),
            result.env_name().cyan()
        );

        if let EnvResult::Failed { reason, .. } = result {
            println!(
                "{}",
                t!(
                    "report.failure_reason",
                    locale = locale,
                    reason = format!("{:?}", reason)
                )
            );
            if let Some(first_failed) = result.first_failed_command() {
                println!(
                    "{}",
                    t!(
                        "report.first_failed_command",
                        locale = locale,
                        command = first_failed.line
                    )
                );
            }
            println!(
                "\n--- {} ---\n",
                t!("report.output_tail", locale = locale).yellow()
            );
            println!("{}", output_tail(result.get_output(), OUTPUT_TAIL_LINES));
            println!("\n{}", "-".repeat(80));
        }
    }
}

/// Prints environments that failed to resolve, before anything runs.
/// 在任何运行开始前，打印解析失败的环境。
pub fn print_resolution_failures(failures: &[(&str, &RunnerError)], locale: &str) {
    if failures.is_empty() {
        return;
    }
    println!(
        "{}",
        t!(
            "report.resolution_failures",
            locale = locale,
            count = failures.len()
        )
        .red()
        .bold()
    );
    for (name, error) in failures {
        println!("  - {}: {}", name.cyan(), error);
    }
}

/// The last `lines` lines of `output`.
fn output_tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// A short hint shown next to a failed row: the first failing command, or
/// the first line of the captured output when no command ran.
fn failure_hint(result: &EnvResult) -> String {
    let hint = match result {
        EnvResult::Failed { .. } => match result.first_failed_command() {
            Some(outcome) => outcome.line.clone(),
            None => result
                .get_output()
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        },
        _ => return String::new(),
    };
    const MAX: usize = 48;
    if hint.chars().count() > MAX {
        let truncated: String = hint.chars().take(MAX).collect();
        format!("({}...)", truncated)
    } else if hint.is_empty() {
        String::new()
    } else {
        format!("({})", hint)
    }
}
