//! # HTML Reporting Module / HTML 报告模块
//!
//! This module handles the generation of HTML run reports.
//! It creates a single styled HTML file with summary statistics, a detailed
//! results table and expandable captured output per environment.
//!
//! 此模块处理 HTML 运行报告的生成。
//! 它创建一个带有统计摘要、详细结果表格和每个环境可展开
//! 捕获输出的样式化 HTML 文件。

use anyhow::{Context, Result};
use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::core::models::{EnvResult, RunSummary};
use crate::infra::t;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = include_str!("assets/report.js");

/// Generates a self-contained HTML report from environment results.
///
/// 从环境结果生成自包含的 HTML 报告。
///
/// # Arguments / 参数
/// * `results` - Environment results in request order
///               按请求顺序排列的环境结果
/// * `output_path` - The file path where the HTML report will be saved
///                   保存 HTML 报告的文件路径
/// * `locale` - The locale to use for internationalization
///              用于国际化使用的语言环境
///
/// # Errors / 错误
/// This function will return an error if the output file cannot be written
/// to the specified path.
///
/// 如果无法将输出文件写入指定路径，此函数会返回错误。
pub fn generate_html_report(
    results: &[EnvResult],
    output_path: &Path,
    locale: &str,
) -> Result<()> {
    let markup = render_report(results, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| format!("Failed to write HTML report: {}", output_path.display()))?;
    Ok(())
}

fn render_report(results: &[EnvResult], locale: &str) -> Markup {
    let summary = RunSummary::from_results(results);
    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                p.generated-at {
                    (t!("html_report.generated_at", locale = locale, timestamp = generated_at))
                }
                div.summary-container {
                    div.summary-item {
                        span.count { (summary.total()) }
                        span.label { (t!("html_report.summary.total", locale = locale)) }
                    }
                    div.summary-item {
                        span class="count passed-text" { (summary.passed) }
                        span.label { (t!("html_report.summary.passed", locale = locale)) }
                    }
                    div.summary-item {
                        span class="count failed-text" { (summary.failed) }
                        span.label { (t!("html_report.summary.failed", locale = locale)) }
                    }
                    div.summary-item {
                        span class="count skipped-text" { (summary.skipped) }
                        span.label { (t!("html_report.summary.skipped", locale = locale)) }
                    }
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.header.name", locale = locale)) }
                            th.status-col { (t!("html_report.table.header.status", locale = locale)) }
                            th.duration-cell { (t!("html_report.table.header.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, result) in results.iter().enumerate() {
                            (render_result_row(i, result, locale))
                        }
                    }
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

fn render_result_row(index: usize, result: &EnvResult, locale: &str) -> Markup {
    let duration_str = result
        .get_duration()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());
    let output_id = format!("output-{}", index);
    let has_output = !result.get_output().is_empty();

    html! {
        tr {
            td { (result.env_name()) }
            td.status-col {
                div class=(format!("status-cell {}", result.get_status_class())) {
                    (result.get_status_str(locale))
                }
                @if has_output {
                    div.output-toggle onclick=(format!("toggleOutput('{}')", output_id)) {
                        (t!("html_report.toggle_output", locale = locale))
                    }
                }
            }
            td.duration-cell { (duration_str) }
        }
        @if has_output {
            tr id=(output_id) style="display:none;" {
                td colspan="3" {
                    pre.output-content { (result.get_output()) }
                }
            }
        }
    }
}
