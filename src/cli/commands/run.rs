//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command for the Factor Runner CLI,
//! which resolves the selected environments and executes their command
//! sequences according to the configuration matrix.
//!
//! 此模块实现了 Factor Runner CLI 的 `run` 命令，
//! 根据配置矩阵解析所选环境并执行其命令序列。

use anyhow::Result;
use colored::*;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs, path::Path, path::PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::{self, MatrixConfig},
        coverage,
        errors::{RunnerError, EXIT_EXECUTION_FAILURE, EXIT_RESOLUTION_FAILURE, EXIT_SUCCESS},
        models::EnvResult,
        planner,
        provision::Provisioner,
    },
    infra::t,
    reporting::{
        console::{print_failure_details, print_resolution_failures, print_summary},
        html::generate_html_report,
    },
};

/// Executes the run command with the provided arguments.
///
/// # Arguments
/// * `config` - Path to the configuration matrix file
/// * `envs` - Environment names to run; the configured `envlist` when empty
/// * `jobs` - Number of environments to run in parallel
/// * `serial` - Force one environment at a time
/// * `timeout` - Optional wall-clock budget for the whole invocation
/// * `html` - Optional path for HTML report output
/// * `posargs` - Positional arguments forwarded to `{posargs}`
/// * `language` - The pre-parsed interface language
///
/// # Returns
/// The process exit code: success, execution failure, or resolution failure.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config: PathBuf,
    envs: Vec<String>,
    jobs: Option<usize>,
    serial: bool,
    timeout: Option<u64>,
    html: Option<PathBuf>,
    posargs: Vec<String>,
    language: &str,
) -> Result<ExitCode> {
    let matrix = setup_and_parse_config(&config)?;
    let locale = effective_locale(&matrix, language);
    rust_i18n::set_locale(&locale);

    println!(
        "{}",
        t!(
            "run.loading_config",
            locale = locale,
            path = matrix.config_path.display()
        )
    );

    let overall_stop_token = setup_signal_handler(&locale)?;
    if let Some(secs) = timeout {
        arm_global_timeout(secs, overall_stop_token.clone(), &locale);
    }

    let plan = planner::plan_execution(&matrix, &envs, &posargs)?;
    print_resolution_failures(&plan.resolution_failures(), &locale);

    let jobs = if serial {
        1
    } else {
        jobs.unwrap_or_else(planner::default_jobs)
    };
    println!(
        "{}",
        t!(
            "run.starting",
            locale = locale,
            count = plan.len(),
            jobs = jobs
        )
        .bold()
    );

    let workdir = matrix.work_dir();
    let provisioner = Arc::new(Provisioner::new(
        workdir.clone(),
        matrix.confdir.clone(),
        matrix.options.skip_missing_interpreters,
    ));

    // The plan is consumed by the run; keep the descriptors for the merge.
    let merge_descriptors: Vec<_> = plan.descriptors().into_iter().cloned().collect();
    let results = planner::run_all(plan, provisioner, jobs, overall_stop_token.clone()).await;

    if merge_descriptors.iter().any(|d| d.produces_coverage()) {
        merge_coverage(&workdir, &merge_descriptors, &locale);
    }

    print_summary(&results, &workdir, &locale);

    if let Some(report_path) = &html {
        println!(
            "\n{}",
            t!(
                "run.generating_html",
                locale = locale,
                path = report_path.display()
            )
        );
        if let Err(e) = generate_html_report(&results, report_path, &locale) {
            eprintln!("{} {}", t!("run.html_failed", locale = locale).red(), e);
        }
    }

    let failures: Vec<&EnvResult> = results.iter().filter(|r| r.is_failure()).collect();
    print_failure_details(&failures, &locale);

    let code = if results.iter().any(|r| r.is_resolution_failure()) {
        EXIT_RESOLUTION_FAILURE
    } else if !failures.is_empty() || overall_stop_token.is_cancelled() {
        EXIT_EXECUTION_FAILURE
    } else {
        println!("\n{}", t!("run.all_passed", locale = locale).green().bold());
        EXIT_SUCCESS
    };
    Ok(ExitCode::from(code))
}

/// Resolves the configuration path and parses the matrix. The path is made
/// absolute first, so descriptors carry absolute directories regardless of
/// how the file was addressed.
pub(crate) fn setup_and_parse_config(config_path_arg: &Path) -> Result<MatrixConfig> {
    let config_path =
        fs::canonicalize(config_path_arg).map_err(|e| RunnerError::ConfigParse {
            path: config_path_arg.display().to_string(),
            line: 0,
            message: format!("cannot read file: {}", e),
        })?;
    let matrix = config::load_matrix_config(&config_path)?;
    Ok(matrix)
}

/// The interface locale of this run: an explicit `--lang` wins, then the
/// configuration's `language` option, then the pre-parsed default.
pub(crate) fn effective_locale(matrix: &MatrixConfig, language: &str) -> String {
    if env::args().any(|arg| arg == "--lang") {
        return language.to_string();
    }
    match &matrix.options.language {
        Some(lang) => crate::cli::normalize_locale(lang),
        None => language.to_string(),
    }
}

/// Sets up a signal handler for graceful shutdown.
fn setup_signal_handler(locale: &str) -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl-C");
        println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
        token_clone.cancel();
    });

    Ok(token)
}

/// Cancels the whole invocation once the global budget elapses.
fn arm_global_timeout(secs: u64, token: CancellationToken, locale: &str) {
    let locale = locale.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        if !token.is_cancelled() {
            println!(
                "\n{}",
                t!("run.global_timeout", locale = &locale, timeout = secs).yellow()
            );
            token.cancel();
        }
    });
}

/// Runs the coverage merge once, after every environment has finished.
fn merge_coverage(
    workdir: &Path,
    descriptors: &[crate::core::models::EnvDescriptor],
    locale: &str,
) {
    let refs: Vec<&_> = descriptors.iter().collect();
    match coverage::merge_artifacts(workdir, &refs) {
        Ok(manifest) => {
            println!(
                "{}",
                t!(
                    "run.coverage_merged",
                    locale = locale,
                    merged = manifest.merged().len(),
                    missing = manifest.missing().len(),
                    dir = workdir.join(coverage::ARTIFACTS_DIR_NAME).display()
                )
                .cyan()
            );
        }
        Err(e) => {
            eprintln!(
                "{} {}",
                t!("run.coverage_merge_failed", locale = locale).red(),
                e
            );
        }
    }
}
