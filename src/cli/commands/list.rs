//! # List Command Module / 列表命令模块
//!
//! This module implements the `list` command for the Factor Runner CLI,
//! which resolves the selected environments and prints their descriptors
//! without provisioning or running anything.
//!
//! 此模块实现了 Factor Runner CLI 的 `list` 命令，
//! 解析所选环境并打印其描述符，而不进行配置或运行任何内容。

use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::core::{
    errors::{EXIT_RESOLUTION_FAILURE, EXIT_SUCCESS},
    models::EnvDescriptor,
    planner, resolver,
};
use crate::infra::t;

/// Executes the list command: a dry run that shows what `run` would do.
///
/// # Arguments
/// * `config` - Path to the configuration matrix file
/// * `envs` - Environment names to list; the configured `envlist` when empty
/// * `language` - The pre-parsed interface language
///
/// # Returns
/// The resolution-failure exit code when any environment fails to resolve,
/// success otherwise.
pub fn execute(config: PathBuf, envs: Vec<String>, language: &str) -> Result<ExitCode> {
    let matrix = super::run::setup_and_parse_config(&config)?;
    let locale = super::run::effective_locale(&matrix, language);
    rust_i18n::set_locale(&locale);

    let names = planner::select_env_names(&matrix, &envs)?;
    println!(
        "{}",
        t!("list.header", locale = locale, count = names.len()).bold()
    );

    let mut failed = 0usize;
    for name in &names {
        match resolver::resolve(&matrix, name, &[]) {
            Ok(descriptor) => print_descriptor(&descriptor, &locale),
            Err(error) => {
                failed += 1;
                println!("\n{}", name.red().bold());
                println!("  {} {}", t!("list.error", locale = locale).red(), error);
            }
        }
    }

    if failed > 0 {
        Ok(ExitCode::from(EXIT_RESOLUTION_FAILURE))
    } else {
        Ok(ExitCode::from(EXIT_SUCCESS))
    }
}

fn print_descriptor(descriptor: &EnvDescriptor, locale: &str) {
    println!("\n{}", descriptor.name.cyan().bold());
    if !descriptor.description.is_empty() {
        println!("  {}", descriptor.description);
    }
    println!(
        "  {} {}",
        t!("list.label_factors", locale = locale).dimmed(),
        descriptor.factors.join(", ")
    );
    if !descriptor.interpreter.is_empty() {
        println!(
            "  {} {}",
            t!("list.label_interpreter", locale = locale).dimmed(),
            descriptor.interpreter
        );
    }
    println!(
        "  {} {}",
        t!("list.label_changedir", locale = locale).dimmed(),
        descriptor.changedir.display()
    );
    if let Some(secs) = descriptor.timeout {
        println!(
            "  {} {}s",
            t!("list.label_timeout", locale = locale).dimmed(),
            secs
        );
    }
    if descriptor.skip_install {
        println!("  {}", t!("list.skip_install", locale = locale).dimmed());
    }
    if !descriptor.deps.is_empty() {
        println!("  {}", t!("list.label_deps", locale = locale).dimmed());
        for dep in &descriptor.deps {
            println!("    - {}", dep);
        }
    }
    if !descriptor.extras.is_empty() {
        println!(
            "  {} {}",
            t!("list.label_extras", locale = locale).dimmed(),
            descriptor.extras.join(", ")
        );
    }
    if !descriptor.setenv.is_empty() {
        println!("  {}", t!("list.label_setenv", locale = locale).dimmed());
        for assign in &descriptor.setenv {
            println!("    {}={}", assign.name, assign.value);
        }
    }
    if !descriptor.commands.is_empty() {
        println!("  {}", t!("list.label_commands", locale = locale).dimmed());
        for command in &descriptor.commands {
            let marker = if command.ignore_failure { "- " } else { "" };
            println!("    {}{}", marker, command.line);
        }
    }
    if !descriptor.coverage.is_empty() {
        println!(
            "  {} {}",
            t!("list.label_coverage", locale = locale).dimmed(),
            descriptor.coverage.join(", ")
        );
    }
}
