//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command for the Factor Runner CLI,
//! which creates a new `FactorMatrix.ini` through an interactive wizard.
//! The wizard detects the project name, offers a set of environment
//! templates and writes a commented configuration to start from.
//!
//! 此模块实现了 Factor Runner CLI 的 `init` 命令，
//! 通过交互式向导创建新的 `FactorMatrix.ini`。
//! 向导会检测项目名称，提供一组环境模板，
//! 并写入带注释的初始配置。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core::config::DEFAULT_CONFIG_NAME;
use crate::infra::t;

/// Represents the package section of a Cargo.toml manifest file.
/// 代表 Cargo.toml 清单文件的 package 部分。
#[derive(Deserialize)]
struct Package {
    name: String,
}

/// The top-level structure of a Cargo.toml manifest file.
/// Cargo.toml 清单文件的顶级结构。
#[derive(Deserialize)]
struct CargoManifest {
    package: Package,
}

/// The project table of a pyproject.toml file.
/// pyproject.toml 文件的 project 表。
#[derive(Deserialize)]
struct ProjectTable {
    name: String,
}

/// The top-level structure of a pyproject.toml file.
/// pyproject.toml 文件的顶级结构。
#[derive(Deserialize)]
struct PyProject {
    project: ProjectTable,
}

/// Which environment templates the generated configuration includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TemplateSelection {
    unit: bool,
    coverage: bool,
    lint: bool,
    type_check: bool,
    docs: bool,
}

impl TemplateSelection {
    fn defaults() -> Self {
        TemplateSelection {
            unit: true,
            coverage: true,
            lint: false,
            type_check: false,
            docs: false,
        }
    }
}

/// Runs the interactive wizard to generate a `FactorMatrix.ini` file.
///
/// # Arguments / 参数
/// * `language` - The interface language for prompts and messages
///                提示和消息的界面语言
/// * `non_interactive` - Write the default template without prompting
///                       不经提示直接写入默认模板
///
/// # Process Flow / 处理流程
/// 1. Display welcome message and instructions / 显示欢迎消息和说明
/// 2. Check for existing configuration and confirm overwrite if needed
///    检查现有配置并在需要时确认覆盖
/// 3. Detect the project name from Cargo.toml or pyproject.toml
///    从 Cargo.toml 或 pyproject.toml 检测项目名称
/// 4. Prompt for the environment templates to include / 提示选择要包含的环境模板
/// 5. Generate and save the configuration file / 生成并保存配置文件
pub fn run_init_wizard(language: &str, non_interactive: bool) -> Result<()> {
    let detected_name = detect_project_name().unwrap_or_else(|_| "my-project".to_string());

    if non_interactive {
        if Path::new(DEFAULT_CONFIG_NAME).exists() {
            println!(
                "{}",
                t!("init.file_exists", locale = language, path = DEFAULT_CONFIG_NAME).red()
            );
            println!("{}", t!("init.remove_first_hint", locale = language).yellow());
            return Ok(());
        }
        write_config(&detected_name, TemplateSelection::defaults(), language)?;
        return Ok(());
    }

    let theme = ColorfulTheme::default();
    println!(
        "\n{}",
        t!("init.wizard_welcome", locale = language).bold().cyan()
    );
    println!("{}\n", t!("init.wizard_description", locale = language));

    // Check if configuration file already exists and get user confirmation
    // 检查配置文件是否已存在并获取用户确认
    if !confirm_overwrite(&theme, language)? {
        println!("{}", t!("init.aborted", locale = language).yellow());
        return Ok(());
    }

    println!(
        "{}",
        t!(
            "init.detected_project_name",
            locale = language,
            name = detected_name
        )
    );
    let project_name: String = Input::with_theme(&theme)
        .with_prompt(t!("init.project_name_prompt", locale = language).to_string())
        .default(detected_name)
        .interact_text()?;

    let selection = prompt_for_templates(&theme, language)?;

    write_config(&project_name, selection, language)
}

/// Checks if the configuration exists and asks the user for confirmation
/// to overwrite.
/// 检查配置是否存在并询问用户确认覆盖。
fn confirm_overwrite(theme: &ColorfulTheme, language: &str) -> Result<bool> {
    if Path::new(DEFAULT_CONFIG_NAME).exists() {
        Confirm::with_theme(theme)
            .with_prompt(
                t!(
                    "init.overwrite_prompt",
                    locale = language,
                    path = DEFAULT_CONFIG_NAME
                )
                .to_string(),
            )
            .interact()
            .context(t!("init.confirm_failed", locale = language).to_string())
    } else {
        Ok(true)
    }
}

/// Tries to detect the project name from `Cargo.toml`, then from
/// `pyproject.toml`.
/// 尝试先从 `Cargo.toml`、再从 `pyproject.toml` 检测项目名称。
fn detect_project_name() -> Result<String> {
    if let Ok(content) = fs::read_to_string("Cargo.toml") {
        if let Ok(manifest) = toml::from_str::<CargoManifest>(&content) {
            return Ok(manifest.package.name);
        }
    }
    let content =
        fs::read_to_string("pyproject.toml").context("No Cargo.toml or pyproject.toml found")?;
    let pyproject: PyProject =
        toml::from_str(&content).context("Failed to parse pyproject.toml")?;
    Ok(pyproject.project.name)
}

/// Prompts the user to pick the environment templates for the generated
/// configuration. Unit tests and coverage are pre-selected.
///
/// 提示用户为生成的配置选择环境模板。单元测试和覆盖率为预选项。
fn prompt_for_templates(theme: &ColorfulTheme, language: &str) -> Result<TemplateSelection> {
    let templates = vec![
        t!("init.template_unit", locale = language),
        t!("init.template_coverage", locale = language),
        t!("init.template_lint", locale = language),
        t!("init.template_type", locale = language),
        t!("init.template_docs", locale = language),
    ];

    let selections = MultiSelect::with_theme(theme)
        .with_prompt(t!("init.template_selection_prompt", locale = language).to_string())
        .items(&templates)
        .defaults(&[true, true, false, false, false]) // Pre-select unit and coverage / 预选单元测试和覆盖率
        .interact()?;

    if selections.is_empty() {
        println!(
            "{}",
            t!("init.no_templates_selected", locale = language).yellow()
        );
    }

    Ok(TemplateSelection {
        unit: selections.contains(&0),
        coverage: selections.contains(&1),
        lint: selections.contains(&2),
        type_check: selections.contains(&3),
        docs: selections.contains(&4),
    })
}

/// Renders the configuration for `selection` and writes it to
/// `FactorMatrix.ini` in the current directory.
fn write_config(project_name: &str, selection: TemplateSelection, language: &str) -> Result<()> {
    let content = render_config(project_name, selection);
    fs::write(DEFAULT_CONFIG_NAME, content).with_context(|| {
        t!("init.write_failed", locale = language, path = DEFAULT_CONFIG_NAME).to_string()
    })?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!(
            "init.success_created",
            locale = language,
            path = DEFAULT_CONFIG_NAME
        )
        .bold()
    );
    println!("{}", t!("init.usage_hint", locale = language));
    Ok(())
}

fn render_config(project_name: &str, selection: TemplateSelection) -> String {
    let mut envlist = Vec::new();
    if selection.unit {
        envlist.push("py311-unit");
    }
    if selection.coverage {
        envlist.push("py311-cov");
    }
    if selection.lint {
        envlist.push("py311-lint");
    }
    if selection.type_check {
        envlist.push("py311-type");
    }
    if selection.docs {
        envlist.push("py311-docs");
    }
    if envlist.is_empty() {
        envlist.push("py311-unit");
    }

    let mut content = format!(
        "# Factor matrix for {name} / {name} 的因子矩阵\n\
         # Environment names are factor chains: py311-unit runs with the\n\
         # factors [py311, unit]. Rules prefixed with `factor:` only apply\n\
         # when that factor is present in the environment name.\n\
         # 环境名称是因子链：py311-unit 以 [py311, unit] 因子运行。\n\
         # 以 `factor:` 为前缀的规则仅在环境名称包含该因子时生效。\n\
         \n\
         [default]\n\
         envlist = {envlist}\n\
         skip_missing_interpreters = true\n\
         \n\
         [testenv]\n\
         description = {name} test environment\n\
         interpreter = python3\n\
         deps =\n\
         \x20   pytest\n",
        name = project_name,
        envlist = envlist.join(", "),
    );

    if selection.coverage {
        content.push_str(
            "    cov: pytest-cov\n\
             setenv =\n\
             \x20   cov: COVERAGE_FILE = {envdir}/.coverage\n",
        );
    }

    content.push_str("commands =\n");
    if selection.unit {
        content.push_str("    unit: pytest {posargs}\n");
    }
    if selection.coverage {
        content.push_str(&format!(
            "    cov: pytest --cov={} {{posargs}}\n",
            project_name
        ));
    }
    if !selection.unit && !selection.coverage {
        content.push_str("    pytest {posargs}\n");
    }
    if selection.coverage {
        content.push_str(
            "coverage =\n\
             \x20   cov: {envdir}/.coverage\n",
        );
    }

    if selection.lint {
        content.push_str(
            "\n[testenv:py311-lint]\n\
             description = static lint checks\n\
             skip_install = true\n\
             deps = ruff\n\
             commands = ruff check .\n",
        );
    }
    if selection.type_check {
        content.push_str(
            "\n[testenv:py311-type]\n\
             description = static type checks\n\
             deps = mypy\n\
             commands = mypy src\n",
        );
    }
    if selection.docs {
        content.push_str(
            "\n[testenv:py311-docs]\n\
             description = documentation build\n\
             deps = sphinx\n\
             commands = sphinx-build -W docs docs/_build\n",
        );
    }

    content
}
