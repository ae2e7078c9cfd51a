//! # Configuration Module / 配置模块
//!
//! This module parses the `FactorMatrix.ini` configuration file into rule
//! sets: global options from `[default]`, base rules from `[testenv]` and
//! per-environment overrides from `[testenv:NAME]`. Factor conditions are
//! parsed here so that every syntax error carries a line number; rule
//! evaluation itself happens in the resolver.
//!
//! 此模块将 `FactorMatrix.ini` 配置文件解析为规则集：
//! `[default]` 中的全局选项、`[testenv]` 中的基础规则以及
//! `[testenv:NAME]` 中的按环境覆盖。因子条件在此处解析，
//! 以便每个语法错误都带有行号；规则求值本身在解析器中进行。

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{RunnerError, RunnerResult};
use crate::core::factor::{self, FactorPredicate};

/// Default configuration file name, looked up next to the invocation.
pub const DEFAULT_CONFIG_NAME: &str = "FactorMatrix.ini";

/// Default work directory name, created next to the configuration file.
pub const DEFAULT_WORKDIR_NAME: &str = ".factor-runner";

/// How repeated contributions to a key combine during resolution.
/// 对同一键的多次贡献在解析期间如何合并。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStyle {
    /// Matching lines append in declaration order.
    Accumulate,
    /// The last matching line wins.
    Override,
}

/// The key schema for `[testenv]` sections. Accumulation vs. override is a
/// property of the key, never of an individual line.
static KEY_SCHEMA: Lazy<BTreeMap<&'static str, MergeStyle>> = Lazy::new(|| {
    BTreeMap::from([
        ("deps", MergeStyle::Accumulate),
        ("extras", MergeStyle::Accumulate),
        ("setenv", MergeStyle::Accumulate),
        ("commands", MergeStyle::Accumulate),
        ("coverage", MergeStyle::Accumulate),
        ("description", MergeStyle::Override),
        ("interpreter", MergeStyle::Override),
        ("changedir", MergeStyle::Override),
        ("timeout", MergeStyle::Override),
        ("skip_install", MergeStyle::Override),
        ("install_command", MergeStyle::Override),
        ("provision_command", MergeStyle::Override),
    ])
});

/// Keys accepted in the `[default]` section.
const DEFAULT_SECTION_KEYS: &[&str] = &[
    "envlist",
    "minversion",
    "skip_missing_interpreters",
    "isolated_build",
    "workdir",
    "language",
];

/// Looks up the merge style of a `[testenv]` key, `None` for unknown keys.
pub fn merge_style(key: &str) -> Option<MergeStyle> {
    KEY_SCHEMA.get(key).copied()
}

/// A single configuration line: an optional factor condition and the value
/// it contributes, with its source line for diagnostics.
/// 单条配置行：可选的因子条件及其贡献的值，并带有用于诊断的源行号。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRule {
    pub predicate: Option<FactorPredicate>,
    pub value: String,
    pub line: usize,
}

/// The rules of one `[testenv]`-shaped section, keyed by configuration key.
/// A key that was declared with zero entries is still recorded, since a
/// declaration in `[testenv:NAME]` replaces the base rules for that key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeMap<String, Vec<ConfigRule>>,
}

impl RuleSet {
    /// The rules declared for `key`, or `None` when the section never
    /// mentioned it.
    pub fn rules_for(&self, key: &str) -> Option<&[ConfigRule]> {
        self.rules.get(key).map(|r| r.as_slice())
    }

    /// Marks `key` as declared, clearing any earlier declaration.
    fn declare(&mut self, key: &str) {
        self.rules.insert(key.to_string(), Vec::new());
    }

    fn push(&mut self, key: &str, rule: ConfigRule) {
        self.rules.entry(key.to_string()).or_default().push(rule);
    }
}

/// Options from the `[default]` section.
/// `[default]` 节中的选项。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    /// Environment name specifications to run when none are requested.
    pub envlist: Vec<String>,
    /// Minimum runner version this configuration requires.
    pub minversion: Option<String>,
    /// Report environments whose interpreter is absent as skipped instead
    /// of failed.
    pub skip_missing_interpreters: bool,
    /// Whether the project expects isolated packaging. Parsed and surfaced;
    /// packaging itself stays outside the runner.
    pub isolated_build: bool,
    /// Work directory override, relative to the configuration directory.
    pub workdir: Option<String>,
    /// Locale for console messages, overridden by `--lang`.
    pub language: Option<String>,
}

/// The parsed configuration file.
/// 已解析的配置文件。
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub options: GlobalOptions,
    /// Base rules from `[testenv]`.
    pub base: RuleSet,
    /// Override sections from `[testenv:NAME]`, in declaration order.
    pub named: Vec<(String, RuleSet)>,
    /// The configuration file path as given.
    pub config_path: PathBuf,
    /// The directory containing the configuration file.
    pub confdir: PathBuf,
}

impl MatrixConfig {
    /// The override rule set for `name`, if one was declared.
    pub fn ruleset_for(&self, name: &str) -> Option<&RuleSet> {
        self.named
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, rules)| rules)
    }

    /// The environment names `run` selects when none are requested:
    /// the brace-expanded, deduplicated `envlist`.
    pub fn default_env_names(&self) -> RunnerResult<Vec<String>> {
        factor::expand_name_list(&self.options.envlist)
    }

    /// The work directory for this configuration.
    pub fn work_dir(&self) -> PathBuf {
        match &self.options.workdir {
            Some(dir) => self.confdir.join(dir),
            None => self.confdir.join(DEFAULT_WORKDIR_NAME),
        }
    }
}

/// Reads and parses a configuration file from disk.
pub fn load_matrix_config(path: &Path) -> RunnerResult<MatrixConfig> {
    let text = fs::read_to_string(path).map_err(|e| RunnerError::ConfigParse {
        path: path.display().to_string(),
        line: 0,
        message: format!("cannot read file: {}", e),
    })?;
    parse_matrix_config(&text, path)
}

enum Section {
    None,
    Default,
    Base,
    Named(usize),
    Foreign,
}

/// Parses configuration text.
///
/// Format rules: full-line `#`/`;` comments, `[section]` headers and
/// `key = value` lines at column zero, indented lines continuing the most
/// recent key one entry per line. Unknown sections are ignored so the file
/// can host other tools' configuration; unknown keys inside recognised
/// sections are errors. A later declaration of a key replaces the earlier
/// one within its section.
///
/// 解析配置文本。未知的节会被忽略，以便文件可以承载其他工具的配置；
/// 已识别节中的未知键则是错误。
pub fn parse_matrix_config(text: &str, path: &Path) -> RunnerResult<MatrixConfig> {
    let path_str = path.display().to_string();
    let parse_error = |line: usize, message: String| RunnerError::ConfigParse {
        path: path_str.clone(),
        line,
        message,
    };

    let mut options_entries: BTreeMap<String, Vec<(usize, String)>> = BTreeMap::new();
    let mut base = RuleSet::default();
    let mut named: Vec<(String, RuleSet)> = Vec::new();
    let mut section = Section::None;
    let mut current_key: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = line.len() != trimmed.len();
        if indented {
            let Some(key) = current_key.clone() else {
                return Err(parse_error(
                    lineno,
                    "continuation line without a preceding key".to_string(),
                ));
            };
            record_entry(
                &section,
                &mut options_entries,
                &mut base,
                &mut named,
                &key,
                trimmed,
                lineno,
                &parse_error,
            )?;
            continue;
        }

        if trimmed.starts_with('[') {
            let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
                return Err(parse_error(lineno, "unterminated section header".to_string()));
            };
            current_key = None;
            section = match name {
                "default" => Section::Default,
                "testenv" => Section::Base,
                _ => {
                    if let Some(env) = name.strip_prefix("testenv:") {
                        if env.is_empty() {
                            return Err(parse_error(
                                lineno,
                                "empty environment name in section header".to_string(),
                            ));
                        }
                        if named.iter().any(|(declared, _)| declared == env) {
                            return Err(parse_error(
                                lineno,
                                format!("duplicate section [testenv:{}]", env),
                            ));
                        }
                        named.push((env.to_string(), RuleSet::default()));
                        Section::Named(named.len() - 1)
                    } else {
                        Section::Foreign
                    }
                }
            };
            continue;
        }

        let Some((left, right)) = trimmed.split_once('=') else {
            return Err(parse_error(
                lineno,
                "expected 'key = value' or a section header".to_string(),
            ));
        };
        let key = left.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(parse_error(lineno, format!("invalid key '{}'", key)));
        }

        match section {
            Section::None => {
                return Err(parse_error(
                    lineno,
                    format!("key '{}' outside of any section", key),
                ));
            }
            Section::Foreign => {
                current_key = Some(key.to_string());
                continue;
            }
            Section::Default => {
                if !DEFAULT_SECTION_KEYS.contains(&key) {
                    return Err(parse_error(
                        lineno,
                        format!("unknown key '{}' in [default]", key),
                    ));
                }
                options_entries.insert(key.to_string(), Vec::new());
            }
            Section::Base => {
                if merge_style(key).is_none() {
                    return Err(parse_error(
                        lineno,
                        format!("unknown key '{}' in [testenv]", key),
                    ));
                }
                base.declare(key);
            }
            Section::Named(i) => {
                if merge_style(key).is_none() {
                    return Err(parse_error(
                        lineno,
                        format!("unknown key '{}' in [testenv:{}]", key, named[i].0),
                    ));
                }
                named[i].1.declare(key);
            }
        }

        current_key = Some(key.to_string());
        let inline = right.trim();
        if !inline.is_empty() {
            record_entry(
                &section,
                &mut options_entries,
                &mut base,
                &mut named,
                key,
                inline,
                lineno,
                &parse_error,
            )?;
        }
    }

    let options = build_global_options(options_entries, &parse_error)?;

    let confdir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(MatrixConfig {
        options,
        base,
        named,
        config_path: path.to_path_buf(),
        confdir,
    })
}

/// Stores one value entry in whatever section is current.
#[allow(clippy::too_many_arguments)]
fn record_entry(
    section: &Section,
    options_entries: &mut BTreeMap<String, Vec<(usize, String)>>,
    base: &mut RuleSet,
    named: &mut [(String, RuleSet)],
    key: &str,
    entry: &str,
    lineno: usize,
    parse_error: &impl Fn(usize, String) -> RunnerError,
) -> RunnerResult<()> {
    let parse_rule = |entry: &str| -> RunnerResult<ConfigRule> {
        let (predicate, value) =
            factor::split_condition(entry).map_err(|msg| parse_error(lineno, msg))?;
        Ok(ConfigRule {
            predicate,
            value,
            line: lineno,
        })
    };

    match section {
        Section::Default => {
            options_entries
                .entry(key.to_string())
                .or_default()
                .push((lineno, entry.to_string()));
            Ok(())
        }
        Section::Base => {
            let rule = parse_rule(entry)?;
            base.push(key, rule);
            Ok(())
        }
        Section::Named(i) => {
            let rule = parse_rule(entry)?;
            named[*i].1.push(key, rule);
            Ok(())
        }
        Section::Foreign => Ok(()),
        Section::None => Err(parse_error(lineno, "value outside of any section".to_string())),
    }
}

fn build_global_options(
    entries: BTreeMap<String, Vec<(usize, String)>>,
    parse_error: &impl Fn(usize, String) -> RunnerError,
) -> RunnerResult<GlobalOptions> {
    let mut options = GlobalOptions::default();

    for (key, values) in entries {
        match key.as_str() {
            "envlist" => {
                for (_, value) in &values {
                    options.envlist.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_string),
                    );
                }
            }
            "minversion" => {
                if let Some((line, value)) = values.last() {
                    let current = env!("CARGO_PKG_VERSION");
                    match version_satisfied(value, current) {
                        Some(true) => options.minversion = Some(value.clone()),
                        Some(false) => {
                            return Err(parse_error(
                                *line,
                                format!(
                                    "this configuration requires at least version {}, but this is {}",
                                    value, current
                                ),
                            ));
                        }
                        None => {
                            return Err(parse_error(
                                *line,
                                format!("invalid minversion '{}'", value),
                            ));
                        }
                    }
                }
            }
            "skip_missing_interpreters" => {
                if let Some((line, value)) = values.last() {
                    options.skip_missing_interpreters = parse_bool(value)
                        .ok_or_else(|| parse_error(*line, format!("invalid boolean '{}'", value)))?;
                }
            }
            "isolated_build" => {
                if let Some((line, value)) = values.last() {
                    options.isolated_build = parse_bool(value)
                        .ok_or_else(|| parse_error(*line, format!("invalid boolean '{}'", value)))?;
                }
            }
            "workdir" => {
                if let Some((_, value)) = values.last() {
                    options.workdir = Some(value.clone());
                }
            }
            "language" => {
                if let Some((_, value)) = values.last() {
                    options.language = Some(value.clone());
                }
            }
            _ => unreachable!("unknown [default] keys are rejected during parsing"),
        }
    }

    Ok(options)
}

/// Parses the boolean spellings the configuration format accepts.
/// 解析配置格式接受的布尔值写法。
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Compares two dotted numeric versions, `None` when either is unparseable.
/// Missing components count as zero, so `1.2` and `1.2.0` are equal.
pub fn version_satisfied(required: &str, current: &str) -> Option<bool> {
    let required = version_components(required)?;
    let current = version_components(current)?;
    let len = required.len().max(current.len());
    for i in 0..len {
        let r = required.get(i).copied().unwrap_or(0);
        let c = current.get(i).copied().unwrap_or(0);
        if c != r {
            return Some(c > r);
        }
    }
    Some(true)
}

fn version_components(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}
