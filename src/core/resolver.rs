//! # Descriptor Resolver Module / 描述符解析模块
//!
//! This module turns a parsed configuration plus one environment name into a
//! fully resolved [`EnvDescriptor`]. Override sections replace base rules per
//! key, factor conditions filter lines, accumulating keys fold in declaration
//! order and scalar keys keep the last matching line. Resolution is pure and
//! deterministic; nothing here touches the filesystem or spawns processes.
//!
//! 此模块将已解析的配置和一个环境名称转换为完全解析的 [`EnvDescriptor`]。
//! 覆盖节按键替换基础规则，因子条件过滤配置行，累积键按声明顺序折叠，
//! 标量键保留最后一条匹配行。解析是纯函数且确定性的；
//! 这里不访问文件系统，也不派生进程。

use std::path::PathBuf;

use crate::core::config::{self, ConfigRule, MatrixConfig};
use crate::core::errors::{RunnerError, RunnerResult};
use crate::core::factor;
use crate::core::interp::{self, Bindings};
use crate::core::models::{CommandSpec, EnvAssignment, EnvDescriptor};

/// Install command used when the configuration does not override it.
/// `{packages}` is substituted once the context is known.
pub const DEFAULT_INSTALL_COMMAND: &str = "python -m pip install {packages}";

/// Resolves `name` against `config` into a descriptor.
///
/// Every value is interpolated here, so an unresolved placeholder fails the
/// environment before provisioning can start. The returned descriptor is the
/// complete execution plan for the environment.
///
/// 将 `name` 依据 `config` 解析为描述符。所有值都在此处插值，
/// 因此未解析的占位符会在配置上下文开始之前使环境失败。
pub fn resolve(
    config: &MatrixConfig,
    name: &str,
    posargs: &[String],
) -> RunnerResult<EnvDescriptor> {
    let factors = factor::parse_factors(name)?;
    let workdir = config.work_dir();
    let bindings =
        Bindings::new(&config.confdir, &workdir, name).with_posargs(posargs.to_vec());

    let description = scalar_value(config, name, &factors, &bindings, "description")?
        .unwrap_or_default();
    let interpreter =
        scalar_value(config, name, &factors, &bindings, "interpreter")?.unwrap_or_default();

    let changedir = match scalar_value(config, name, &factors, &bindings, "changedir")? {
        Some(dir) => {
            let path = PathBuf::from(dir);
            if path.is_absolute() {
                path
            } else {
                config.confdir.join(path)
            }
        }
        None => config.confdir.clone(),
    };

    let timeout = match scalar_value(config, name, &factors, &bindings, "timeout")? {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| RunnerError::Resolution {
            env: name.to_string(),
            message: format!("invalid timeout '{}': expected whole seconds", raw),
        })?),
        None => None,
    };

    let skip_install = match scalar_value(config, name, &factors, &bindings, "skip_install")? {
        Some(raw) => config::parse_bool(&raw).ok_or_else(|| RunnerError::Resolution {
            env: name.to_string(),
            message: format!("invalid skip_install '{}': expected a boolean", raw),
        })?,
        None => false,
    };

    let install_command = scalar_value(config, name, &factors, &bindings, "install_command")?
        .unwrap_or_else(|| DEFAULT_INSTALL_COMMAND.to_string());
    let provision_command = scalar_value(config, name, &factors, &bindings, "provision_command")?
        .unwrap_or_default();

    let deps = accumulated_values(config, name, &factors, &bindings, "deps")?;
    let extras = accumulated_values(config, name, &factors, &bindings, "extras")?;
    let coverage = accumulated_values(config, name, &factors, &bindings, "coverage")?;

    let mut setenv = Vec::new();
    for entry in accumulated_values(config, name, &factors, &bindings, "setenv")? {
        let Some((var, value)) = entry.split_once('=') else {
            return Err(RunnerError::Resolution {
                env: name.to_string(),
                message: format!("invalid setenv entry '{}': expected NAME=VALUE", entry),
            });
        };
        let var = var.trim();
        if var.is_empty() {
            return Err(RunnerError::Resolution {
                env: name.to_string(),
                message: format!("invalid setenv entry '{}': empty variable name", entry),
            });
        }
        setenv.push(EnvAssignment {
            name: var.to_string(),
            value: value.trim().to_string(),
        });
    }

    let mut commands = Vec::new();
    for rule_value in raw_matching_values(config, name, &factors, "commands") {
        let (ignore_failure, body) = match rule_value.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, rule_value.as_str()),
        };
        if body.is_empty() {
            return Err(RunnerError::Resolution {
                env: name.to_string(),
                message: "empty command entry".to_string(),
            });
        }
        let line = interp::interpolate(body, &bindings, "commands")?;
        commands.push(CommandSpec {
            line,
            ignore_failure,
        });
    }

    Ok(EnvDescriptor {
        name: name.to_string(),
        factors,
        description,
        interpreter,
        changedir,
        timeout,
        skip_install,
        install_command,
        provision_command,
        deps,
        extras,
        setenv,
        commands,
        coverage,
        envdir: bindings.envdir.clone(),
        envtmpdir: bindings.envtmpdir.clone(),
    })
}

/// The rules that govern `key` for this environment: the override section's
/// rules when it declared the key, the base section's otherwise.
fn effective_rules<'a>(config: &'a MatrixConfig, name: &str, key: &str) -> &'a [ConfigRule] {
    if let Some(section) = config.ruleset_for(name) {
        if let Some(rules) = section.rules_for(key) {
            return rules;
        }
    }
    config.base.rules_for(key).unwrap_or(&[])
}

/// Resolution-order values whose factor conditions match, uninterpolated.
fn raw_matching_values(
    config: &MatrixConfig,
    name: &str,
    factors: &[String],
    key: &str,
) -> Vec<String> {
    effective_rules(config, name, key)
        .iter()
        .filter(|rule| {
            rule.predicate
                .as_ref()
                .map(|p| p.matches(factors))
                .unwrap_or(true)
        })
        .map(|rule| rule.value.clone())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Accumulating key: every matching line contributes one entry, in
/// declaration order, duplicates preserved.
fn accumulated_values(
    config: &MatrixConfig,
    name: &str,
    factors: &[String],
    bindings: &Bindings,
    key: &str,
) -> RunnerResult<Vec<String>> {
    raw_matching_values(config, name, factors, key)
        .iter()
        .map(|value| interp::interpolate(value, bindings, key))
        .collect()
}

/// Scalar key: the last matching line wins, `None` when nothing matched.
fn scalar_value(
    config: &MatrixConfig,
    name: &str,
    factors: &[String],
    bindings: &Bindings,
    key: &str,
) -> RunnerResult<Option<String>> {
    match raw_matching_values(config, name, factors, key).last() {
        Some(value) => Ok(Some(interp::interpolate(value, bindings, key)?)),
        None => Ok(None),
    }
}
