//! # Factor Engine Module / 因子引擎模块
//!
//! This module decomposes environment names into ordered factor sets and
//! evaluates the factor conditions that gate configuration lines.
//! Everything here is pure: no filesystem access, no process state.
//!
//! 此模块将环境名称分解为有序的因子集合，
//! 并求值用于筛选配置行的因子条件。
//! 这里的一切都是纯函数：不访问文件系统，不依赖进程状态。

use crate::core::errors::{RunnerError, RunnerResult};

/// Names that configuration sections claim for themselves and that can
/// therefore never be used as environment names.
/// 配置节自身占用、因此永远不能用作环境名称的名称。
pub const RESERVED_NAMES: &[&str] = &["default", "testenv"];

/// Characters allowed inside a single factor.
/// Interpreter-style factors such as `py3.11` must stay legal.
fn is_factor_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Splits an environment name into its ordered, deduplicated factor set.
///
/// `alldeps-withcov-posix` becomes `["alldeps", "withcov", "posix"]`.
/// Repeated factors keep their first position; empty segments, reserved
/// names and illegal characters are rejected.
///
/// 将环境名称拆分为有序且去重的因子集合。
/// 重复的因子保留其首次出现的位置；空段、保留名称和非法字符会被拒绝。
pub fn parse_factors(name: &str) -> RunnerResult<Vec<String>> {
    if name.is_empty() {
        return Err(RunnerError::MalformedEnvironmentName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(RunnerError::MalformedEnvironmentName {
            name: name.to_string(),
            reason: "name is reserved for configuration sections".to_string(),
        });
    }

    let mut factors: Vec<String> = Vec::new();
    for segment in name.split('-') {
        if segment.is_empty() {
            return Err(RunnerError::MalformedEnvironmentName {
                name: name.to_string(),
                reason: "empty factor segment".to_string(),
            });
        }
        if let Some(bad) = segment.chars().find(|c| !is_factor_char(*c)) {
            return Err(RunnerError::MalformedEnvironmentName {
                name: name.to_string(),
                reason: format!("illegal character '{}' in factor '{}'", bad, segment),
            });
        }
        if !factors.iter().any(|f| f == segment) {
            factors.push(segment.to_string());
        }
    }
    Ok(factors)
}

/// One part of a factor condition.
/// 因子条件的一个组成部分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicatePart {
    /// Holds when the factor is present.
    Factor(String),
    /// Holds when the factor is absent.
    Not(String),
    /// Holds when any of the listed factors is present.
    AnyOf(Vec<String>),
}

/// A parsed factor condition: the conjunction of its parts.
///
/// `alldeps-!windows-{py38,py39}` matches environments that carry `alldeps`,
/// do not carry `windows`, and carry at least one of `py38`/`py39`.
///
/// 一个已解析的因子条件：其各部分的合取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorPredicate {
    parts: Vec<PredicatePart>,
}

impl FactorPredicate {
    /// Parses the text before the `:` of a conditioned line.
    /// Returns an error message for structurally broken conditions.
    pub fn parse(condition: &str) -> Result<Self, String> {
        let mut parts = Vec::new();
        for raw in condition.split('-') {
            if raw.is_empty() {
                return Err(format!("empty part in condition '{}'", condition));
            }
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            if body.starts_with('{') {
                if negated {
                    return Err(format!(
                        "negation cannot apply to an alternation in '{}'",
                        condition
                    ));
                }
                let inner = body
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                    .ok_or_else(|| format!("unbalanced braces in condition '{}'", condition))?;
                let alternatives: Vec<String> = inner
                    .split(',')
                    .map(|alt| alt.trim().to_string())
                    .collect();
                if alternatives.iter().any(|alt| alt.is_empty()) {
                    return Err(format!("empty alternative in condition '{}'", condition));
                }
                if let Some(bad) = alternatives
                    .iter()
                    .flat_map(|alt| alt.chars())
                    .find(|c| !is_factor_char(*c))
                {
                    return Err(format!(
                        "illegal character '{}' in condition '{}'",
                        bad, condition
                    ));
                }
                parts.push(PredicatePart::AnyOf(alternatives));
                continue;
            }
            if body.is_empty() {
                return Err(format!("dangling '!' in condition '{}'", condition));
            }
            if let Some(bad) = body.chars().find(|c| !is_factor_char(*c)) {
                return Err(format!(
                    "illegal character '{}' in condition '{}'",
                    bad, condition
                ));
            }
            if negated {
                parts.push(PredicatePart::Not(body.to_string()));
            } else {
                parts.push(PredicatePart::Factor(body.to_string()));
            }
        }
        Ok(FactorPredicate { parts })
    }

    /// Evaluates the condition against an environment's factor set.
    /// 针对某个环境的因子集合求值该条件。
    pub fn matches(&self, factors: &[String]) -> bool {
        self.parts.iter().all(|part| match part {
            PredicatePart::Factor(f) => factors.iter().any(|have| have == f),
            PredicatePart::Not(f) => !factors.iter().any(|have| have == f),
            PredicatePart::AnyOf(alts) => {
                alts.iter().any(|alt| factors.iter().any(|have| have == alt))
            }
        })
    }
}

/// Splits a configuration value line into its optional condition and payload.
///
/// A line is conditioned only when the text before its first `:` looks like a
/// factor condition; otherwise the whole line, colons included, is the value.
/// `DATABASE_URL = postgresql://localhost/db` therefore never parses as a
/// condition, while `withcov-posix: coverage combine` does.
///
/// # Returns
/// `Ok((None, value))` for unconditional lines, `Ok((Some(p), value))` for
/// conditioned lines, and `Err(message)` for conditions that look like one
/// but are structurally broken.
pub fn split_condition(entry: &str) -> Result<(Option<FactorPredicate>, String), String> {
    let Some(colon) = entry.find(':') else {
        return Ok((None, entry.to_string()));
    };
    let prefix = &entry[..colon];
    let looks_conditional = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| is_factor_char(c) || matches!(c, '!' | '{' | '}' | ',' | '-'));
    if !looks_conditional {
        return Ok((None, entry.to_string()));
    }
    let predicate = FactorPredicate::parse(prefix)?;
    let value = entry[colon + 1..].trim().to_string();
    Ok((Some(predicate), value))
}

/// Expands brace alternations in an environment name specification into the
/// cartesian product of names.
///
/// `py{38,39}-{unit,integ}` yields `py38-unit`, `py38-integ`, `py39-unit`,
/// `py39-integ` in that order. Specifications without braces pass through
/// unchanged.
///
/// 将环境名称中的花括号交替展开为名称的笛卡尔积。
pub fn expand_names(spec: &str) -> RunnerResult<Vec<String>> {
    let Some(open) = spec.find('{') else {
        return Ok(vec![spec.to_string()]);
    };
    let Some(close_rel) = spec[open..].find('}') else {
        return Err(RunnerError::MalformedEnvironmentName {
            name: spec.to_string(),
            reason: "unbalanced '{' in name specification".to_string(),
        });
    };
    let close = open + close_rel;
    let prefix = &spec[..open];
    let suffix = &spec[close + 1..];
    let mut expanded = Vec::new();
    for alternative in spec[open + 1..close].split(',') {
        let candidate = format!("{}{}{}", prefix, alternative.trim(), suffix);
        expanded.extend(expand_names(&candidate)?);
    }
    Ok(expanded)
}

/// Expands every specification in a request list and deduplicates the result
/// while preserving first-occurrence order.
/// 展开请求列表中的每个规格，并在保留首次出现顺序的同时去重。
pub fn expand_name_list(specs: &[String]) -> RunnerResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for spec in specs {
        for name in expand_names(spec)? {
            if !names.iter().any(|n| n == &name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}
