//! # Resolver Module Unit Tests / 解析器模块单元测试
//!
//! This module contains unit tests for descriptor resolution: factor
//! conditions filtering rules, accumulation and override merge semantics,
//! scalar keys, command parsing and the failure modes that surface before
//! anything runs.
//!
//! 此模块包含描述符解析的单元测试：因子条件过滤规则、
//! 累积与覆盖合并语义、标量键、命令解析，
//! 以及在任何运行开始之前浮现的失败模式。

use factor_runner::config::parse_matrix_config;
use factor_runner::errors::RunnerError;
use factor_runner::resolver::{resolve, DEFAULT_INSTALL_COMMAND};
use std::path::Path;

const MATRIX: &str = "\
[default]
envlist = py311-{alldeps,mindeps}-{withcov,nocov}

[testenv]
description = matrix environment {envname}
deps =
    pytest
    alldeps: numpy
    withcov: coverage
extras =
    alldeps: full
setenv =
    withcov: COVERAGE_FILE = {envdir}/.coverage
commands =
    pytest -q {posargs}
    withcov-posix: coverage combine
coverage =
    withcov: {envdir}/.coverage
";

fn config() -> factor_runner::config::MatrixConfig {
    parse_matrix_config(MATRIX, Path::new("proj/FactorMatrix.ini")).unwrap()
}

fn resolve_ok(name: &str) -> factor_runner::models::EnvDescriptor {
    resolve(&config(), name, &[]).unwrap()
}

#[cfg(test)]
mod factor_filtering_tests {
    use super::*;

    #[test]
    fn test_alldeps_nocov_selects_matching_lines() {
        let descriptor = resolve_ok("py311-alldeps-nocov");

        assert_eq!(descriptor.factors, vec!["py311", "alldeps", "nocov"]);
        assert_eq!(descriptor.deps, vec!["pytest", "numpy"]);
        assert_eq!(descriptor.extras, vec!["full"]);
        assert!(descriptor.setenv.is_empty());
        assert!(descriptor.coverage.is_empty());
        assert!(!descriptor.produces_coverage());
        // The withcov-posix command does not match either.
        assert_eq!(descriptor.commands.len(), 1);
        assert_eq!(descriptor.commands[0].line, "pytest -q ");
    }

    #[test]
    fn test_withcov_posix_keeps_declaration_order() {
        let descriptor = resolve_ok("py311-withcov-posix");

        assert_eq!(descriptor.deps, vec!["pytest", "coverage"]);
        assert_eq!(descriptor.commands.len(), 2);
        assert_eq!(descriptor.commands[0].line, "pytest -q ");
        assert_eq!(descriptor.commands[1].line, "coverage combine");

        assert_eq!(descriptor.setenv.len(), 1);
        assert_eq!(descriptor.setenv[0].name, "COVERAGE_FILE");
        assert!(descriptor.setenv[0].value.ends_with(".coverage"));
        assert!(descriptor.produces_coverage());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = config();
        let first = resolve(&config, "py311-alldeps-withcov", &[]).unwrap();
        let second = resolve(&config, "py311-alldeps-withcov", &[]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.cache_key(), second.cache_key());
    }

    #[test]
    fn test_description_interpolates_the_name() {
        let descriptor = resolve_ok("py311-mindeps-nocov");
        assert_eq!(descriptor.description, "matrix environment py311-mindeps-nocov");
    }

    #[test]
    fn test_posargs_flow_into_commands() {
        let posargs = vec!["-k".to_string(), "smoke".to_string()];
        let descriptor = resolve(&config(), "py311-mindeps-nocov", &posargs).unwrap();
        assert_eq!(descriptor.commands[0].line, "pytest -q -k smoke");
    }

    #[test]
    fn test_malformed_name_fails_resolution() {
        let err = resolve(&config(), "py311--nocov", &[]).unwrap_err();
        assert!(matches!(&err, RunnerError::MalformedEnvironmentName { .. }));
        assert!(err.is_resolution_class());
    }
}

#[cfg(test)]
mod merge_semantics_tests {
    use super::*;

    #[test]
    fn test_override_section_replaces_declared_keys_only() {
        let text = format!(
            "{}\n[testenv:py311-alldeps-nocov]\ncommands = echo override\n",
            MATRIX
        );
        let config = parse_matrix_config(&text, Path::new("proj/FactorMatrix.ini")).unwrap();
        let descriptor = resolve(&config, "py311-alldeps-nocov", &[]).unwrap();

        assert_eq!(descriptor.commands.len(), 1);
        assert_eq!(descriptor.commands[0].line, "echo override");
        // Keys the override never declared still come from the base.
        assert_eq!(descriptor.deps, vec!["pytest", "numpy"]);
    }

    #[test]
    fn test_scalar_key_last_match_wins() {
        let text = "\
[testenv]
description = generic
description = mindeps: minimal dependency set
";
        let config = parse_matrix_config(text, Path::new("m.ini")).unwrap();

        let minimal = resolve(&config, "py311-mindeps", &[]).unwrap();
        assert_eq!(minimal.description, "minimal dependency set");

        let generic = resolve(&config, "py311-alldeps", &[]).unwrap();
        assert_eq!(generic.description, "generic");
    }

    #[test]
    fn test_accumulating_key_preserves_duplicates() {
        let text = "\
[testenv]
deps =
    pytest
    pytest
";
        let config = parse_matrix_config(text, Path::new("m.ini")).unwrap();
        let descriptor = resolve(&config, "py311", &[]).unwrap();
        assert_eq!(descriptor.deps, vec!["pytest", "pytest"]);
    }

    #[test]
    fn test_unmentioned_keys_take_defaults() {
        let config = parse_matrix_config("[testenv]\ncommands = echo ok\n", Path::new("m.ini")).unwrap();
        let descriptor = resolve(&config, "py311", &[]).unwrap();

        assert!(descriptor.description.is_empty());
        assert!(descriptor.interpreter.is_empty());
        assert!(descriptor.deps.is_empty());
        assert!(descriptor.timeout.is_none());
        assert!(!descriptor.skip_install);
        assert_eq!(descriptor.install_command, DEFAULT_INSTALL_COMMAND);
        assert_eq!(descriptor.changedir, Path::new("."));
    }
}

#[cfg(test)]
mod descriptor_field_tests {
    use super::*;

    #[test]
    fn test_ignore_failure_marker_is_stripped() {
        let text = "\
[testenv]
commands =
    - coverage erase
    pytest -q
";
        let config = parse_matrix_config(text, Path::new("m.ini")).unwrap();
        let descriptor = resolve(&config, "py311", &[]).unwrap();

        assert_eq!(descriptor.commands.len(), 2);
        assert!(descriptor.commands[0].ignore_failure);
        assert_eq!(descriptor.commands[0].line, "coverage erase");
        assert!(!descriptor.commands[1].ignore_failure);
    }

    #[test]
    fn test_bare_dash_command_is_an_error() {
        let config = parse_matrix_config("[testenv]\ncommands = -\n", Path::new("m.ini")).unwrap();
        let err = resolve(&config, "py311", &[]).unwrap_err();
        assert!(matches!(err, RunnerError::Resolution { .. }));
    }

    #[test]
    fn test_timeout_parses_whole_seconds() {
        let config = parse_matrix_config("[testenv]\ntimeout = 45\n", Path::new("m.ini")).unwrap();
        assert_eq!(resolve(&config, "py311", &[]).unwrap().timeout, Some(45));
    }

    #[test]
    fn test_invalid_timeout_is_an_error() {
        let config =
            parse_matrix_config("[testenv]\ntimeout = soon\n", Path::new("m.ini")).unwrap();
        let err = resolve(&config, "py311", &[]).unwrap_err();
        match err {
            RunnerError::Resolution { env, message } => {
                assert_eq!(env, "py311");
                assert!(message.contains("soon"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_skip_install_is_an_error() {
        let config =
            parse_matrix_config("[testenv]\nskip_install = perhaps\n", Path::new("m.ini")).unwrap();
        assert!(resolve(&config, "py311", &[]).is_err());
    }

    #[test]
    fn test_setenv_requires_name_value_shape() {
        let config =
            parse_matrix_config("[testenv]\nsetenv = JUSTANAME\n", Path::new("m.ini")).unwrap();
        let err = resolve(&config, "py311", &[]).unwrap_err();
        assert!(matches!(err, RunnerError::Resolution { .. }));

        let config =
            parse_matrix_config("[testenv]\nsetenv = = value\n", Path::new("m.ini")).unwrap();
        assert!(resolve(&config, "py311", &[]).is_err());
    }

    #[test]
    fn test_relative_changedir_anchors_at_confdir() {
        let config = parse_matrix_config(
            "[testenv]\nchangedir = src/pkg\n",
            Path::new("proj/FactorMatrix.ini"),
        )
        .unwrap();
        let descriptor = resolve(&config, "py311", &[]).unwrap();
        assert_eq!(descriptor.changedir, Path::new("proj").join("src/pkg"));
    }

    #[test]
    fn test_env_directories_derive_from_workdir() {
        let descriptor = resolve_ok("py311-mindeps-nocov");
        let workdir = config().work_dir();
        assert_eq!(descriptor.envdir, workdir.join("envs").join("py311-mindeps-nocov"));
        assert_eq!(descriptor.envtmpdir, descriptor.envdir.join("tmp"));
    }

    #[test]
    fn test_unresolved_placeholder_fails_before_any_execution() {
        let config =
            parse_matrix_config("[testenv]\ncommands = echo {undefined}\n", Path::new("m.ini"))
                .unwrap();
        let err = resolve(&config, "py311", &[]).unwrap_err();
        assert!(err.is_resolution_class());
        match err {
            RunnerError::UnresolvedPlaceholder { placeholder, .. } => {
                assert_eq!(placeholder, "undefined");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_install_command_keeps_late_placeholder() {
        let descriptor = resolve_ok("py311-alldeps-nocov");
        assert!(descriptor.install_command.contains("{packages}"));
    }
}
