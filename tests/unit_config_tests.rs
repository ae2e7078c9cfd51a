//! # Config Module Unit Tests / 配置模块单元测试
//!
//! This module contains unit tests for configuration parsing: section and
//! key recognition, continuation lines, global options, and the line-number
//! diagnostics attached to every parse error.
//!
//! 此模块包含配置解析的单元测试：节和键的识别、续行、
//! 全局选项，以及附加在每个解析错误上的行号诊断。

use factor_runner::config::{
    load_matrix_config, merge_style, parse_bool, parse_matrix_config, version_satisfied,
    MergeStyle, DEFAULT_WORKDIR_NAME,
};
use factor_runner::errors::RunnerError;
use std::path::Path;

fn parse(text: &str) -> factor_runner::config::MatrixConfig {
    parse_matrix_config(text, Path::new("sub/FactorMatrix.ini")).unwrap()
}

fn parse_err(text: &str) -> RunnerError {
    parse_matrix_config(text, Path::new("sub/FactorMatrix.ini")).unwrap_err()
}

#[cfg(test)]
mod section_tests {
    use super::*;

    #[test]
    fn test_parse_full_configuration() {
        let config = parse(
            "[default]\n\
             envlist = py311-unit, py311-integ\n\
             skip_missing_interpreters = true\n\
             \n\
             [testenv]\n\
             description = base environment\n\
             deps =\n\
             \x20   pytest\n\
             \x20   integ: requests\n\
             commands = pytest -q\n\
             \n\
             [testenv:py311-integ]\n\
             commands = pytest -q -m integ\n",
        );

        assert_eq!(config.options.envlist, vec!["py311-unit", "py311-integ"]);
        assert!(config.options.skip_missing_interpreters);
        assert_eq!(config.base.rules_for("deps").unwrap().len(), 2);
        assert_eq!(config.base.rules_for("commands").unwrap().len(), 1);
        assert!(config.ruleset_for("py311-integ").is_some());
        assert!(config.ruleset_for("py311-unit").is_none());
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let config = parse(
            "# leading comment\n\
             ; alternative comment\n\
             \n\
             [testenv]\n\
             # inside a section\n\
             commands = echo ok\n",
        );
        assert_eq!(config.base.rules_for("commands").unwrap().len(), 1);
    }

    #[test]
    fn test_foreign_sections_are_ignored() {
        // The file can host other tools' configuration without errors.
        let config = parse(
            "[flake8]\n\
             max-line-length = 120\n\
             ignore =\n\
             \x20   E203\n\
             \n\
             [testenv]\n\
             commands = echo ok\n",
        );
        assert_eq!(config.base.rules_for("commands").unwrap().len(), 1);
    }

    #[test]
    fn test_override_declaration_replaces_base_rules() {
        let config = parse(
            "[testenv]\n\
             deps =\n\
             \x20   pytest\n\
             \x20   numpy\n\
             \n\
             [testenv:special]\n\
             deps = requests\n",
        );
        let section = config.ruleset_for("special").unwrap();
        let rules = section.rules_for("deps").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].value, "requests");
        // The base keeps its own rules untouched.
        assert_eq!(config.base.rules_for("deps").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_declaration_is_still_a_declaration() {
        let config = parse(
            "[testenv]\n\
             deps = pytest\n\
             \n\
             [testenv:bare]\n\
             deps =\n",
        );
        let section = config.ruleset_for("bare").unwrap();
        let rules = section.rules_for("deps").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_later_declaration_replaces_earlier_one() {
        let config = parse(
            "[testenv]\n\
             commands = echo first\n\
             commands = echo second\n",
        );
        let rules = config.base.rules_for("commands").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].value, "echo second");
    }

    #[test]
    fn test_conditioned_rules_carry_their_line_numbers() {
        let config = parse(
            "[testenv]\n\
             deps =\n\
             \x20   pytest\n\
             \x20   withcov: coverage\n",
        );
        let rules = config.base.rules_for("deps").unwrap();
        assert_eq!(rules[0].line, 3);
        assert_eq!(rules[1].line, 4);
        assert!(rules[0].predicate.is_none());
        assert!(rules[1].predicate.is_some());
    }
}

#[cfg(test)]
mod parse_error_tests {
    use super::*;

    #[test]
    fn test_unknown_key_in_testenv_is_an_error() {
        let err = parse_err(
            "[testenv]\n\
             commands = echo ok\n\
             nonsense = 1\n",
        );
        match err {
            RunnerError::ConfigParse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("nonsense"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_in_default_is_an_error() {
        let err = parse_err("[default]\nnope = 1\n");
        assert!(matches!(err, RunnerError::ConfigParse { line: 2, .. }));
    }

    #[test]
    fn test_continuation_without_key_is_an_error() {
        let err = parse_err("[testenv]\n    pytest\n");
        match err {
            RunnerError::ConfigParse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("continuation"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_named_section_is_an_error() {
        let err = parse_err(
            "[testenv:dup]\n\
             commands = echo a\n\
             [testenv:dup]\n\
             commands = echo b\n",
        );
        match err {
            RunnerError::ConfigParse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("dup"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_section_header_is_an_error() {
        assert!(matches!(
            parse_err("[testenv\ncommands = echo ok\n"),
            RunnerError::ConfigParse { line: 1, .. }
        ));
    }

    #[test]
    fn test_key_outside_any_section_is_an_error() {
        assert!(matches!(
            parse_err("commands = echo ok\n"),
            RunnerError::ConfigParse { line: 1, .. }
        ));
    }

    #[test]
    fn test_empty_environment_name_in_header_is_an_error() {
        assert!(parse_matrix_config("[testenv:]\n", Path::new("m.ini")).is_err());
    }

    #[test]
    fn test_broken_condition_reports_its_line() {
        let err = parse_err(
            "[testenv]\n\
             deps =\n\
             \x20   pytest\n\
             \x20   {withcov: coverage\n",
        );
        assert!(matches!(err, RunnerError::ConfigParse { line: 4, .. }));
    }

    #[test]
    fn test_error_display_names_path_and_line() {
        let message = parse_err("[default]\nbogus = 1\n").to_string();
        assert!(message.contains("sub/FactorMatrix.ini") || message.contains("sub\\FactorMatrix.ini"));
        assert!(message.contains(":2:"));
    }

    #[test]
    fn test_missing_file_maps_to_a_parse_error() {
        let err = load_matrix_config(Path::new("does/not/exist.ini")).unwrap_err();
        match err {
            RunnerError::ConfigParse { line, message, .. } => {
                assert_eq!(line, 0);
                assert!(message.contains("cannot read file"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

#[cfg(test)]
mod global_option_tests {
    use super::*;

    #[test]
    fn test_envlist_accumulates_across_lines() {
        let config = parse(
            "[default]\n\
             envlist =\n\
             \x20   py311-unit, py311-integ\n\
             \x20   py312-unit\n",
        );
        assert_eq!(
            config.options.envlist,
            vec!["py311-unit", "py311-integ", "py312-unit"]
        );
    }

    #[test]
    fn test_default_env_names_expand_braces() {
        let config = parse("[default]\nenvlist = py{311,312}-unit\n");
        assert_eq!(
            config.default_env_names().unwrap(),
            vec!["py311-unit", "py312-unit"]
        );
    }

    #[test]
    fn test_minversion_accepts_current_version() {
        let config = parse("[default]\nminversion = 0.1\n");
        assert_eq!(config.options.minversion.as_deref(), Some("0.1"));
    }

    #[test]
    fn test_minversion_rejects_future_version() {
        let err = parse_err("[default]\nminversion = 99.0\n");
        match err {
            RunnerError::ConfigParse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("99.0"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_minversion_rejects_garbage() {
        assert!(parse_matrix_config("[default]\nminversion = abc\n", Path::new("m.ini")).is_err());
    }

    #[test]
    fn test_boolean_options_reject_garbage() {
        assert!(parse_matrix_config(
            "[default]\nskip_missing_interpreters = maybe\n",
            Path::new("m.ini")
        )
        .is_err());
    }

    #[test]
    fn test_language_option_is_surfaced() {
        let config = parse("[default]\nlanguage = zh-CN\n");
        assert_eq!(config.options.language.as_deref(), Some("zh-CN"));
    }

    #[test]
    fn test_isolated_build_option_is_parsed() {
        let config = parse("[default]\nisolated_build = true\n");
        assert!(config.options.isolated_build);
        assert!(!parse("[testenv]\ncommands = echo ok\n").options.isolated_build);
    }

    #[test]
    fn test_work_dir_defaults_next_to_config() {
        let config = parse("[testenv]\ncommands = echo ok\n");
        assert_eq!(config.confdir, Path::new("sub"));
        assert_eq!(config.work_dir(), Path::new("sub").join(DEFAULT_WORKDIR_NAME));
    }

    #[test]
    fn test_work_dir_override_is_relative_to_confdir() {
        let config = parse("[default]\nworkdir = build/matrix\n");
        assert_eq!(config.work_dir(), Path::new("sub").join("build/matrix"));
    }

    #[test]
    fn test_confdir_of_bare_filename_is_current_directory() {
        let config = parse_matrix_config("[testenv]\ncommands = echo\n", Path::new("m.ini")).unwrap();
        assert_eq!(config.confdir, Path::new("."));
    }
}

#[cfg(test)]
mod value_parsing_tests {
    use super::*;

    #[test]
    fn test_parse_bool_spellings() {
        for yes in ["true", "True", "yes", "on", "1"] {
            assert_eq!(parse_bool(yes), Some(true), "spelling {:?}", yes);
        }
        for no in ["false", "FALSE", "no", "off", "0"] {
            assert_eq!(parse_bool(no), Some(false), "spelling {:?}", no);
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_version_comparison() {
        assert_eq!(version_satisfied("1.2", "1.2.0"), Some(true));
        assert_eq!(version_satisfied("1.2", "1.3"), Some(true));
        assert_eq!(version_satisfied("1.4", "1.3.9"), Some(false));
        assert_eq!(version_satisfied("2", "1.9"), Some(false));
        assert_eq!(version_satisfied("1.x", "1.0"), None);
    }

    #[test]
    fn test_merge_style_schema() {
        assert_eq!(merge_style("deps"), Some(MergeStyle::Accumulate));
        assert_eq!(merge_style("commands"), Some(MergeStyle::Accumulate));
        assert_eq!(merge_style("description"), Some(MergeStyle::Override));
        assert_eq!(merge_style("timeout"), Some(MergeStyle::Override));
        assert_eq!(merge_style("made_up_key"), None);
    }
}
