//! # Factor Module Unit Tests / 因子模块单元测试
//!
//! This module contains unit tests for the factor engine: splitting
//! environment names into factor sets, parsing and evaluating factor
//! conditions, and brace expansion of name specifications.
//!
//! 此模块包含因子引擎的单元测试：将环境名称拆分为因子集合、
//! 解析并求值因子条件，以及名称规格的花括号展开。

use factor_runner::core::factor::{
    expand_name_list, expand_names, parse_factors, split_condition, FactorPredicate,
};
use factor_runner::errors::RunnerError;

fn factors(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod factor_parsing_tests {
    use super::*;

    #[test]
    fn test_parse_factors_basic() {
        let parsed = parse_factors("alldeps-withcov-posix").unwrap();
        assert_eq!(parsed, factors(&["alldeps", "withcov", "posix"]));
    }

    #[test]
    fn test_parse_factors_single() {
        let parsed = parse_factors("py311").unwrap();
        assert_eq!(parsed, factors(&["py311"]));
    }

    #[test]
    fn test_parse_factors_duplicate_keeps_first_position() {
        let parsed = parse_factors("unit-fast-unit").unwrap();
        assert_eq!(parsed, factors(&["unit", "fast"]));
    }

    #[test]
    fn test_parse_factors_allows_dots_and_underscores() {
        let parsed = parse_factors("py3.11-my_suite").unwrap();
        assert_eq!(parsed, factors(&["py3.11", "my_suite"]));
    }

    #[test]
    fn test_parse_factors_rejects_empty_name() {
        let err = parse_factors("").unwrap_err();
        assert!(matches!(err, RunnerError::MalformedEnvironmentName { .. }));
    }

    #[test]
    fn test_parse_factors_rejects_reserved_names() {
        for reserved in ["default", "testenv"] {
            let err = parse_factors(reserved).unwrap_err();
            match err {
                RunnerError::MalformedEnvironmentName { name, reason } => {
                    assert_eq!(name, reserved);
                    assert!(reason.contains("reserved"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_factors_rejects_empty_segment() {
        assert!(parse_factors("unit--fast").is_err());
        assert!(parse_factors("-unit").is_err());
        assert!(parse_factors("unit-").is_err());
    }

    #[test]
    fn test_parse_factors_rejects_illegal_characters() {
        let err = parse_factors("unit-f@st").unwrap_err();
        match err {
            RunnerError::MalformedEnvironmentName { reason, .. } => {
                assert!(reason.contains('@'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

#[cfg(test)]
mod predicate_tests {
    use super::*;

    #[test]
    fn test_single_factor_matches_when_present() {
        let predicate = FactorPredicate::parse("withcov").unwrap();
        assert!(predicate.matches(&factors(&["py311", "withcov"])));
        assert!(!predicate.matches(&factors(&["py311", "nocov"])));
    }

    #[test]
    fn test_negation_matches_when_absent() {
        let predicate = FactorPredicate::parse("!windows").unwrap();
        assert!(predicate.matches(&factors(&["py311", "posix"])));
        assert!(!predicate.matches(&factors(&["py311", "windows"])));
    }

    #[test]
    fn test_conjunction_requires_all_parts() {
        let predicate = FactorPredicate::parse("alldeps-!windows").unwrap();
        assert!(predicate.matches(&factors(&["alldeps", "posix"])));
        assert!(!predicate.matches(&factors(&["alldeps", "windows"])));
        assert!(!predicate.matches(&factors(&["mindeps", "posix"])));
    }

    #[test]
    fn test_alternation_requires_any_listed_factor() {
        let predicate = FactorPredicate::parse("{py38,py39}").unwrap();
        assert!(predicate.matches(&factors(&["py38", "unit"])));
        assert!(predicate.matches(&factors(&["py39", "unit"])));
        assert!(!predicate.matches(&factors(&["py311", "unit"])));
    }

    #[test]
    fn test_alternation_trims_whitespace() {
        let predicate = FactorPredicate::parse("{py38, py39}").unwrap();
        assert!(predicate.matches(&factors(&["py39"])));
    }

    #[test]
    fn test_alternation_combined_with_factor() {
        let predicate = FactorPredicate::parse("alldeps-{py38,py39}").unwrap();
        assert!(predicate.matches(&factors(&["alldeps", "py38"])));
        assert!(!predicate.matches(&factors(&["mindeps", "py38"])));
    }

    #[test]
    fn test_negated_alternation_is_rejected() {
        let err = FactorPredicate::parse("!{py38,py39}").unwrap_err();
        assert!(err.contains("negation"));
    }

    #[test]
    fn test_dangling_negation_is_rejected() {
        assert!(FactorPredicate::parse("!").is_err());
        assert!(FactorPredicate::parse("alldeps-!").is_err());
    }

    #[test]
    fn test_empty_part_is_rejected() {
        assert!(FactorPredicate::parse("alldeps--posix").is_err());
        assert!(FactorPredicate::parse("").is_err());
    }

    #[test]
    fn test_unbalanced_braces_are_rejected() {
        assert!(FactorPredicate::parse("{py38").is_err());
    }

    #[test]
    fn test_empty_alternative_is_rejected() {
        assert!(FactorPredicate::parse("{py38,}").is_err());
    }
}

#[cfg(test)]
mod condition_split_tests {
    use super::*;

    #[test]
    fn test_unconditional_line_passes_through() {
        let (predicate, value) = split_condition("pytest -q").unwrap();
        assert!(predicate.is_none());
        assert_eq!(value, "pytest -q");
    }

    #[test]
    fn test_conditioned_line_splits_at_first_colon() {
        let (predicate, value) = split_condition("withcov-posix: coverage combine").unwrap();
        let predicate = predicate.expect("expected a condition");
        assert!(predicate.matches(&factors(&["withcov", "posix"])));
        assert!(!predicate.matches(&factors(&["withcov", "windows"])));
        assert_eq!(value, "coverage combine");
    }

    #[test]
    fn test_value_with_url_is_not_a_condition() {
        // The prefix contains spaces and '=', so the colon belongs to the value.
        let entry = "DATABASE_URL = postgresql://localhost/db";
        let (predicate, value) = split_condition(entry).unwrap();
        assert!(predicate.is_none());
        assert_eq!(value, entry);
    }

    #[test]
    fn test_broken_condition_is_an_error() {
        assert!(split_condition("{py38: pytest").is_err());
        assert!(split_condition("!: pytest").is_err());
    }

    #[test]
    fn test_alternation_condition_on_value_line() {
        let (predicate, value) = split_condition("{py38,py39}: pip install backports").unwrap();
        assert!(predicate.unwrap().matches(&factors(&["py38"])));
        assert_eq!(value, "pip install backports");
    }
}

#[cfg(test)]
mod expansion_tests {
    use super::*;

    #[test]
    fn test_expansion_without_braces_passes_through() {
        assert_eq!(expand_names("py311-unit").unwrap(), factors(&["py311-unit"]));
    }

    #[test]
    fn test_single_brace_group_expands() {
        let names = expand_names("py{38,39}-unit").unwrap();
        assert_eq!(names, factors(&["py38-unit", "py39-unit"]));
    }

    #[test]
    fn test_cartesian_product_order_is_left_to_right() {
        let names = expand_names("py{38,39}-{unit,integ}").unwrap();
        assert_eq!(
            names,
            factors(&["py38-unit", "py38-integ", "py39-unit", "py39-integ"])
        );
    }

    #[test]
    fn test_alternatives_are_trimmed() {
        let names = expand_names("py{38, 39}").unwrap();
        assert_eq!(names, factors(&["py38", "py39"]));
    }

    #[test]
    fn test_unbalanced_brace_is_an_error() {
        let err = expand_names("py{38,39-unit").unwrap_err();
        assert!(matches!(err, RunnerError::MalformedEnvironmentName { .. }));
    }

    #[test]
    fn test_name_list_deduplicates_preserving_order() {
        let specs = vec!["py38-unit".to_string(), "py{38,39}-unit".to_string()];
        let names = expand_name_list(&specs).unwrap();
        assert_eq!(names, factors(&["py38-unit", "py39-unit"]));
    }

    #[test]
    fn test_empty_name_list_expands_to_nothing() {
        assert!(expand_name_list(&[]).unwrap().is_empty());
    }
}
