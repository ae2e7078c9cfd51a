use criterion::{criterion_group, criterion_main, Criterion};
use factor_runner::config::parse_matrix_config;
use factor_runner::resolver::resolve;
use std::path::Path;

const MATRIX: &str = "\
[default]
envlist = py{311,312,313}-{unit,cov}-{sqlite,postgres}

[testenv]
description = test suite for {envname}
deps =
    pytest>=8
    cov: pytest-cov
    postgres: psycopg[binary]
setenv =
    PYTHONHASHSEED = 0
    cov: COVERAGE_FILE = {envdir}/.coverage
    postgres: DATABASE_URL = postgresql://localhost/test
commands =
    unit: pytest -q {posargs}
    cov: pytest -q --cov {posargs}
coverage =
    cov: {envdir}/.coverage

[testenv:py313-cov-postgres]
extras = full
";

fn bench_parse_matrix(c: &mut Criterion) {
    let path = Path::new("FactorMatrix.ini");
    c.bench_function("parse_matrix", |b| {
        b.iter(|| parse_matrix_config(MATRIX, path).unwrap());
    });
}

fn bench_resolve_all(c: &mut Criterion) {
    let config = parse_matrix_config(MATRIX, Path::new("FactorMatrix.ini")).unwrap();
    let names = config.default_env_names().unwrap();
    let posargs = vec!["-k".to_string(), "smoke".to_string()];

    c.bench_function("resolve_all", |b| {
        b.iter(|| {
            for name in &names {
                let _ = resolve(&config, name, &posargs).unwrap();
            }
        });
    });
}

fn bench_cache_key(c: &mut Criterion) {
    let config = parse_matrix_config(MATRIX, Path::new("FactorMatrix.ini")).unwrap();
    let descriptor = resolve(&config, "py313-cov-postgres", &[]).unwrap();

    c.bench_function("cache_key", |b| {
        b.iter(|| descriptor.cache_key());
    });
}

criterion_group!(
    benches,
    bench_parse_matrix,
    bench_resolve_all,
    bench_cache_key
);
criterion_main!(benches);
