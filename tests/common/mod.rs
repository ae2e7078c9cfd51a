// Shared test helpers for integration tests
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Creates a temporary project directory holding a configuration matrix.
/// The returned `TempDir` keeps the directory alive for the test's lifetime.
///
/// 创建一个包含配置矩阵的临时项目目录。
/// 返回的 `TempDir` 在测试的生命周期内保持该目录存在。
pub fn setup_project(matrix: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let config_path = temp_dir.path().join("FactorMatrix.ini");
    fs::write(&config_path, matrix).expect("Failed to write configuration matrix");
    (temp_dir, config_path)
}
