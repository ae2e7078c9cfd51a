//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for managing the work directory tree:
//! creating and recreating directories, copying artifact files and
//! directories, and the stamp files that record context cache keys.
//!
//! 此模块提供管理工作目录树的实用功能：
//! 创建和重建目录、复制产物文件和目录，
//! 以及记录上下文缓存键的标记文件。

use anyhow::{Context, Result};
use fs_extra::dir::{CopyOptions, copy};
use std::fs;
use std::path::Path;

/// Creates a directory and all missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Recreates a directory empty, removing any previous content.
/// 重建一个空目录，移除之前的任何内容。
pub fn fresh_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to clear directory: {}", path.display()))?;
    }
    ensure_dir(path)
}

/// Copies the entire content of a source directory to a destination directory.
///
/// # Arguments
/// * `from` - Source directory path
/// * `to` - Destination directory path
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    let mut options = CopyOptions::new();
    options.overwrite = true;
    options.copy_inside = true;
    copy(from, to, &options)?;
    Ok(())
}

/// Reads a stamp file, `None` when it does not exist or cannot be read.
pub fn read_stamp(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Writes a stamp file recording `content`.
pub fn write_stamp(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .with_context(|| format!("Failed to write stamp file: {}", path.display()))
}
