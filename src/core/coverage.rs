//! # Coverage Merge Module / 覆盖率合并模块
//!
//! After all environments of an invocation complete, the fragments they
//! declared are gathered into `{workdir}/artifacts/` together with a JSON
//! manifest. The merge runs once, on the orchestrator task, after every
//! producer has finished.
//!
//! 一次调用的所有环境完成后，它们声明的片段会被收集到
//! `{workdir}/artifacts/` 中，并附带一个 JSON 清单。
//! 合并在所有生产者完成后，在编排任务上运行一次。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::models::EnvDescriptor;
use crate::infra::fs;

/// Directory under the work directory that receives merged fragments.
pub const ARTIFACTS_DIR_NAME: &str = "artifacts";
/// Manifest file written next to the merged fragments.
pub const MANIFEST_NAME: &str = "merge.json";

/// One declared fragment and what became of it.
/// 一个声明的片段及其处理结果。
#[derive(Debug, Clone, Serialize)]
pub struct FragmentRecord {
    /// Environment that declared the fragment.
    pub env: String,
    /// Declared path, resolved against the environment's working directory.
    pub source: PathBuf,
    /// Where the fragment was copied, `None` when it was never produced.
    pub destination: Option<PathBuf>,
    /// Whether the fragment existed when the merge ran.
    pub found: bool,
}

/// The manifest written as `merge.json` after each merge.
/// 每次合并后写入的 `merge.json` 清单。
#[derive(Debug, Serialize)]
pub struct MergeManifest {
    pub generated_at: DateTime<Utc>,
    pub fragments: Vec<FragmentRecord>,
}

impl MergeManifest {
    /// Records that were declared but never produced.
    pub fn missing(&self) -> Vec<&FragmentRecord> {
        self.fragments.iter().filter(|f| !f.found).collect()
    }

    /// Records whose fragment was copied into the artifacts directory.
    pub fn merged(&self) -> Vec<&FragmentRecord> {
        self.fragments.iter().filter(|f| f.found).collect()
    }
}

/// Copies every existing fragment declared by `descriptors` into
/// `{workdir}/artifacts/` and writes the manifest. Fragments are prefixed
/// with their environment name, so two environments producing the same
/// file name never collide. A declared fragment that does not exist is
/// recorded with `found: false` and the merge continues.
///
/// Re-running the merge with unchanged fragments overwrites the same
/// destinations; earlier artifacts of other invocations are left in place.
///
/// # Arguments
/// * `workdir` - The invocation's working directory root
/// * `descriptors` - The resolved environments of this invocation
///
/// 将 `descriptors` 声明的每个现有片段复制到 `{workdir}/artifacts/`
/// 并写入清单。片段以其环境名称为前缀，因此两个环境产生相同文件名
/// 也不会冲突。声明但不存在的片段记录为 `found: false`，合并继续。
pub fn merge_artifacts(workdir: &Path, descriptors: &[&EnvDescriptor]) -> Result<MergeManifest> {
    let artifacts_dir = workdir.join(ARTIFACTS_DIR_NAME);
    fs::ensure_dir(&artifacts_dir)?;

    let mut fragments = Vec::new();
    for descriptor in descriptors {
        for source in descriptor.coverage_paths() {
            let record = if source.exists() {
                let destination = copy_fragment(&descriptor.name, &source, &artifacts_dir)?;
                FragmentRecord {
                    env: descriptor.name.clone(),
                    source,
                    destination: Some(destination),
                    found: true,
                }
            } else {
                FragmentRecord {
                    env: descriptor.name.clone(),
                    source,
                    destination: None,
                    found: false,
                }
            };
            fragments.push(record);
        }
    }

    let manifest = MergeManifest {
        generated_at: Utc::now(),
        fragments,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .context("Failed to serialize merge manifest")?;
    let manifest_path = artifacts_dir.join(MANIFEST_NAME);
    std::fs::write(&manifest_path, json)
        .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;

    Ok(manifest)
}

fn copy_fragment(env: &str, source: &Path, artifacts_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("fragment");
    let destination = artifacts_dir.join(format!("{}-{}", env, file_name));
    if source.is_dir() {
        fs::copy_dir_all(source, &destination)?;
    } else {
        std::fs::copy(source, &destination).with_context(|| {
            format!(
                "Failed to copy fragment {} to {}",
                source.display(),
                destination.display()
            )
        })?;
    }
    Ok(destination)
}
