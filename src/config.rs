//! Catalog 构造参数

use std::collections::HashSet;
use std::path::PathBuf;
use crate::common::{CatalogError, PartitionId, Result};

/// 分区号在文件名模板中的占位符
pub const PARTITION_PLACEHOLDER: &str = "{}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// catalog 根目录（相对 `base_directory`）
    pub catalog_directory: PathBuf,
    /// 前缀目录，默认当前工作目录
    pub base_directory:    PathBuf,
    /// 分区总数 N，分区号取 [0, N)
    pub partition_count:   u64,
    /// 文件名模板，`{}` 替换为分区号
    pub filename_template: String,
    /// 一个分区必须同时具备的 group（有序）
    pub required_groups:   Vec<String>,
}

impl CatalogConfig {
    pub fn new(
        catalog_directory: impl Into<PathBuf>,
        partition_count:   u64,
        filename_template: &str,
        required_groups:   &[&str],
    ) -> Self {
        Self {
            catalog_directory: catalog_directory.into(),
            base_directory:    PathBuf::from("."),
            partition_count,
            filename_template: filename_template.into(),
            required_groups:   required_groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn with_base_directory(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_directory = base.into(); self
    }
    pub fn with_partition_count(mut self, n: u64) -> Self {
        self.partition_count = n; self
    }
    pub fn with_required_groups(mut self, groups: &[&str]) -> Self {
        self.required_groups = groups.iter().map(|g| g.to_string()).collect(); self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.filename_template.contains(PARTITION_PLACEHOLDER) {
            return Err(CatalogError::Config(format!(
                "filename_template {:?} has no {PARTITION_PLACEHOLDER} placeholder",
                self.filename_template
            )));
        }
        if self.required_groups.is_empty() {
            return Err(CatalogError::Config("required_groups is empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.required_groups.iter().find(|g| !seen.insert(g.as_str())) {
            return Err(CatalogError::Config(format!("duplicate required group {dup}")));
        }
        Ok(())
    }

    /// `<base_directory>/<catalog_directory>`
    pub fn catalog_root(&self) -> PathBuf {
        self.base_directory.join(&self.catalog_directory)
    }

    pub fn filename(&self, partition_id: PartitionId) -> String {
        self.filename_template.replace(PARTITION_PLACEHOLDER, &partition_id.to_string())
    }

    /// 生成 group 文件在磁盘上的路径：`<root>/<group>/<filename>`
    pub fn group_path(&self, group: &str, partition_id: PartitionId) -> PathBuf {
        self.catalog_root().join(group).join(self.filename(partition_id))
    }
}
