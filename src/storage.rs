//! 磁盘上的分区存储：`<root>/<group>/<filename_template(id)>` 的 Segment 文件

use std::io::ErrorKind;
use std::path::PathBuf;
use crate::accessor::{GroupReader, GroupSource, SegmentFileReader};
use crate::common::{CatalogError, PartitionId};
use crate::config::CatalogConfig;

/// 按目录布局定位 Segment 文件的 [`GroupSource`]
#[derive(Debug, Clone)]
pub struct DirectorySource {
    config: CatalogConfig,
}

impl DirectorySource {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CatalogConfig { &self.config }

    pub fn group_path(&self, group: &str, partition_id: PartitionId) -> PathBuf {
        self.config.group_path(group, partition_id)
    }
}

impl GroupSource for DirectorySource {
    fn open_group(&self, partition_id: PartitionId, group: &str) -> Option<Box<dyn GroupReader>> {
        let path = self.group_path(group, partition_id);
        match SegmentFileReader::open_path(&path) {
            Ok(reader) => Some(Box::new(reader)),
            // 文件缺失：该分区不覆盖这块天区，正常情况
            Err(CatalogError::Io(e)) if e.kind() == ErrorKind::NotFound => None,
            // 无法解析的文件同样视为缺失，不作为失败上报
            Err(e) => {
                log::debug!("cannot open {}: {e}; treating group {group} as absent", path.display());
                None
            }
        }
    }
}
