//! 原生量访问：一个分区内的物理列
//!
//! - [`NativeAddress`]：物理列地址 `(group, field[, index])` 或合成的分区号列
//! - [`GroupSource`]  ：按 (partition_id, group) 打开一个 group 的存储抽象
//! - [`PartitionHandle`]：一个分区所有必需 group 的已打开 reader 集合，
//!   drop 时全部关闭

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::sync::Arc;
use crate::array::Array;
use crate::common::{CatalogError, PartitionId, Result};
use crate::field_type::FieldMeta;
use crate::segment::SegmentReader;

// ── NativeAddress ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NativeAddress {
    /// 合成列：每行都是分区号；无需打开文件即可求值
    PartitionId,
    /// 标量字段的整列
    Field { group: String, field: String },
    /// 定长向量字段的第 `index` 列
    Element { group: String, field: String, index: u32 },
}

impl NativeAddress {
    pub fn field(group: &str, field: &str) -> Self {
        Self::Field { group: group.into(), field: field.into() }
    }

    pub fn element(group: &str, field: &str, index: u32) -> Self {
        Self::Element { group: group.into(), field: field.into(), index }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            Self::PartitionId => None,
            Self::Field { group, .. } | Self::Element { group, .. } => Some(group),
        }
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartitionId                     => write!(f, "<partition_id>"),
            Self::Field { group, field }          => write!(f, "{group}/{field}"),
            Self::Element { group, field, index } => write!(f, "{group}/{field}[{index}]"),
        }
    }
}

// ── 存储抽象 ──────────────────────────────────────────────────────────────────

/// 一个已打开的 group（一个分区的一张物理表）
pub trait GroupReader: Send {
    fn fields(&self) -> &[FieldMeta];
    fn num_rows(&self) -> u64;
    /// 读取整列；向量列按行优先展开
    fn read_field(&mut self, name: &str) -> Result<Array>;
}

impl<R: Read + Seek + Send> GroupReader for SegmentReader<R> {
    fn fields(&self) -> &[FieldMeta] { self.schema() }
    fn num_rows(&self) -> u64 { SegmentReader::num_rows(self) }
    fn read_field(&mut self, name: &str) -> Result<Array> {
        SegmentReader::read_field(self, name)
    }
}

/// 分区存储。group 不存在（文件缺失或无法打开）时返回 `None`：
/// 覆盖稀疏是常态，调用方据此跳过分区，不视为错误。
pub trait GroupSource: Send + Sync {
    fn open_group(&self, partition_id: PartitionId, group: &str) -> Option<Box<dyn GroupReader>>;
}

impl<T: GroupSource + ?Sized> GroupSource for Arc<T> {
    fn open_group(&self, partition_id: PartitionId, group: &str) -> Option<Box<dyn GroupReader>> {
        (**self).open_group(partition_id, group)
    }
}

/// 磁盘上的 Segment 文件打开后的具体类型
pub type SegmentFileReader = SegmentReader<BufReader<File>>;

// ── PartitionHandle ───────────────────────────────────────────────────────────

/// 一个完整分区的访问句柄
///
/// 独占该分区所有 group 的 reader；`close()` 或 drop 时释放，
/// 不会跨分区缓存。
pub struct PartitionHandle {
    partition_id: PartitionId,
    /// 按 required_groups 顺序打开
    groups:       Vec<(String, Box<dyn GroupReader>)>,
}

impl PartitionHandle {
    /// 打开分区的全部必需 group；任一缺失则返回 `None`，
    /// 已打开的 reader 随之释放。
    pub fn open(
        source:          &dyn GroupSource,
        partition_id:    PartitionId,
        required_groups: &[String],
    ) -> Option<Self> {
        let mut groups = Vec::with_capacity(required_groups.len());
        for name in required_groups {
            match source.open_group(partition_id, name) {
                Some(reader) => groups.push((name.clone(), reader)),
                None => {
                    log::trace!("partition {partition_id}: group {name} absent, skipping");
                    return None;
                }
            }
        }
        Some(Self { partition_id, groups })
    }

    pub fn partition_id(&self) -> PartitionId { self.partition_id }

    /// 分区行数，取第一个 group 的行数
    pub fn num_rows(&self) -> usize {
        self.groups.first().map(|(_, g)| g.num_rows() as usize).unwrap_or(0)
    }

    /// group 名 → 该 group 的字段定义
    pub fn schema(&self) -> BTreeMap<&str, &[FieldMeta]> {
        self.groups.iter().map(|(n, g)| (n.as_str(), g.fields())).collect()
    }

    /// 读取一个原生量的原始列数据
    pub fn fetch(&mut self, address: &NativeAddress) -> Result<Array> {
        match address {
            NativeAddress::PartitionId => {
                Ok(Array::filled_i64(self.partition_id as i64, self.num_rows()))
            }
            NativeAddress::Field { group, field } => {
                let (meta, reader) = self.locate(group, field)?;
                if meta.is_vector() {
                    return Err(CatalogError::SchemaMismatch(format!(
                        "{address} is a vector field of width {}; address one column", meta.width
                    )));
                }
                reader.read_field(field)
            }
            NativeAddress::Element { group, field, index } => {
                let (meta, reader) = self.locate(group, field)?;
                if !meta.is_vector() {
                    return Err(CatalogError::SchemaMismatch(format!(
                        "{address} indexes a scalar field"
                    )));
                }
                reader.read_field(field)?.column(*index as usize, meta.width as usize)
            }
        }
    }

    fn locate(&mut self, group: &str, field: &str) -> Result<(FieldMeta, &mut Box<dyn GroupReader>)> {
        let (_, reader) = self.groups.iter_mut()
            .find(|(n, _)| n == group)
            .ok_or_else(|| CatalogError::FieldNotFound(format!("group {group}")))?;
        let meta = reader.fields().iter()
            .find(|m| m.name == field)
            .cloned()
            .ok_or_else(|| CatalogError::FieldNotFound(format!("{group}/{field}")))?;
        Ok((meta, reader))
    }

    /// 显式关闭；等价于 drop
    pub fn close(self) {}
}

impl Drop for PartitionHandle {
    fn drop(&mut self) {
        log::trace!("partition {}: closing {} group reader(s)", self.partition_id, self.groups.len());
        self.groups.clear();
    }
}

impl fmt::Debug for PartitionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionHandle")
            .field("partition_id", &self.partition_id)
            .field("groups", &self.groups.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}
