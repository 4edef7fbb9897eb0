//! 内存中的分区存储
//!
//! 与 [`DirectorySource`](crate::storage::DirectorySource) 语义一致，
//! 另外记录 open / close 次数，便于观察谓词下推与句柄释放。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use crate::accessor::{GroupReader, GroupSource};
use crate::array::Array;
use crate::common::{CatalogError, PartitionId, Result};
use crate::field_type::FieldMeta;

// ── MemoryTable ───────────────────────────────────────────────────────────────

/// 一个 group 的内存表
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    fields:   Vec<FieldMeta>,
    columns:  HashMap<String, Array>,
    num_rows: Option<usize>,
}

impl MemoryTable {
    pub fn new() -> Self { Self::default() }

    pub fn with_scalar(self, name: &str, values: Array) -> Result<Self> {
        let meta = FieldMeta::scalar(name, values.field_type());
        self.with_field(meta, values)
    }

    /// 向量列：`values` 按行优先展开，长度为 `rows × width`
    pub fn with_vector(self, name: &str, width: u32, values: Array) -> Result<Self> {
        let meta = FieldMeta::vector(name, values.field_type(), width);
        self.with_field(meta, values)
    }

    fn with_field(mut self, meta: FieldMeta, values: Array) -> Result<Self> {
        let width = meta.width as usize;
        if width == 0 || values.len() % width != 0 {
            return Err(CatalogError::SchemaMismatch(format!(
                "field {}: {} values do not split into rows of width {width}",
                meta.name, values.len()
            )));
        }
        let rows = values.len() / width;
        if let Some(n) = self.num_rows.filter(|n| *n != rows) {
            return Err(CatalogError::SchemaMismatch(format!(
                "field {} has {rows} rows, table has {n}", meta.name
            )));
        }
        if self.columns.contains_key(&meta.name) {
            return Err(CatalogError::SchemaMismatch(format!("duplicate field {}", meta.name)));
        }
        self.num_rows = Some(rows);
        self.columns.insert(meta.name.clone(), values);
        self.fields.push(meta);
        Ok(self)
    }
}

struct MemoryReader {
    table:  MemoryTable,
    closes: Arc<AtomicUsize>,
}

impl GroupReader for MemoryReader {
    fn fields(&self) -> &[FieldMeta] { &self.table.fields }
    fn num_rows(&self) -> u64 { self.table.num_rows.unwrap_or(0) as u64 }
    fn read_field(&mut self, name: &str) -> Result<Array> {
        self.table.columns.get(name)
            .cloned()
            .ok_or_else(|| CatalogError::FieldNotFound(name.into()))
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ── MemorySource ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<(PartitionId, String), MemoryTable>,
    opens:  AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, partition_id: PartitionId, group: &str, table: MemoryTable) {
        self.tables.insert((partition_id, group.into()), table);
    }

    pub fn with_group(mut self, partition_id: PartitionId, group: &str, table: MemoryTable) -> Self {
        self.insert(partition_id, group, table); self
    }

    /// 成功打开的 group 次数
    pub fn open_count(&self) -> usize { self.opens.load(Ordering::SeqCst) }

    /// 已释放的 group reader 数
    pub fn close_count(&self) -> usize { self.closes.load(Ordering::SeqCst) }
}

impl GroupSource for MemorySource {
    fn open_group(&self, partition_id: PartitionId, group: &str) -> Option<Box<dyn GroupReader>> {
        let table = self.tables.get(&(partition_id, group.to_string()))?.clone();
        self.opens.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MemoryReader { table, closes: Arc::clone(&self.closes) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rejects_mismatched_rows() {
        let t = MemoryTable::new().with_scalar("Z", Array::Float64(vec![1.0, 2.0])).unwrap();
        assert!(t.clone().with_scalar("RA", Array::Float64(vec![1.0])).is_err());
        assert!(t.clone().with_vector("AMAG", 5, Array::Float32(vec![0.0; 9])).is_err());
        assert!(t.with_scalar("Z", Array::Float64(vec![3.0, 4.0])).is_err());
    }

    #[test]
    fn counts_opens_and_closes() {
        let t = MemoryTable::new().with_scalar("Z", Array::Float64(vec![1.0])).unwrap();
        let src = MemorySource::new().with_group(0, "truth", t);
        {
            let g = src.open_group(0, "truth");
            assert!(g.is_some());
            assert!(src.open_group(1, "truth").is_none());
        }
        assert_eq!(src.open_count(), 1);
        assert_eq!(src.close_count(), 1);
    }
}
