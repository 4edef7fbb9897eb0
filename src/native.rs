//! 原生量发现
//!
//! 只检查第一个完整分区的 schema，结果在 catalog 实例内缓存一次。
//! 后续分区多出来的字段不会被发现：catalog 假定各分区 schema 一致。

use std::collections::BTreeSet;
use std::sync::OnceLock;
use crate::accessor::{NativeAddress, PartitionHandle};
use crate::common::{CatalogError, Result};
use crate::partition::PartitionLayout;

#[derive(Debug, Default)]
pub struct NativeQuantityCatalog {
    cache: OnceLock<BTreeSet<NativeAddress>>,
}

impl NativeQuantityCatalog {
    pub fn new() -> Self { Self::default() }

    /// 返回原生量集合；首次调用时扫描一个分区
    ///
    /// 没有完整分区时返回 `EmptyCatalog`，且不缓存失败结果。
    pub fn discover(&self, layout: &PartitionLayout<'_>) -> Result<&BTreeSet<NativeAddress>> {
        if let Some(set) = self.cache.get() {
            return Ok(set);
        }
        let first = layout.iterate(vec![]).next().ok_or(CatalogError::EmptyCatalog)?;
        let set   = Self::inspect(&first);
        log::debug!(
            "discovered {} native quantities from partition {}",
            set.len(), first.partition_id()
        );
        drop(first);
        Ok(self.cache.get_or_init(|| set))
    }

    /// 已发现的集合（未发现时为 `None`）
    pub fn cached(&self) -> Option<&BTreeSet<NativeAddress>> {
        self.cache.get()
    }

    fn inspect(handle: &PartitionHandle) -> BTreeSet<NativeAddress> {
        let mut set = BTreeSet::new();
        set.insert(NativeAddress::PartitionId);
        for (group, fields) in handle.schema() {
            for meta in fields {
                if meta.is_vector() {
                    set.extend((0..meta.width).map(|i| NativeAddress::element(group, &meta.name, i)));
                } else {
                    set.insert(NativeAddress::field(group, &meta.name));
                }
            }
        }
        set
    }
}
