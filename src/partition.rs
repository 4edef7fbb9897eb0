//! 分区迭代与谓词下推
//!
//! 按分区号升序枚举 `0..N`。对每个分区：
//!   1. 先用 pre-filter 仅凭分区号判断，拒绝则跳过，不打开任何文件
//!   2. 打开全部必需 group；任一缺失则跳过（稀疏覆盖，不是错误）
//!   3. 产出完整分区的 [`PartitionHandle`]，由调用方在本步结束时 drop

use std::ops::Range;
use crate::accessor::{GroupSource, PartitionHandle};
use crate::common::PartitionId;

/// 只依赖分区号的谓词
pub type PreFilter<'a> = Box<dyn Fn(PartitionId) -> bool + 'a>;

// ── PartitionLayout ───────────────────────────────────────────────────────────

/// 分区集合的描述：存储 + 分区数 + 必需 group
pub struct PartitionLayout<'a> {
    pub source:          &'a dyn GroupSource,
    pub partition_count: u64,
    pub required_groups: &'a [String],
}

impl<'a> PartitionLayout<'a> {
    pub fn new(
        source:          &'a dyn GroupSource,
        partition_count: u64,
        required_groups: &'a [String],
    ) -> Self {
        Self { source, partition_count, required_groups }
    }

    /// 每次调用返回一个全新的、从分区 0 开始的惰性序列
    pub fn iterate(&self, pre_filters: Vec<PreFilter<'a>>) -> PartitionScan<'a> {
        PartitionScan {
            source:          self.source,
            required_groups: self.required_groups,
            ids:             0..self.partition_count,
            pre_filters,
        }
    }
}

// ── PartitionScan ─────────────────────────────────────────────────────────────

pub struct PartitionScan<'a> {
    source:          &'a dyn GroupSource,
    required_groups: &'a [String],
    ids:             Range<PartitionId>,
    pre_filters:     Vec<PreFilter<'a>>,
}

impl<'a> PartitionScan<'a> {
    fn passes_pre_filters(&self, id: PartitionId) -> bool {
        self.pre_filters.iter().all(|f| f(id))
    }
}

impl<'a> Iterator for PartitionScan<'a> {
    type Item = PartitionHandle;

    fn next(&mut self) -> Option<PartitionHandle> {
        while let Some(id) = self.ids.next() {
            if !self.passes_pre_filters(id) {
                log::trace!("partition {id}: rejected by pre-filter");
                continue;
            }
            if let Some(handle) = PartitionHandle::open(self.source, id, self.required_groups) {
                return Some(handle);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.ids.size_hint().1)
    }
}
