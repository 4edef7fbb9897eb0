//! 列写入器
//!
//! 每列独立维护：
//!   - 待写入的值缓冲区（按 PAGE_MAX_ROWS 行切页）
//!   - 页目录（页偏移 / 页长度 / 元素数），写入 Footer 供读取端定位

use crate::array::Array;
use crate::common::{CatalogError, Result};
use crate::field_type::FieldMeta;
use crate::page::{PageBuilder, PageEntry, PAGE_MAX_ROWS};

pub struct ColumnWriter {
    pub meta: FieldMeta,
    values:   Array,
}

impl ColumnWriter {
    pub fn new(meta: FieldMeta) -> Self {
        let values = Array::empty(meta.field_type);
        Self { meta, values }
    }

    /// 追加若干行；向量列的 `values.len()` 必须是 width 的整数倍
    pub fn append(&mut self, values: Array) -> Result<()> {
        if values.field_type() != self.meta.field_type {
            return Err(CatalogError::SchemaMismatch(format!(
                "field {}: expected {:?}, got {:?}",
                self.meta.name, self.meta.field_type, values.field_type()
            )));
        }
        if self.meta.width == 0 || values.len() % self.meta.width as usize != 0 {
            return Err(CatalogError::SchemaMismatch(format!(
                "field {}: {} values are not a multiple of width {}",
                self.meta.name, values.len(), self.meta.width
            )));
        }
        self.values.extend(values)
    }

    pub fn num_rows(&self) -> usize {
        self.values.len().checked_div(self.meta.width as usize).unwrap_or(0)
    }

    /// 完成写入，返回列的全部页字节和页目录
    pub fn finalize(self) -> Result<(Vec<u8>, Vec<PageEntry>)> {
        let per_page = PAGE_MAX_ROWS * self.meta.width as usize;
        let total    = self.values.len();
        let mut data  = Vec::new();
        let mut pages = Vec::new();

        let mut start = 0;
        while start < total {
            let end   = (start + per_page).min(total);
            let bytes = PageBuilder::new(&self.meta, self.values.slice(start..end)).build()?;
            pages.push(PageEntry {
                offset:      data.len() as u64,
                len:         bytes.len() as u64,
                value_count: (end - start) as u32,
            });
            data.extend_from_slice(&bytes);
            start = end;
        }
        Ok((data, pages))
    }
}
