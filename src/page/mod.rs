//! Data Page 读写
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ value_count  (u32 LE)            │  元素个数 = 行数 × width
//! │ uncomp_size  (u32 LE)            │
//! │ data         (encoded+compressed)│
//! │ CRC32        (u32 LE)            │
//! └──────────────────────────────────┘
//! ```

use std::io::Cursor;
use byteorder::{LittleEndian, ReadBytesExt};
#[cfg(any(test, feature = "fixtures"))]
use byteorder::WriteBytesExt;
use crate::array::Array;
use crate::common::{CatalogError, Result};
use crate::encoding;
use crate::field_type::FieldMeta;

/// 每页最多容纳的行数（向量列按行计，不按元素计）
pub const PAGE_MAX_ROWS: usize = 1024;

const PAGE_HEADER_LEN: usize = 8;

/// 一个 Data Page 在文件中的位置（Footer 页目录的一项）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    /// 绝对文件偏移（ColumnWriter 产出时为相对列起点的偏移）
    pub offset:      u64,
    pub len:         u64,
    pub value_count: u32,
}

// ── PageBuilder ───────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "fixtures"))]
pub struct PageBuilder<'a> {
    meta:   &'a FieldMeta,
    values: Array,
}

#[cfg(any(test, feature = "fixtures"))]
impl<'a> PageBuilder<'a> {
    pub fn new(meta: &'a FieldMeta, values: Array) -> Self {
        Self { meta, values }
    }

    /// 序列化为页字节（encode → compress → 加 header+CRC）
    pub fn build(self) -> Result<Vec<u8>> {
        let count      = self.values.len() as u32;
        let encoded    = encoding::encode(&self.values, self.meta.encoding)?;
        let compressed = self.meta.compression.compress(&encoded)?;

        let mut page = Vec::with_capacity(PAGE_HEADER_LEN + compressed.len() + 4);
        page.write_u32::<LittleEndian>(count)?;
        page.write_u32::<LittleEndian>(encoded.len() as u32)?;
        page.extend_from_slice(&compressed);

        let crc = crc32fast::hash(&page);
        page.write_u32::<LittleEndian>(crc)?;
        Ok(page)
    }
}

// ── PageDecoder ───────────────────────────────────────────────────────────────

pub struct PageDecoder {
    pub value_count: usize,
    pub values:      Array,
}

impl PageDecoder {
    pub fn decode(data: &[u8], meta: &FieldMeta) -> Result<Self> {
        if data.len() < PAGE_HEADER_LEN + 4 {
            return Err(CatalogError::SegmentIo("page data too short".into()));
        }
        let payload_end = data.len() - 4;

        // 先校验 CRC，再解析
        let stored_crc = Cursor::new(&data[payload_end..]).read_u32::<LittleEndian>()?;
        if crc32fast::hash(&data[..payload_end]) != stored_crc {
            return Err(CatalogError::ChecksumMismatch);
        }

        let mut header  = Cursor::new(&data[..PAGE_HEADER_LEN]);
        let value_count = header.read_u32::<LittleEndian>()? as usize;
        let uncomp_size = header.read_u32::<LittleEndian>()? as usize;
        let max_values  = PAGE_MAX_ROWS * meta.width as usize;
        if value_count > max_values {
            return Err(CatalogError::SegmentIo(format!(
                "field {}: page header claims {value_count} values, at most {max_values} allowed",
                meta.name
            )));
        }

        let raw    = meta.compression.decompress(&data[PAGE_HEADER_LEN..payload_end], uncomp_size)?;
        let values = encoding::decode(&raw, meta.encoding, meta.field_type, value_count)?;

        Ok(Self { value_count, values })
    }
}
