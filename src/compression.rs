//! 压缩/解压（LZ4 / None）

use crate::common::{CatalogError, Result};
use crate::field_type::CompressionType;

/// LZ4 block 的理论最大压缩比约为 255:1，超出即视为损坏的页头
const LZ4_MAX_RATIO: usize = 255;

impl CompressionType {
    #[cfg(any(test, feature = "fixtures"))]
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4  =>
                lz4::block::compress(data, None, false)
                    .map_err(|e| CatalogError::Compression(e.to_string())),
        }
    }

    /// `uncompressed_len` 来自页头；LZ4 block 格式本身不记录原始长度
    pub fn decompress(self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let out = match self {
            Self::None => data.to_vec(),
            Self::Lz4  => {
                if uncompressed_len == 0 { return Ok(vec![]); }
                if uncompressed_len > data.len().saturating_mul(LZ4_MAX_RATIO) {
                    return Err(CatalogError::Compression(format!(
                        "{} compressed bytes cannot expand to {uncompressed_len}", data.len()
                    )));
                }
                let len = i32::try_from(uncompressed_len)
                    .map_err(|_| CatalogError::Compression(format!("page too large: {uncompressed_len}")))?;
                lz4::block::decompress(data, Some(len))
                    .map_err(|e| CatalogError::Compression(e.to_string()))?
            }
        };
        if out.len() != uncompressed_len {
            return Err(CatalogError::Compression(format!(
                "decompressed {} bytes, header says {uncompressed_len}", out.len()
            )));
        }
        Ok(out)
    }
}
