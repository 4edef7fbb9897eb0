//! 全局基础类型与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// 分区编号，取值范围 [0, partition_count)
pub type PartitionId = u64;

// ── 错误 ──────────────────────────────────────────────────────────────────────
//
// 注意：分区缺少必需 group 不是错误（稀疏覆盖是常态），
// 由 GroupSource 返回 None，迭代器直接跳过，因此这里没有对应的变体。

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown quantity: {0}")]
    UnknownQuantity(String),
    #[error("unresolvable quantity {quantity}: {reason}")]
    UnresolvableQuantity { quantity: String, reason: String },
    #[error("catalog has no complete partition")]
    EmptyCatalog,
    #[error("transform failed for {quantity}: {reason}")]
    TransformFailure { quantity: String, reason: String },
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("segment I/O error: {0}")]
    SegmentIo(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid catalog config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub(crate) fn unresolvable(quantity: &str, reason: impl Into<String>) -> Self {
        Self::UnresolvableQuantity { quantity: quantity.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
