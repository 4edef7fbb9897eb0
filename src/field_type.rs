//! Segment 列的物理字段类型

use crate::common::{CatalogError, Result};

/// 列在 Segment 文件中的元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int8, Int16, Int32, Int64,
    Float32, Float64,
}

impl FieldType {
    /// 每个元素的固定字节宽度
    pub fn fixed_size(self) -> usize {
        match self {
            Self::Bool | Self::Int8   => 1,
            Self::Int16               => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Bool    => 0,
            Self::Int8    => 1,
            Self::Int16   => 2,
            Self::Int32   => 3,
            Self::Int64   => 4,
            Self::Float32 => 5,
            Self::Float64 => 6,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::Bool,
            1 => Self::Int8,
            2 => Self::Int16,
            3 => Self::Int32,
            4 => Self::Int64,
            5 => Self::Float32,
            6 => Self::Float64,
            t => return Err(CatalogError::SegmentIo(format!("unknown field type tag {t}"))),
        })
    }
}

/// 编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingType {
    Plain,
    /// (count, value) 对，适合 0/1 标志列、低基数整数列
    RunLength,
    /// 有序整数增量编码（ID 列）
    DeltaBinary,
}

impl EncodingType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Plain       => 0,
            Self::RunLength   => 1,
            Self::DeltaBinary => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::Plain,
            1 => Self::RunLength,
            2 => Self::DeltaBinary,
            t => return Err(CatalogError::SegmentIo(format!("unknown encoding tag {t}"))),
        })
    }
}

/// 压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lz4,
}

impl CompressionType {
    pub(crate) fn tag(self) -> u8 {
        match self { Self::None => 0, Self::Lz4 => 1 }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            t => Err(CatalogError::SegmentIo(format!("unknown compression tag {t}"))),
        }
    }
}

/// 每个字段的元数据（写入 Footer）
///
/// 标量列 `vector == false`、`width == 1`；向量列（如 5 个波段的星等、
/// 2 个剪切分量）按行优先展开存储，每行占 `width` 个元素。
/// 形状单独记录：宽度为 1 的向量列仍按元素 `[0]` 寻址，不退化为标量。
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name:        String,
    pub field_type:  FieldType,
    pub vector:      bool,
    pub width:       u32,
    pub encoding:    EncodingType,
    pub compression: CompressionType,
}

impl FieldMeta {
    pub fn scalar(name: &str, field_type: FieldType) -> Self {
        Self::with_shape(name, field_type, false, 1)
    }

    pub fn vector(name: &str, field_type: FieldType, width: u32) -> Self {
        Self::with_shape(name, field_type, true, width)
    }

    fn with_shape(name: &str, field_type: FieldType, vector: bool, width: u32) -> Self {
        // 整数标量默认 Delta；其余 Plain
        let encoding = if field_type.is_integer() && !vector {
            EncodingType::DeltaBinary
        } else {
            EncodingType::Plain
        };
        Self {
            name: name.into(), field_type, vector, width,
            encoding, compression: CompressionType::Lz4,
        }
    }

    pub fn with_encoding(mut self, enc: EncodingType) -> Self {
        self.encoding = enc; self
    }
    pub fn with_compression(mut self, comp: CompressionType) -> Self {
        self.compression = comp; self
    }

    pub fn is_vector(&self) -> bool { self.vector }
}
