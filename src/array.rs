//! 列数组（运行时表示）
//!
//! 一个 [`Array`] 是一个分区内某个量的完整一维列，行序与分区行序一致。
//! 向量字段在存储层按行优先展开（`rows × width`），由 [`Array::column`]
//! 取出其中一列。

use std::ops::Range;
use crate::common::{CatalogError, Result};
use crate::field_type::FieldType;

#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// 对每个变体执行同一表达式，并保持变体不变
macro_rules! map_same {
    ($arr:expr, $v:ident => $body:expr) => {
        match $arr {
            Array::Bool($v)    => Array::Bool($body),
            Array::Int8($v)    => Array::Int8($body),
            Array::Int16($v)   => Array::Int16($body),
            Array::Int32($v)   => Array::Int32($body),
            Array::Int64($v)   => Array::Int64($body),
            Array::Float32($v) => Array::Float32($body),
            Array::Float64($v) => Array::Float64($body),
        }
    };
}

/// 对每个变体执行同一表达式，返回任意类型
macro_rules! with_values {
    ($arr:expr, $v:ident => $body:expr) => {
        match $arr {
            Array::Bool($v)    => $body,
            Array::Int8($v)    => $body,
            Array::Int16($v)   => $body,
            Array::Int32($v)   => $body,
            Array::Int64($v)   => $body,
            Array::Float32($v) => $body,
            Array::Float64($v) => $body,
        }
    };
}

impl Array {
    pub fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Bool    => Self::Bool(vec![]),
            FieldType::Int8    => Self::Int8(vec![]),
            FieldType::Int16   => Self::Int16(vec![]),
            FieldType::Int32   => Self::Int32(vec![]),
            FieldType::Int64   => Self::Int64(vec![]),
            FieldType::Float32 => Self::Float32(vec![]),
            FieldType::Float64 => Self::Float64(vec![]),
        }
    }

    /// 常量列：`len` 个 `value`
    pub fn filled_i64(value: i64, len: usize) -> Self {
        Self::Int64(vec![value; len])
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_)    => FieldType::Bool,
            Self::Int8(_)    => FieldType::Int8,
            Self::Int16(_)   => FieldType::Int16,
            Self::Int32(_)   => FieldType::Int32,
            Self::Int64(_)   => FieldType::Int64,
            Self::Float32(_) => FieldType::Float32,
            Self::Float64(_) => FieldType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// 取元素区间 `[range.start, range.end)`
    pub fn slice(&self, range: Range<usize>) -> Self {
        map_same!(self, v => v[range.clone()].to_vec())
    }

    /// 追加同类型数组（分页读取时拼接）
    pub fn extend(&mut self, other: Array) -> Result<()> {
        match (self, other) {
            (Self::Bool(a),    Self::Bool(b))    => a.extend(b),
            (Self::Int8(a),    Self::Int8(b))    => a.extend(b),
            (Self::Int16(a),   Self::Int16(b))   => a.extend(b),
            (Self::Int32(a),   Self::Int32(b))   => a.extend(b),
            (Self::Int64(a),   Self::Int64(b))   => a.extend(b),
            (Self::Float32(a), Self::Float32(b)) => a.extend(b),
            (Self::Float64(a), Self::Float64(b)) => a.extend(b),
            (a, b) => {
                return Err(CatalogError::SchemaMismatch(format!(
                    "cannot append {:?} to {:?}", b.field_type(), a.field_type()
                )))
            }
        }
        Ok(())
    }

    /// 从按行优先展开的 `rows × width` 数组中取第 `index` 列
    pub fn column(&self, index: usize, width: usize) -> Result<Self> {
        if width == 0 || index >= width {
            return Err(CatalogError::SchemaMismatch(format!(
                "column index {index} out of range for width {width}"
            )));
        }
        if self.len() % width != 0 {
            return Err(CatalogError::SchemaMismatch(format!(
                "{} values do not split into rows of width {width}", self.len()
            )));
        }
        Ok(map_same!(self, v => v.iter().skip(index).step_by(width).copied().collect()))
    }

    /// 按布尔掩码保留行
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(CatalogError::SchemaMismatch(format!(
                "mask length {} != array length {}", mask.len(), self.len()
            )));
        }
        Ok(map_same!(self, v => v.iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(x, _)| *x)
            .collect()))
    }

    /// 逐元素 `value != 0`
    pub fn to_bool(&self) -> Self {
        match self {
            Self::Bool(v)    => Self::Bool(v.clone()),
            Self::Int8(v)    => Self::Bool(v.iter().map(|x| *x != 0).collect()),
            Self::Int16(v)   => Self::Bool(v.iter().map(|x| *x != 0).collect()),
            Self::Int32(v)   => Self::Bool(v.iter().map(|x| *x != 0).collect()),
            Self::Int64(v)   => Self::Bool(v.iter().map(|x| *x != 0).collect()),
            Self::Float32(v) => Self::Bool(v.iter().map(|x| *x != 0.0).collect()),
            Self::Float64(v) => Self::Bool(v.iter().map(|x| *x != 0.0).collect()),
        }
    }

    /// 逐元素转为 f64（bool 记为 0/1）
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Self::Bool(v)    => v.iter().map(|x| if *x { 1.0 } else { 0.0 }).collect(),
            Self::Int8(v)    => v.iter().map(|x| *x as f64).collect(),
            Self::Int16(v)   => v.iter().map(|x| *x as f64).collect(),
            Self::Int32(v)   => v.iter().map(|x| *x as f64).collect(),
            Self::Int64(v)   => v.iter().map(|x| *x as f64).collect(),
            Self::Float32(v) => v.iter().map(|x| *x as f64).collect(),
            Self::Float64(v) => v.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match self { Self::Bool(v) => Some(v), _ => None }
    }
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self { Self::Int64(v) => Some(v), _ => None }
    }
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self { Self::Float64(v) => Some(v), _ => None }
    }
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self { Self::Float32(v) => Some(v), _ => None }
    }
}
