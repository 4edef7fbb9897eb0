//! 列编码
//!
//! 支持三种编码：
//! - **Plain**     ：小端定长原始值，适用于所有类型
//! - **RunLength** ：(count, value) 对，适合 0/1 标志列、低基数整数列
//! - **DeltaBinary**：有序整数增量编码，大幅压缩 ID 列
//!
//! RunLength / DeltaBinary 只接受整数和布尔列；浮点列请使用 Plain。

use std::io::Cursor;
use byteorder::{LittleEndian, ReadBytesExt};
#[cfg(any(test, feature = "fixtures"))]
use byteorder::WriteBytesExt;
use crate::array::Array;
use crate::common::{CatalogError, Result};
use crate::field_type::{EncodingType, FieldType};

// ── 统一编/解码入口 ───────────────────────────────────────────────────────────

#[cfg(any(test, feature = "fixtures"))]
pub fn encode(values: &Array, enc: EncodingType) -> Result<Vec<u8>> {
    match enc {
        EncodingType::Plain       => plain::encode(values),
        EncodingType::RunLength   => rle::encode(&to_i64s(values)?),
        EncodingType::DeltaBinary => delta::encode(&to_i64s(values)?),
    }
}

pub fn decode(
    data:       &[u8],
    enc:        EncodingType,
    field_type: FieldType,
    count:      usize,
) -> Result<Array> {
    match enc {
        EncodingType::Plain       => plain::decode(data, field_type, count),
        EncodingType::RunLength   => from_i64s(field_type, rle::decode(data, count)?),
        EncodingType::DeltaBinary => from_i64s(field_type, delta::decode(data, count)?),
    }
}

fn io_err(e: std::io::Error) -> CatalogError {
    CatalogError::Encoding(e.to_string())
}

/// 整数 / 布尔列统一提升为 i64，供 RLE / Delta 使用
#[cfg(any(test, feature = "fixtures"))]
fn to_i64s(values: &Array) -> Result<Vec<i64>> {
    Ok(match values {
        Array::Bool(v)  => v.iter().map(|x| *x as i64).collect(),
        Array::Int8(v)  => v.iter().map(|x| *x as i64).collect(),
        Array::Int16(v) => v.iter().map(|x| *x as i64).collect(),
        Array::Int32(v) => v.iter().map(|x| *x as i64).collect(),
        Array::Int64(v) => v.clone(),
        other => {
            return Err(CatalogError::Encoding(format!(
                "{:?} column requires plain encoding", other.field_type()
            )))
        }
    })
}

fn from_i64s(field_type: FieldType, ints: Vec<i64>) -> Result<Array> {
    Ok(match field_type {
        FieldType::Bool  => Array::Bool(ints.into_iter().map(|x| x != 0).collect()),
        FieldType::Int8  => Array::Int8(ints.into_iter().map(|x| x as i8).collect()),
        FieldType::Int16 => Array::Int16(ints.into_iter().map(|x| x as i16).collect()),
        FieldType::Int32 => Array::Int32(ints.into_iter().map(|x| x as i32).collect()),
        FieldType::Int64 => Array::Int64(ints),
        other => {
            return Err(CatalogError::Encoding(format!(
                "{other:?} column requires plain encoding"
            )))
        }
    })
}

// ── Plain ─────────────────────────────────────────────────────────────────────
mod plain {
    use super::*;

    #[cfg(any(test, feature = "fixtures"))]
    pub fn encode(values: &Array) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(values.len() * values.field_type().fixed_size());
        let written = match values {
            Array::Bool(v)    => v.iter().try_for_each(|x| out.write_u8(*x as u8)),
            Array::Int8(v)    => v.iter().try_for_each(|x| out.write_i8(*x)),
            Array::Int16(v)   => v.iter().try_for_each(|x| out.write_i16::<LittleEndian>(*x)),
            Array::Int32(v)   => v.iter().try_for_each(|x| out.write_i32::<LittleEndian>(*x)),
            Array::Int64(v)   => v.iter().try_for_each(|x| out.write_i64::<LittleEndian>(*x)),
            Array::Float32(v) => v.iter().try_for_each(|x| out.write_f32::<LittleEndian>(*x)),
            Array::Float64(v) => v.iter().try_for_each(|x| out.write_f64::<LittleEndian>(*x)),
        };
        written.map_err(io_err)?;
        Ok(out)
    }

    pub fn decode(data: &[u8], field_type: FieldType, count: usize) -> Result<Array> {
        if data.len() != count * field_type.fixed_size() {
            return Err(CatalogError::Encoding(format!(
                "plain: expected {} bytes for {count} {field_type:?} values, got {}",
                count * field_type.fixed_size(), data.len()
            )));
        }
        let mut rd = Cursor::new(data);
        let out = match field_type {
            FieldType::Bool    => Array::Bool(read_n(&mut rd, count, |r| r.read_u8().map(|b| b != 0))?),
            FieldType::Int8    => Array::Int8(read_n(&mut rd, count, |r| r.read_i8())?),
            FieldType::Int16   => Array::Int16(read_n(&mut rd, count, |r| r.read_i16::<LittleEndian>())?),
            FieldType::Int32   => Array::Int32(read_n(&mut rd, count, |r| r.read_i32::<LittleEndian>())?),
            FieldType::Int64   => Array::Int64(read_n(&mut rd, count, |r| r.read_i64::<LittleEndian>())?),
            FieldType::Float32 => Array::Float32(read_n(&mut rd, count, |r| r.read_f32::<LittleEndian>())?),
            FieldType::Float64 => Array::Float64(read_n(&mut rd, count, |r| r.read_f64::<LittleEndian>())?),
        };
        Ok(out)
    }

    fn read_n<T>(
        rd:    &mut Cursor<&[u8]>,
        count: usize,
        mut f: impl FnMut(&mut Cursor<&[u8]>) -> std::io::Result<T>,
    ) -> Result<Vec<T>> {
        (0..count).map(|_| f(rd).map_err(io_err)).collect()
    }
}

// ── Run-Length Encoding ───────────────────────────────────────────────────────
mod rle {
    use super::*;

    #[cfg(any(test, feature = "fixtures"))]
    pub fn encode(values: &[i64]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let Some((&first, rest)) = values.split_first() else { return Ok(out) };
        let mut cur = first;
        let mut run: u32 = 1;

        for &v in rest {
            if v == cur {
                run += 1;
            } else {
                write_run(&mut out, run, cur)?;
                cur = v;
                run = 1;
            }
        }
        write_run(&mut out, run, cur)?;
        Ok(out)
    }

    #[cfg(any(test, feature = "fixtures"))]
    fn write_run(out: &mut Vec<u8>, run: u32, v: i64) -> Result<()> {
        out.write_u32::<LittleEndian>(run).map_err(io_err)?;
        out.write_i64::<LittleEndian>(v).map_err(io_err)
    }

    pub fn decode(data: &[u8], count: usize) -> Result<Vec<i64>> {
        let mut out = Vec::new();
        let mut rd  = Cursor::new(data);
        while (rd.position() as usize) < data.len() {
            let run = rd.read_u32::<LittleEndian>().map_err(io_err)? as usize;
            let val = rd.read_i64::<LittleEndian>().map_err(io_err)?;
            if run > count - out.len() {
                return Err(CatalogError::Encoding(format!(
                    "rle: runs exceed the {count} values in the page"
                )));
            }
            out.extend(std::iter::repeat(val).take(run));
        }
        if out.len() != count {
            return Err(CatalogError::Encoding(format!(
                "rle: decoded {} values, expected {count}", out.len()
            )));
        }
        Ok(out)
    }
}

// ── Delta Binary ──────────────────────────────────────────────────────────────
mod delta {
    use super::*;

    #[cfg(any(test, feature = "fixtures"))]
    pub fn encode(values: &[i64]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(values.len() * 8);
        let Some((&base, rest)) = values.split_first() else { return Ok(out) };
        out.write_i64::<LittleEndian>(base).map_err(io_err)?;
        let mut prev = base;
        for &x in rest {
            out.write_i64::<LittleEndian>(x.wrapping_sub(prev)).map_err(io_err)?;
            prev = x;
        }
        Ok(out)
    }

    pub fn decode(data: &[u8], count: usize) -> Result<Vec<i64>> {
        if count == 0 { return Ok(vec![]); }
        if data.len() != count * 8 {
            return Err(CatalogError::Encoding(format!(
                "delta: expected {} bytes, got {}", count * 8, data.len()
            )));
        }
        let mut rd   = Cursor::new(data);
        let mut prev = rd.read_i64::<LittleEndian>().map_err(io_err)?;
        let mut out  = Vec::with_capacity(count);
        out.push(prev);
        for _ in 1..count {
            prev = prev.wrapping_add(rd.read_i64::<LittleEndian>().map_err(io_err)?);
            out.push(prev);
        }
        Ok(out)
    }
}
