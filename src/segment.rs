//! Segment 文件读写（一个分区的一个 group 对应一个 Segment 文件）
//!
//! 文件格式：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC  (8 bytes) "GCRSEG\0\0"     │
//! │  Version(4 bytes) = 1              │
//! ├────────────────────────────────────┤
//! │  DATA REGION                       │
//! │    [Data Pages field 0]            │ ← 编码 + LZ4
//! │    [Data Pages field 1]            │
//! │    ...                             │
//! ├────────────────────────────────────┤
//! │  FOOTER                            │
//! │    SegmentFooter (自定义二进制)      │
//! │      num_rows, num_fields          │
//! │      per field: name, type, shape, │
//! │        encoding, compression,      │
//! │        page directory              │
//! │    Footer CRC32  (4 bytes)         │
//! │    Footer length (4 bytes)         │
//! │    MAGIC         (8 bytes)         │
//! └────────────────────────────────────┘
//! ```
//!
//! 读取端打开文件时只读 Footer；列数据在 [`SegmentReader::read_field`]
//! 时按页目录 seek 读取。

#[cfg(any(test, feature = "fixtures"))]
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
#[cfg(any(test, feature = "fixtures"))]
use std::io::Write;
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt};
#[cfg(any(test, feature = "fixtures"))]
use byteorder::WriteBytesExt;
use crate::array::Array;
#[cfg(any(test, feature = "fixtures"))]
use crate::column_writer::ColumnWriter;
use crate::common::{CatalogError, Result};
use crate::field_type::{CompressionType, EncodingType, FieldMeta, FieldType};
use crate::page::{PageDecoder, PageEntry, PAGE_MAX_ROWS};

const MAGIC: &[u8; 8] = b"GCRSEG\0\0";
const VERSION: u32    = 1;
/// MAGIC + VERSION
const HEADER_LEN: u64 = 12;
/// CRC + footer length + MAGIC
const TRAILER_LEN: u64 = 16;
/// num_rows + num_fields
const FOOTER_FIXED_LEN: usize = 12;
/// 单个字段的最短记录：name_len + type + vector + width + encoding + compression + num_pages
const FIELD_MIN_LEN: usize = 2 + 1 + 1 + 4 + 1 + 1 + 4;
/// offset + len + value_count
const PAGE_ENTRY_LEN: usize = 20;

// ── Footer 结构 ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct FieldFooter {
    meta:  FieldMeta,
    pages: Vec<PageEntry>,
}

#[derive(Debug)]
struct SegmentFooter {
    num_rows: u64,
    fields:   Vec<FieldFooter>,
}

impl SegmentFooter {
    #[cfg(any(test, feature = "fixtures"))]
    fn serialize(&self) -> Result<Vec<u8>> {

        let mut out = Vec::new();
        out.write_u64::<LittleEndian>(self.num_rows)?;
        out.write_u32::<LittleEndian>(self.fields.len() as u32)?;
        for f in &self.fields {
            let name = f.meta.name.as_bytes();
            out.write_u16::<LittleEndian>(name.len() as u16)?;
            out.extend_from_slice(name);
            out.write_u8(f.meta.field_type.tag())?;
            out.write_u8(f.meta.vector as u8)?;
            out.write_u32::<LittleEndian>(f.meta.width)?;
            out.write_u8(f.meta.encoding.tag())?;
            out.write_u8(f.meta.compression.tag())?;
            out.write_u32::<LittleEndian>(f.pages.len() as u32)?;
            for p in &f.pages {
                out.write_u64::<LittleEndian>(p.offset)?;
                out.write_u64::<LittleEndian>(p.len)?;
                out.write_u32::<LittleEndian>(p.value_count)?;
            }
        }
        Ok(out)
    }

    /// 解析 Footer。所有计数都先与剩余字节数比较，再据此迭代，
    /// 不按文件中的计数预分配内存。
    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut rd = Cursor::new(data);
        let num_rows   = rd.read_u64::<LittleEndian>()?;
        let num_fields = rd.read_u32::<LittleEndian>()? as usize;
        if num_fields > (data.len() - FOOTER_FIXED_LEN) / FIELD_MIN_LEN {
            return Err(CatalogError::SegmentIo(format!(
                "footer claims {num_fields} fields in {} bytes", data.len()
            )));
        }

        let mut fields = Vec::new();
        for _ in 0..num_fields {
            let name_len = rd.read_u16::<LittleEndian>()? as usize;
            let mut name = vec![0u8; name_len];
            rd.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| CatalogError::SegmentIo("field name is not utf-8".into()))?;

            let meta = FieldMeta {
                name,
                field_type:  FieldType::from_tag(rd.read_u8()?)?,
                vector:      rd.read_u8()? != 0,
                width:       rd.read_u32::<LittleEndian>()?,
                encoding:    EncodingType::from_tag(rd.read_u8()?)?,
                compression: CompressionType::from_tag(rd.read_u8()?)?,
            };
            if meta.width == 0 || (!meta.vector && meta.width != 1) {
                return Err(CatalogError::SegmentIo(format!(
                    "field {}: invalid width {}", meta.name, meta.width
                )));
            }

            let num_pages = rd.read_u32::<LittleEndian>()? as usize;
            let remaining = data.len() - rd.position() as usize;
            if num_pages > remaining / PAGE_ENTRY_LEN {
                return Err(CatalogError::SegmentIo(format!(
                    "field {}: footer claims {num_pages} pages in {remaining} bytes", meta.name
                )));
            }
            let pages = (0..num_pages)
                .map(|_| -> Result<PageEntry> {
                    Ok(PageEntry {
                        offset:      rd.read_u64::<LittleEndian>()?,
                        len:         rd.read_u64::<LittleEndian>()?,
                        value_count: rd.read_u32::<LittleEndian>()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            fields.push(FieldFooter { meta, pages });
        }
        Ok(Self { num_rows, fields })
    }

    /// 页目录必须落在数据区 `[HEADER_LEN, data_end)` 内，
    /// 且每个字段的元素总数与 `num_rows × width` 一致
    fn check_pages(&self, data_end: u64) -> Result<()> {
        if self.fields.is_empty() && self.num_rows != 0 {
            return Err(CatalogError::SegmentIo(format!(
                "footer claims {} rows but no fields", self.num_rows
            )));
        }
        for f in &self.fields {
            let page_cap = PAGE_MAX_ROWS as u64 * f.meta.width as u64;
            let mut total: u64 = 0;
            for p in &f.pages {
                let end = p.offset.checked_add(p.len);
                if p.offset < HEADER_LEN || end.map_or(true, |e| e > data_end) {
                    return Err(CatalogError::SegmentIo(format!(
                        "field {}: page [{}, +{}) lies outside the data region",
                        f.meta.name, p.offset, p.len
                    )));
                }
                if p.value_count as u64 > page_cap {
                    return Err(CatalogError::SegmentIo(format!(
                        "field {}: page holds {} values, at most {page_cap} allowed",
                        f.meta.name, p.value_count
                    )));
                }
                total += p.value_count as u64;
            }
            if self.num_rows.checked_mul(f.meta.width as u64) != Some(total) {
                return Err(CatalogError::SegmentIo(format!(
                    "field {}: pages hold {total} values for {} rows of width {}",
                    f.meta.name, self.num_rows, f.meta.width
                )));
            }
        }
        Ok(())
    }
}

// ── SegmentWriter ─────────────────────────────────────────────────────────────

/// 按列写入一个 group 文件。所有字段必须写入相同行数。
///
/// 只用于生成测试数据与演示 catalog（`fixtures` feature）；catalog 本身只读。
#[cfg(any(test, feature = "fixtures"))]
pub struct SegmentWriter {
    col_writers: Vec<ColumnWriter>,
}

#[cfg(any(test, feature = "fixtures"))]
impl SegmentWriter {
    pub fn new(schema: Vec<FieldMeta>) -> Result<Self> {
        let mut seen = HashSet::new();
        for meta in &schema {
            if meta.width == 0 || (!meta.vector && meta.width != 1) {
                return Err(CatalogError::SchemaMismatch(format!(
                    "field {} has invalid width {}", meta.name, meta.width
                )));
            }
            if !seen.insert(meta.name.clone()) {
                return Err(CatalogError::SchemaMismatch(format!("duplicate field {}", meta.name)));
            }
        }
        let col_writers = schema.into_iter().map(ColumnWriter::new).collect();
        Ok(Self { col_writers })
    }

    /// 为字段 `name` 追加行（向量列按行优先展开）
    pub fn append(&mut self, name: &str, values: Array) -> Result<()> {
        self.col_writers.iter_mut()
            .find(|c| c.meta.name == name)
            .ok_or_else(|| CatalogError::FieldNotFound(name.into()))?
            .append(values)
    }

    /// 完成写入，将整个 Segment 序列化到字节流，返回写入字节数
    pub fn finalize<W: Write>(self, mut writer: W) -> Result<u64> {
        let num_rows = self.col_writers.first().map(|c| c.num_rows()).unwrap_or(0);
        if let Some(c) = self.col_writers.iter().find(|c| c.num_rows() != num_rows) {
            return Err(CatalogError::SchemaMismatch(format!(
                "field {} has {} rows, expected {num_rows}", c.meta.name, c.num_rows()
            )));
        }

        // ── 文件头 ────────────────────────────────────────────────────────────
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        let mut pos = HEADER_LEN;

        // ── DATA REGION ───────────────────────────────────────────────────────
        let mut fields = Vec::with_capacity(self.col_writers.len());
        for cw in self.col_writers {
            let meta = cw.meta.clone();
            let (data, mut pages) = cw.finalize()?;
            for p in &mut pages {
                p.offset += pos;
            }
            writer.write_all(&data)?;
            pos += data.len() as u64;
            fields.push(FieldFooter { meta, pages });
        }

        // ── FOOTER ────────────────────────────────────────────────────────────
        let footer       = SegmentFooter { num_rows: num_rows as u64, fields };
        let footer_bytes = footer.serialize()?;
        let footer_crc   = crc32fast::hash(&footer_bytes);

        writer.write_all(&footer_bytes)?;
        writer.write_u32::<LittleEndian>(footer_crc)?;
        writer.write_u32::<LittleEndian>(footer_bytes.len() as u32)?;
        writer.write_all(MAGIC)?;
        writer.flush()?;
        pos += footer_bytes.len() as u64 + TRAILER_LEN;

        Ok(pos)
    }

    /// 写入到 `path`（自动创建父目录）
    pub fn write_to_path(self, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.finalize(std::io::BufWriter::new(file))
    }
}

// ── SegmentReader ─────────────────────────────────────────────────────────────

/// 打开的 Segment 文件。持有底层 reader，drop 时随之关闭。
pub struct SegmentReader<R = BufReader<File>> {
    reader: R,
    footer: SegmentFooter,
    schema: Vec<FieldMeta>,
}

impl SegmentReader<BufReader<File>> {
    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> SegmentReader<R> {
    /// 解析文件尾，只读取 Footer
    pub fn open(mut reader: R) -> Result<Self> {
        let n = reader.seek(SeekFrom::End(0))?;
        if n < HEADER_LEN + TRAILER_LEN {
            return Err(CatalogError::SegmentIo("file too short for a segment".into()));
        }

        let mut head = [0u8; 8];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut head)?;
        let version = reader.read_u32::<LittleEndian>()?;
        if &head != MAGIC || version != VERSION {
            return Err(CatalogError::SegmentIo("invalid segment header".into()));
        }

        reader.seek(SeekFrom::Start(n - TRAILER_LEN))?;
        let footer_crc = reader.read_u32::<LittleEndian>()?;
        let footer_len = reader.read_u32::<LittleEndian>()? as u64;
        let mut tail   = [0u8; 8];
        reader.read_exact(&mut tail)?;
        if &tail != MAGIC
            || footer_len < FOOTER_FIXED_LEN as u64
            || footer_len > n - HEADER_LEN - TRAILER_LEN
        {
            return Err(CatalogError::SegmentIo("invalid segment trailer".into()));
        }

        reader.seek(SeekFrom::Start(n - TRAILER_LEN - footer_len))?;
        let mut footer_bytes = vec![0u8; footer_len as usize];
        reader.read_exact(&mut footer_bytes)?;
        if crc32fast::hash(&footer_bytes) != footer_crc {
            return Err(CatalogError::ChecksumMismatch);
        }

        let footer = SegmentFooter::deserialize(&footer_bytes)?;
        footer.check_pages(n - TRAILER_LEN - footer_len)?;
        let schema = footer.fields.iter().map(|f| f.meta.clone()).collect();
        Ok(Self { reader, footer, schema })
    }

    pub fn num_rows(&self) -> u64 { self.footer.num_rows }
    pub fn schema(&self) -> &[FieldMeta] { &self.schema }

    /// 读取字段的全部值；向量列返回按行优先展开的 `rows × width` 数组
    pub fn read_field(&mut self, name: &str) -> Result<Array> {
        let field = self.footer.fields.iter()
            .find(|f| f.meta.name == name)
            .ok_or_else(|| CatalogError::FieldNotFound(name.into()))?;

        let mut values = Array::empty(field.meta.field_type);
        for page in &field.pages {
            self.reader.seek(SeekFrom::Start(page.offset))?;
            let mut buf = vec![0u8; page.len as usize];
            self.reader.read_exact(&mut buf)?;
            let decoded = PageDecoder::decode(&buf, &field.meta)?;
            if decoded.value_count != page.value_count as usize {
                return Err(CatalogError::SegmentIo(format!(
                    "field {name}: page holds {} values, directory says {}",
                    decoded.value_count, page.value_count
                )));
            }
            values.extend(decoded.values)?;
        }

        let expected = self.footer.num_rows * field.meta.width as u64;
        if values.len() as u64 != expected {
            return Err(CatalogError::SegmentIo(format!(
                "field {name}: read {} values, expected {expected}", values.len()
            )));
        }
        Ok(values)
    }
}

/// 以合法的 header / trailer / CRC 包装任意 footer 字节
#[cfg(test)]
pub(crate) fn segment_with_footer(data: &[u8], footer: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.write_u32::<LittleEndian>(VERSION).unwrap();
    out.extend_from_slice(data);
    out.extend_from_slice(footer);
    out.write_u32::<LittleEndian>(crc32fast::hash(footer)).unwrap();
    out.write_u32::<LittleEndian>(footer.len() as u32).unwrap();
    out.extend_from_slice(MAGIC);
    out
}
