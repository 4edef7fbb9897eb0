//! # galaxy-catalog
//!
//! 分区星系模拟 catalog 的逻辑量解析层。使用者按稳定的逻辑量名
//! （`redshift_true`、`mag_g_des`、`position_x` …）取数，无需知道
//! 它在磁盘上的文件布局、列名、向量列下标或派生方式。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      GalaxyCatalog                            │
//! │  list_available_quantities / has_quantity / get_quantities    │
//! │   ┌──────────────────────────┐   ┌────────────────────────┐   │
//! │   │ QuantityModifierRegistry │   │ NativeQuantityCatalog  │   │
//! │   │  Alias(NativeAddress)    │   │  首个完整分区的 schema  │   │
//! │   │  Derived(Transform, deps)│   │  （实例内只算一次）      │   │
//! │   └────────────┬─────────────┘   └───────────┬────────────┘   │
//! │                └──────── QuantityResolver ───┘                │
//! │                           │  (分区内缓存)                      │
//! │                    PartitionScan  ← pre-filter 按分区号下推     │
//! │                           │                                    │
//! │                    PartitionHandle（drop 即关闭全部 reader）     │
//! │                           │                                    │
//! │                      GroupSource                               │
//! │        ┌──────────────────┴─────────────────┐                  │
//! │  DirectorySource (Segment 文件)        MemorySource            │
//! │   ┌──────────────────────────────────────────────┐             │
//! │   │ Segment：Footer(schema + 页目录) + Data Pages  │             │
//! │   │   ├─ encoding    (Plain/RLE/Delta)             │             │
//! │   │   ├─ compression (LZ4/None)                    │             │
//! │   │   └─ CRC32       (页 + Footer)                 │             │
//! │   └──────────────────────────────────────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! 默认构建只包含读取路径。`fixtures` feature 额外提供
//! [`segment::SegmentWriter`]，用于生成测试与演示用的 catalog 文件。

// ── Catalog 层 ────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;
pub mod accessor;
pub mod partition;
pub mod native;
pub mod modifier;
pub mod resolver;
pub mod catalog;
pub mod buzzard;

// ── 存储层 ────────────────────────────────────────────────────────────────────
pub mod array;
pub mod field_type;
pub mod encoding;
pub mod compression;
pub mod page;
#[cfg(any(test, feature = "fixtures"))]
pub mod column_writer;
pub mod segment;
pub mod storage;
pub mod memory;

pub use accessor::{NativeAddress, PartitionHandle};
pub use array::Array;
pub use catalog::{GalaxyCatalog, PartitionQuantities, QuantityFilter};
pub use common::{CatalogError, PartitionId, Result};
pub use config::CatalogConfig;
pub use modifier::{Dependency, QuantityModifier, QuantityModifierRegistry, Transform};
