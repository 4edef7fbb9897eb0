//! GalaxyCatalog：对外的量请求接口
//!
//! 把注册表、原生量发现、分区迭代和逻辑量解析组合起来：
//!
//! ```text
//! get_quantities(names, filters)
//!   ├─ filters 全部作用于 pre-filter 量 → 下推到 PartitionScan（按分区号，零 I/O）
//!   └─ 其余 filters → 每个分区解析后逐行求掩码
//!        │
//!   PartitionScan ──► PartitionHandle ──► QuantityResolver ──► PartitionQuantities
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use crate::accessor::{GroupSource, NativeAddress, PartitionHandle};
use crate::array::Array;
use crate::common::{CatalogError, PartitionId, Result};
use crate::config::CatalogConfig;
use crate::modifier::{QuantityModifier, QuantityModifierRegistry};
use crate::native::NativeQuantityCatalog;
use crate::partition::{PartitionLayout, PartitionScan, PreFilter};
use crate::resolver::QuantityResolver;
use crate::storage::DirectorySource;

// ── QuantityFilter ────────────────────────────────────────────────────────────

type PredicateFn = dyn Fn(&[Array]) -> std::result::Result<Vec<bool>, String> + Send + Sync;

/// 作用于若干逻辑量的行谓词
///
/// 输入按 `quantities` 顺序给出，返回逐行掩码。若所有量都是 pre-filter
/// 量，则每个输入是只含分区号的单元素 `Int64` 数组，返回值取第一个元素。
#[derive(Clone)]
pub struct QuantityFilter {
    quantities: Vec<String>,
    predicate:  Arc<PredicateFn>,
}

impl QuantityFilter {
    pub fn new<F>(quantities: &[&str], predicate: F) -> Self
    where
        F: Fn(&[Array]) -> std::result::Result<Vec<bool>, String> + Send + Sync + 'static,
    {
        Self {
            quantities: quantities.iter().map(|q| q.to_string()).collect(),
            predicate:  Arc::new(predicate),
        }
    }

    /// `min <= x < max`
    pub fn range(quantity: &str, min: f64, max: f64) -> Self {
        Self::new(&[quantity], move |inputs| match inputs {
            [x] => Ok(x.to_f64().into_iter().map(|v| min <= v && v < max).collect()),
            _   => Err(format!("range expects 1 input, got {}", inputs.len())),
        })
    }

    pub fn quantities(&self) -> &[String] { &self.quantities }

    fn label(&self) -> String {
        format!("filter({})", self.quantities.join(", "))
    }

    fn evaluate(&self, inputs: &[Array]) -> Result<Vec<bool>> {
        (self.predicate)(inputs).map_err(|reason| CatalogError::TransformFailure {
            quantity: self.label(), reason,
        })
    }

    /// 仅凭分区号求值
    fn accepts_partition(&self, id: PartitionId) -> bool {
        let inputs: Vec<Array> = self.quantities.iter().map(|_| Array::Int64(vec![id as i64])).collect();
        match self.evaluate(&inputs) {
            Ok(mask) => mask.first().copied().unwrap_or(false),
            Err(e) => {
                log::warn!("pre-filter rejected partition {id} on error: {e}");
                false
            }
        }
    }
}

impl fmt::Debug for QuantityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ── PartitionQuantities ───────────────────────────────────────────────────────

/// 一个分区上请求的逻辑量
#[derive(Debug)]
pub struct PartitionQuantities {
    pub partition_id: PartitionId,
    pub quantities:   BTreeMap<String, Array>,
    /// 解析失败的量；不影响同批次的其他量
    pub failures:     BTreeMap<String, CatalogError>,
}

impl PartitionQuantities {
    pub fn get(&self, name: &str) -> Option<&Array> {
        self.quantities.get(name)
    }
}

// ── GalaxyCatalog ─────────────────────────────────────────────────────────────

pub struct GalaxyCatalog {
    config:                CatalogConfig,
    source:                Box<dyn GroupSource>,
    registry:              QuantityModifierRegistry,
    pre_filter_quantities: BTreeSet<String>,
    natives:               NativeQuantityCatalog,
}

impl GalaxyCatalog {
    /// 以磁盘目录布局打开
    pub fn open(config: CatalogConfig, registry: QuantityModifierRegistry) -> Result<Self> {
        let source = DirectorySource::new(config.clone());
        Self::with_source(config, Box::new(source), registry)
    }

    /// 使用任意存储；`config` 只取分区数与必需 group
    pub fn with_source(
        config:   CatalogConfig,
        source:   Box<dyn GroupSource>,
        registry: QuantityModifierRegistry,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config, source, registry,
            pre_filter_quantities: BTreeSet::new(),
            natives:               NativeQuantityCatalog::new(),
        })
    }

    /// 声明可仅凭分区号求值的逻辑量
    ///
    /// 每个名字都必须注册为 [`NativeAddress::PartitionId`] 的别名，
    /// 否则下推时会把分区号误当作该量的值。
    pub fn with_pre_filter_quantities(mut self, names: &[&str]) -> Result<Self> {
        for name in names {
            match self.registry.resolve_spec(name) {
                Ok(QuantityModifier::Alias(NativeAddress::PartitionId)) => {}
                Ok(_) => {
                    return Err(CatalogError::Config(format!(
                        "pre-filter quantity {name} is not an alias of the partition id"
                    )))
                }
                Err(_) => {
                    return Err(CatalogError::Config(format!(
                        "pre-filter quantity {name} is not registered"
                    )))
                }
            }
        }
        self.pre_filter_quantities = names.iter().map(|n| n.to_string()).collect();
        Ok(self)
    }

    pub fn config(&self) -> &CatalogConfig { &self.config }
    pub fn registry(&self) -> &QuantityModifierRegistry { &self.registry }

    pub fn pre_filter_quantities(&self) -> impl Iterator<Item = &str> {
        self.pre_filter_quantities.iter().map(String::as_str)
    }

    fn layout(&self) -> PartitionLayout<'_> {
        PartitionLayout::new(&*self.source, self.config.partition_count, &self.config.required_groups)
    }

    /// 原始分区迭代（按分区号的谓词下推）
    pub fn iter_partitions<'a>(&'a self, pre_filters: Vec<PreFilter<'a>>) -> PartitionScan<'a> {
        self.layout().iterate(pre_filters)
    }

    /// 原生量集合，首次调用时从第一个完整分区发现
    pub fn native_quantities(&self) -> Result<&BTreeSet<NativeAddress>> {
        self.natives.discover(&self.layout())
    }

    fn resolver(&self) -> Result<QuantityResolver<'_>> {
        Ok(QuantityResolver::new(&self.registry, self.native_quantities()?))
    }

    /// 依赖链能在本 catalog 的原生量上解析的全部逻辑量
    pub fn list_available_quantities(&self) -> Result<BTreeSet<String>> {
        let resolver = self.resolver()?;
        Ok(self.registry.names()
            .filter(|name| resolver.check(name).is_ok())
            .map(str::to_string)
            .collect())
    }

    pub fn has_quantity(&self, name: &str) -> Result<bool> {
        self.has_quantities(&[name])
    }

    pub fn has_quantities(&self, names: &[&str]) -> Result<bool> {
        let resolver = self.resolver()?;
        Ok(names.iter().all(|n| resolver.check(n).is_ok()))
    }

    /// 惰性地逐分区解析 `names`
    ///
    /// 未注册的量（包括 filter 用到的量）立即返回 `UnknownQuantity`。
    pub fn get_quantities(
        &self,
        names:   &[&str],
        filters: Vec<QuantityFilter>,
    ) -> Result<QuantityScan<'_>> {
        let unknown = names.iter().copied()
            .chain(filters.iter().flat_map(|f| f.quantities.iter().map(String::as_str)))
            .find(|n| !self.registry.contains(n));
        if let Some(name) = unknown {
            return Err(CatalogError::UnknownQuantity(name.into()));
        }
        let resolver = self.resolver()?;

        let (pushed, row_filters): (Vec<_>, Vec<_>) = filters.into_iter()
            .partition(|f| self.is_pre_filter(f));
        log::debug!(
            "get_quantities {:?}: {} pre-filter(s) pushed down, {} row filter(s)",
            names, pushed.len(), row_filters.len()
        );
        let pre_filters: Vec<PreFilter<'_>> = pushed.into_iter()
            .map(|f| Box::new(move |id: PartitionId| f.accepts_partition(id)) as PreFilter<'_>)
            .collect();

        Ok(QuantityScan {
            partitions: self.iter_partitions(pre_filters),
            resolver,
            names: names.iter().map(|n| n.to_string()).collect(),
            row_filters,
        })
    }

    fn is_pre_filter(&self, f: &QuantityFilter) -> bool {
        !f.quantities.is_empty()
            && f.quantities.iter().all(|q| self.pre_filter_quantities.contains(q))
    }
}

// ── QuantityScan ──────────────────────────────────────────────────────────────

/// [`GalaxyCatalog::get_quantities`] 返回的惰性序列
///
/// 每次 `next()` 打开一个分区，解析完毕后在返回前关闭该分区的所有 reader。
pub struct QuantityScan<'a> {
    partitions:  PartitionScan<'a>,
    resolver:    QuantityResolver<'a>,
    names:       Vec<String>,
    row_filters: Vec<QuantityFilter>,
}

impl<'a> QuantityScan<'a> {
    fn row_mask(&mut self, handle: &mut PartitionHandle) -> Result<Option<Vec<bool>>> {
        let mut mask: Option<Vec<bool>> = None;
        for filter in &self.row_filters {
            let inputs = filter.quantities.iter()
                .map(|q| self.resolver.get(q, handle))
                .collect::<Result<Vec<_>>>()?;
            let m = filter.evaluate(&inputs)?;
            if m.len() != handle.num_rows() {
                return Err(CatalogError::TransformFailure {
                    quantity: filter.label(),
                    reason:   format!("mask has {} rows, partition has {}", m.len(), handle.num_rows()),
                });
            }
            mask = Some(match mask {
                None       => m,
                Some(prev) => prev.iter().zip(&m).map(|(a, b)| *a && *b).collect(),
            });
        }
        Ok(mask)
    }
}

impl<'a> Iterator for QuantityScan<'a> {
    type Item = Result<PartitionQuantities>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut handle = self.partitions.next()?;
        let partition_id = handle.partition_id();

        let mask = match self.row_mask(&mut handle) {
            Ok(mask) => mask,
            Err(e)   => return Some(Err(e)),
        };

        let mut out = PartitionQuantities {
            partition_id,
            quantities: BTreeMap::new(),
            failures:   BTreeMap::new(),
        };
        for name in &self.names {
            let resolved = self.resolver.get(name, &mut handle)
                .and_then(|a| match &mask {
                    Some(m) => a.filter(m),
                    None    => Ok(a),
                });
            match resolved {
                Ok(a)  => { out.quantities.insert(name.clone(), a); }
                Err(e) => { out.failures.insert(name.clone(), e); }
            }
        }
        handle.close();
        Some(Ok(out))
    }
}
