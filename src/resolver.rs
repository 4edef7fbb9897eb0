//! 逻辑量解析
//!
//! 单个逻辑量的状态机：
//!
//! ```text
//! UNRESOLVED ──alias──────────────────────────────────► fetched ─┐
//!      │                                                         ├─► RESOLVED
//!      └─derived─► DEPENDENCIES_PENDING ─► READY ─► TRANSFORMED ─┘
//!                         │                             │
//!                         └────────► FAILED ◄───────────┘
//! ```
//!
//! 同一分区内已解析的逻辑量与原生列会被缓存（多个派生量共享同一原生列
//! 时只读一次）；换到另一个分区的句柄时缓存清空。

use std::collections::{BTreeSet, HashMap};
use crate::accessor::{NativeAddress, PartitionHandle};
use crate::array::Array;
use crate::common::{CatalogError, PartitionId, Result};
use crate::modifier::{Dependency, QuantityModifier, QuantityModifierRegistry};

pub struct QuantityResolver<'a> {
    registry:  &'a QuantityModifierRegistry,
    natives:   &'a BTreeSet<NativeAddress>,
    /// 当前缓存所属的分区
    partition: Option<PartitionId>,
    logical:   HashMap<String, Array>,
    native:    HashMap<NativeAddress, Array>,
}

impl<'a> QuantityResolver<'a> {
    pub fn new(registry: &'a QuantityModifierRegistry, natives: &'a BTreeSet<NativeAddress>) -> Self {
        Self {
            registry, natives,
            partition: None,
            logical:   HashMap::new(),
            native:    HashMap::new(),
        }
    }

    /// 在分区上解析逻辑量，返回与分区行序对齐的数组
    pub fn get(&mut self, name: &str, handle: &mut PartitionHandle) -> Result<Array> {
        self.begin_partition(handle.partition_id());
        let mut stack = Vec::new();
        self.resolve_logical(name, handle, &mut stack)
    }

    /// 不做 I/O，仅检查依赖链是否全部落在已发现的原生量上
    pub fn check(&self, name: &str) -> Result<()> {
        self.check_logical(name, &mut Vec::new())
    }

    fn begin_partition(&mut self, id: PartitionId) {
        if self.partition != Some(id) {
            self.logical.clear();
            self.native.clear();
            self.partition = Some(id);
        }
    }

    fn resolve_logical(
        &mut self,
        name:   &str,
        handle: &mut PartitionHandle,
        stack:  &mut Vec<String>,
    ) -> Result<Array> {
        if let Some(hit) = self.logical.get(name) {
            return Ok(hit.clone());
        }
        let registry = self.registry;
        let modifier = registry.resolve_spec(name)?;
        if stack.iter().any(|n| n == name) {
            return Err(cycle_error(name, stack));
        }

        let out = match modifier {
            QuantityModifier::Alias(address) => self.resolve_native(name, address, handle)?,
            QuantityModifier::Derived { transform, dependencies } => {
                stack.push(name.to_string());
                let inputs = dependencies.iter()
                    .map(|dep| self.resolve_dependency(name, dep, handle, stack))
                    .collect::<Result<Vec<_>>>();
                stack.pop();

                let out = transform.apply(&inputs?).map_err(|reason| {
                    CatalogError::TransformFailure { quantity: name.into(), reason }
                })?;
                if out.len() != handle.num_rows() {
                    return Err(CatalogError::TransformFailure {
                        quantity: name.into(),
                        reason:   format!(
                            "{} returned {} rows, partition has {}",
                            transform.label(), out.len(), handle.num_rows()
                        ),
                    });
                }
                out
            }
        };
        self.logical.insert(name.to_string(), out.clone());
        Ok(out)
    }

    fn resolve_dependency(
        &mut self,
        name:   &str,
        dep:    &Dependency,
        handle: &mut PartitionHandle,
        stack:  &mut Vec<String>,
    ) -> Result<Array> {
        match dep {
            Dependency::Native(address) => self.resolve_native(name, address, handle),
            Dependency::Logical(inner) => self.resolve_logical(inner, handle, stack)
                .map_err(|e| wrap_dependency_error(name, inner, e)),
        }
    }

    fn resolve_native(
        &mut self,
        name:    &str,
        address: &NativeAddress,
        handle:  &mut PartitionHandle,
    ) -> Result<Array> {
        if !self.natives.contains(address) {
            return Err(CatalogError::unresolvable(name, format!("native quantity {address} is not in this catalog")));
        }
        if let Some(hit) = self.native.get(address) {
            return Ok(hit.clone());
        }
        let data = handle.fetch(address)?;
        self.native.insert(address.clone(), data.clone());
        Ok(data)
    }

    fn check_logical(&self, name: &str, stack: &mut Vec<String>) -> Result<()> {
        let modifier = self.registry.resolve_spec(name)?;
        if stack.iter().any(|n| n == name) {
            return Err(cycle_error(name, stack));
        }
        match modifier {
            QuantityModifier::Alias(address) => self.check_native(name, address),
            QuantityModifier::Derived { dependencies, .. } => {
                stack.push(name.to_string());
                let res = dependencies.iter().try_for_each(|dep| match dep {
                    Dependency::Native(address) => self.check_native(name, address),
                    Dependency::Logical(inner) => self.check_logical(inner, stack)
                        .map_err(|e| wrap_dependency_error(name, inner, e)),
                });
                stack.pop();
                res
            }
        }
    }

    fn check_native(&self, name: &str, address: &NativeAddress) -> Result<()> {
        if self.natives.contains(address) {
            Ok(())
        } else {
            Err(CatalogError::unresolvable(name, format!("native quantity {address} is not in this catalog")))
        }
    }
}

fn cycle_error(name: &str, stack: &[String]) -> CatalogError {
    CatalogError::unresolvable(name, format!("cyclic derivation: {} -> {name}", stack.join(" -> ")))
}

/// 依赖的逻辑量未注册或不可解析时，归因到当前量
fn wrap_dependency_error(name: &str, inner: &str, err: CatalogError) -> CatalogError {
    match err {
        CatalogError::UnknownQuantity(_) => {
            CatalogError::unresolvable(name, format!("depends on unregistered quantity {inner}"))
        }
        CatalogError::UnresolvableQuantity { quantity, reason } if quantity != name => {
            CatalogError::unresolvable(name, format!("depends on {quantity}: {reason}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySource, MemoryTable};
    use crate::modifier::Transform;
    use crate::native::NativeQuantityCatalog;
    use crate::partition::PartitionLayout;

    fn source() -> MemorySource {
        let t0 = MemoryTable::new()
            .with_scalar("Z", Array::Float64(vec![0.1, 0.2, 0.3]))
            .unwrap()
            .with_scalar("CENTRAL", Array::Int32(vec![1, 0, 1]))
            .unwrap()
            .with_vector("TE", 2, Array::Float64(vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]))
            .unwrap();
        let t1 = MemoryTable::new()
            .with_scalar("Z", Array::Float64(vec![1.5]))
            .unwrap()
            .with_scalar("CENTRAL", Array::Int32(vec![0]))
            .unwrap()
            .with_vector("TE", 2, Array::Float64(vec![0.5, 0.6]))
            .unwrap();
        MemorySource::new().with_group(0, "truth", t0).with_group(1, "truth", t1)
    }

    fn registry() -> QuantityModifierRegistry {
        let mut reg = QuantityModifierRegistry::new();
        reg.alias("redshift_true", NativeAddress::field("truth", "Z"))
            .alias("ellipticity_2_true", NativeAddress::element("truth", "TE", 1))
            .alias("healpix", NativeAddress::PartitionId)
            .alias("missing", NativeAddress::field("truth", "NOPE"))
            .derive("is_central", Transform::to_bool(), vec![NativeAddress::field("truth", "CENTRAL").into()])
            .derive("one_plus_z", Transform::map_f64("one_plus", |z| 1.0 + z), vec!["redshift_true".into()])
            .derive("broken", Transform::map_f64("id", |z| z), vec!["missing".into()])
            .derive("loop_a", Transform::map_f64("id", |z| z), vec!["loop_b".into()])
            .derive("loop_b", Transform::map_f64("id", |z| z), vec!["loop_a".into()])
            .derive("short", Transform::new("first_row", |x| Ok(x[0].slice(0..1))), vec!["redshift_true".into()])
            .derive("fails", Transform::new("fails", |_| Err("boom".into())), vec!["redshift_true".into()]);
        reg
    }

    struct Fixture {
        src:      MemorySource,
        required: Vec<String>,
        reg:      QuantityModifierRegistry,
        natives:  NativeQuantityCatalog,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                src:      source(),
                required: vec!["truth".into()],
                reg:      registry(),
                natives:  NativeQuantityCatalog::new(),
            }
        }
        fn layout(&self) -> PartitionLayout<'_> {
            PartitionLayout::new(&self.src, 2, &self.required)
        }
    }

    #[test]
    fn alias_and_column_index() {
        let fx = Fixture::new();
        let layout = fx.layout();
        let set = fx.natives.discover(&layout).unwrap();
        let mut r = QuantityResolver::new(&fx.reg, set);

        let mut it = layout.iterate(vec![]);
        let mut h0 = it.next().unwrap();
        assert_eq!(r.get("redshift_true", &mut h0).unwrap(), Array::Float64(vec![0.1, 0.2, 0.3]));
        assert_eq!(r.get("ellipticity_2_true", &mut h0).unwrap(), Array::Float64(vec![-0.1, -0.2, -0.3]));
        assert_eq!(r.get("healpix", &mut h0).unwrap(), Array::Int64(vec![0, 0, 0]));
        drop(h0);

        let mut h1 = it.next().unwrap();
        assert_eq!(r.get("redshift_true", &mut h1).unwrap(), Array::Float64(vec![1.5]));
        assert_eq!(r.get("healpix", &mut h1).unwrap(), Array::Int64(vec![1]));
    }

    #[test]
    fn derived_quantities() {
        let fx = Fixture::new();
        let layout = fx.layout();
        let set = fx.natives.discover(&layout).unwrap();
        let mut r = QuantityResolver::new(&fx.reg, set);
        let mut h0 = layout.iterate(vec![]).next().unwrap();

        assert_eq!(r.get("is_central", &mut h0).unwrap(), Array::Bool(vec![true, false, true]));
        let z1 = r.get("one_plus_z", &mut h0).unwrap();
        assert_eq!(z1.len(), 3);
        assert!((z1.as_f64().unwrap()[2] - 1.3).abs() < 1e-12);
    }

    #[test]
    fn failures_are_per_quantity() {
        let fx = Fixture::new();
        let layout = fx.layout();
        let set = fx.natives.discover(&layout).unwrap();
        let mut r = QuantityResolver::new(&fx.reg, set);
        let mut h0 = layout.iterate(vec![]).next().unwrap();

        assert!(matches!(r.get("nope", &mut h0), Err(CatalogError::UnknownQuantity(_))));
        assert!(matches!(r.get("missing", &mut h0), Err(CatalogError::UnresolvableQuantity { .. })));
        assert!(matches!(
            r.get("broken", &mut h0),
            Err(CatalogError::UnresolvableQuantity { quantity, .. }) if quantity == "broken"
        ));
        assert!(matches!(r.get("loop_a", &mut h0), Err(CatalogError::UnresolvableQuantity { .. })));
        assert!(matches!(r.get("short", &mut h0), Err(CatalogError::TransformFailure { .. })));
        assert!(matches!(
            r.get("fails", &mut h0),
            Err(CatalogError::TransformFailure { quantity, reason }) if quantity == "fails" && reason == "boom"
        ));
        // 兄弟量不受影响
        assert!(r.get("redshift_true", &mut h0).is_ok());
    }

    #[test]
    fn static_check_matches_resolution() {
        let fx = Fixture::new();
        let layout = fx.layout();
        let set = fx.natives.discover(&layout).unwrap();
        let r = QuantityResolver::new(&fx.reg, set);

        assert!(r.check("one_plus_z").is_ok());
        assert!(r.check("is_central").is_ok());
        assert!(r.check("broken").is_err());
        assert!(r.check("loop_b").is_err());
        assert!(matches!(r.check("nope"), Err(CatalogError::UnknownQuantity(_))));
    }

    #[test]
    fn cache_is_dropped_on_partition_change() {
        let fx = Fixture::new();
        let layout = fx.layout();
        let set = fx.natives.discover(&layout).unwrap();
        let mut r = QuantityResolver::new(&fx.reg, set);

        let mut handles = layout.iterate(vec![]);
        let mut h0 = handles.next().unwrap();
        r.get("one_plus_z", &mut h0).unwrap();
        assert!(r.logical.contains_key("redshift_true"));
        assert_eq!(r.native.len(), 1);

        let mut h1 = handles.next().unwrap();
        let z = r.get("is_central", &mut h1).unwrap();
        assert_eq!(z, Array::Bool(vec![false]));
        assert!(!r.logical.contains_key("redshift_true"));
    }
}
