//! 端到端：注册表 + 原生量发现 + 分区迭代 + 逻辑量解析

use std::sync::Arc;

use galaxy_catalog::memory::{MemorySource, MemoryTable};
use galaxy_catalog::{
    Array, CatalogConfig, CatalogError, GalaxyCatalog, NativeAddress, QuantityFilter,
    QuantityModifierRegistry, Transform,
};
use rstest::rstest;

// ── 内存 catalog ──────────────────────────────────────────────────────────────

fn truth_table(z: Vec<f64>) -> MemoryTable {
    let rows = z.len();
    MemoryTable::new()
        .with_scalar("Z", Array::Float64(z))
        .unwrap()
        .with_vector("AMAG", 5, Array::Float32((0..rows * 5).map(|i| i as f32).collect()))
        .unwrap()
}

/// 3 个分区，只有 0 和 2 有 truth group
fn sparse_source() -> Arc<MemorySource> {
    Arc::new(
        MemorySource::new()
            .with_group(0, "truth", truth_table(vec![0.1, 0.2]))
            .with_group(2, "truth", truth_table(vec![0.5, 0.9, 1.3])),
    )
}

fn registry() -> QuantityModifierRegistry {
    let mut reg = QuantityModifierRegistry::new();
    reg.alias("healpix", NativeAddress::PartitionId)
        .alias("redshift_true", NativeAddress::field("truth", "Z"))
        .alias("Mag_true_r", NativeAddress::element("truth", "AMAG", 1))
        .derive(
            "one_plus_z",
            Transform::map_f64("one_plus", |z| 1.0 + z),
            vec!["redshift_true".into()],
        )
        .alias("stellar_mass", NativeAddress::field("truth", "SM"))
        .derive("log_stellar_mass", Transform::map_f64("log10", f64::log10), vec!["stellar_mass".into()]);
    reg
}

fn catalog(src: &Arc<MemorySource>) -> GalaxyCatalog {
    let cfg = CatalogConfig::new("mem", 3, "part.{}", &["truth"]);
    GalaxyCatalog::with_source(cfg, Box::new(Arc::clone(src)), registry())
        .unwrap()
        .with_pre_filter_quantities(&["healpix"])
        .unwrap()
}

#[test]
fn sparse_partitions_are_skipped() {
    let src = sparse_source();
    let cat = catalog(&src);

    let natives = cat.native_quantities().unwrap();
    assert!(natives.contains(&NativeAddress::field("truth", "Z")));
    assert!(natives.contains(&NativeAddress::PartitionId));
    for i in 0..5 {
        assert!(natives.contains(&NativeAddress::element("truth", "AMAG", i)));
    }
    assert!(!natives.contains(&NativeAddress::field("truth", "AMAG")));

    let parts: Vec<_> = cat.get_quantities(&["redshift_true"], vec![])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let ids: Vec<_> = parts.iter().map(|p| p.partition_id).collect();
    assert_eq!(ids, vec![0, 2]);
    assert_eq!(parts[1].get("redshift_true"), Some(&Array::Float64(vec![0.5, 0.9, 1.3])));
    assert_eq!(src.open_count(), src.close_count());
}

#[test]
fn vector_element_and_derived_quantities() {
    let src = sparse_source();
    let cat = catalog(&src);
    let first = cat.get_quantities(&["Mag_true_r", "one_plus_z", "healpix"], vec![])
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(first.get("Mag_true_r"), Some(&Array::Float32(vec![1.0, 6.0])));
    assert_eq!(first.get("one_plus_z"), Some(&Array::Float64(vec![1.1, 1.2])));
    assert_eq!(first.get("healpix"), Some(&Array::Int64(vec![0, 0])));
}

#[test]
fn availability_follows_discovered_natives() {
    let src = sparse_source();
    let cat = catalog(&src);
    let available = cat.list_available_quantities().unwrap();
    assert!(available.contains("one_plus_z"));
    assert!(!available.contains("stellar_mass"));
    assert!(!available.contains("log_stellar_mass"));

    assert!(cat.has_quantities(&["redshift_true", "Mag_true_r"]).unwrap());
    assert!(!cat.has_quantity("log_stellar_mass").unwrap());
    assert!(!cat.has_quantity("no_such_thing").unwrap());
}

#[test]
fn discovery_inspects_one_partition_once() {
    let src = sparse_source();
    let cat = catalog(&src);
    let a = cat.list_available_quantities().unwrap();
    let b = cat.list_available_quantities().unwrap();
    assert_eq!(a, b);
    assert_eq!(src.open_count(), 1);
}

#[test]
fn unknown_quantity_fails_before_any_io() {
    let src = sparse_source();
    let cat = catalog(&src);
    let err = cat.get_quantities(&["redshift_true", "bogus"], vec![]).err().unwrap();
    assert!(matches!(err, CatalogError::UnknownQuantity(ref q) if q == "bogus"));

    let filter = QuantityFilter::range("bogus_too", 0.0, 1.0);
    let err = cat.get_quantities(&["redshift_true"], vec![filter]).err().unwrap();
    assert!(matches!(err, CatalogError::UnknownQuantity(ref q) if q == "bogus_too"));
    assert_eq!(src.open_count(), 0);
}

#[test]
fn unresolvable_quantity_fails_per_partition_only() {
    let src = sparse_source();
    let cat = catalog(&src);
    for part in cat.get_quantities(&["redshift_true", "log_stellar_mass"], vec![]).unwrap() {
        let part = part.unwrap();
        assert!(part.get("redshift_true").is_some());
        assert!(matches!(
            part.failures.get("log_stellar_mass"),
            Some(CatalogError::UnresolvableQuantity { quantity, .. }) if quantity == "log_stellar_mass"
        ));
    }
}

#[test]
fn partition_filter_is_pushed_down() {
    let src = sparse_source();
    let cat = catalog(&src);
    cat.native_quantities().unwrap();
    let opened = src.open_count();

    let only_two = QuantityFilter::new(&["healpix"], |inputs| {
        Ok(inputs[0].as_i64().unwrap_or_default().iter().map(|id| *id == 2).collect())
    });
    let ids: Vec<_> = cat.get_quantities(&["redshift_true"], vec![only_two])
        .unwrap()
        .map(|p| p.unwrap().partition_id)
        .collect();
    assert_eq!(ids, vec![2]);
    // 分区 0 与 1 未被打开
    assert_eq!(src.open_count() - opened, 1);
}

#[test]
fn push_down_can_reject_everything_without_io() {
    let src = sparse_source();
    let cat = catalog(&src);
    cat.native_quantities().unwrap();
    let opened = src.open_count();

    let none = QuantityFilter::range("healpix", 100.0, 200.0);
    assert_eq!(cat.get_quantities(&["redshift_true"], vec![none]).unwrap().count(), 0);
    assert_eq!(src.open_count(), opened);
}

#[rstest]
#[case(0.0, 1.0, vec![vec![0.1, 0.2], vec![0.5, 0.9]])]
#[case(0.15, 0.6, vec![vec![0.2], vec![0.5]])]
#[case(5.0, 6.0, vec![vec![], vec![]])]
fn row_filters_mask_every_quantity(#[case] min: f64, #[case] max: f64, #[case] expected: Vec<Vec<f64>>) {
    let src = sparse_source();
    let cat = catalog(&src);
    let got: Vec<Vec<f64>> = cat
        .get_quantities(&["redshift_true"], vec![QuantityFilter::range("redshift_true", min, max)])
        .unwrap()
        .map(|p| p.unwrap().get("redshift_true").unwrap().to_f64())
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn row_filter_and_push_down_combine() {
    let src = sparse_source();
    let cat = catalog(&src);
    let filters = vec![
        QuantityFilter::range("healpix", 1.0, 3.0),
        QuantityFilter::range("redshift_true", 0.6, 2.0),
    ];
    let parts: Vec<_> = cat.get_quantities(&["Mag_true_r"], filters)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].get("Mag_true_r"), Some(&Array::Float32(vec![6.0, 11.0])));
}

#[test]
fn empty_catalog_is_an_error() {
    let src = Arc::new(MemorySource::new());
    let cat = catalog(&src);
    assert!(matches!(cat.list_available_quantities(), Err(CatalogError::EmptyCatalog)));
    assert!(matches!(cat.get_quantities(&["redshift_true"], vec![]), Err(CatalogError::EmptyCatalog)));
}

#[test]
fn failing_row_filter_still_releases_the_partition() {
    let src = sparse_source();
    let cat = catalog(&src);
    let broken = QuantityFilter::new(&["redshift_true"], |_| Err("bad cut".to_string()));

    let mut scan = cat.get_quantities(&["redshift_true"], vec![broken]).unwrap();
    assert!(matches!(
        scan.next(),
        Some(Err(CatalogError::TransformFailure { ref reason, .. })) if reason == "bad cut"
    ));
    assert_eq!(src.open_count(), src.close_count());

    // 行数不符的掩码同样走错误分支
    let short = QuantityFilter::new(&["redshift_true"], |_| Ok(vec![true]));
    for part in cat.get_quantities(&["redshift_true"], vec![short]).unwrap() {
        assert!(part.is_err());
        assert_eq!(src.open_count(), src.close_count());
    }
}

#[test]
fn pre_filter_quantities_must_alias_the_partition_id() {
    let src = sparse_source();
    let cfg = CatalogConfig::new("mem", 3, "part.{}", &["truth"]);
    let open = || GalaxyCatalog::with_source(cfg.clone(), Box::new(Arc::clone(&src)), registry()).unwrap();

    assert!(matches!(
        open().with_pre_filter_quantities(&["redshift_true"]),
        Err(CatalogError::Config(_))
    ));
    assert!(matches!(
        open().with_pre_filter_quantities(&["not_registered"]),
        Err(CatalogError::Config(_))
    ));
    let cat = open().with_pre_filter_quantities(&["healpix"]).unwrap();
    assert_eq!(cat.pre_filter_quantities().collect::<Vec<_>>(), vec!["healpix"]);
}

#[test]
fn width_one_vector_is_addressed_by_element() {
    let table = MemoryTable::new()
        .with_vector("TSIZE", 1, Array::Float64(vec![1.5, 2.5]))
        .unwrap();
    let src = Arc::new(MemorySource::new().with_group(0, "truth", table));
    let mut reg = QuantityModifierRegistry::new();
    reg.alias("size_true", NativeAddress::element("truth", "TSIZE", 0))
        .alias("size_flat", NativeAddress::field("truth", "TSIZE"));
    let cfg = CatalogConfig::new("mem", 1, "part.{}", &["truth"]);
    let cat = GalaxyCatalog::with_source(cfg, Box::new(Arc::clone(&src)), reg).unwrap();

    let natives = cat.native_quantities().unwrap();
    assert!(natives.contains(&NativeAddress::element("truth", "TSIZE", 0)));
    assert!(!natives.contains(&NativeAddress::field("truth", "TSIZE")));
    assert!(cat.has_quantity("size_true").unwrap());
    assert!(!cat.has_quantity("size_flat").unwrap());

    let part = cat.get_quantities(&["size_true"], vec![]).unwrap().next().unwrap().unwrap();
    assert_eq!(part.get("size_true"), Some(&Array::Float64(vec![1.5, 2.5])));
}
