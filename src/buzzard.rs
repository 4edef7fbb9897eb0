//! Buzzard（Chinchilla-0 lensed）星系 catalog 预设
//!
//! 768 个 HEALPix 分区，每个分区一个 `truth` group 文件。
//! 同一存储列同时以 `_des` 与 `_any` 两套测光系统名暴露。

use std::path::PathBuf;
use crate::accessor::NativeAddress;
use crate::catalog::GalaxyCatalog;
use crate::common::Result;
use crate::config::CatalogConfig;
use crate::modifier::{QuantityModifierRegistry, Transform};

pub const NPIX: u64                    = 768;
pub const FILENAME_TEMPLATE: &str      = "Chinchilla-0_lensed.{}.seg";
pub const TRUTH: &str                  = "truth";
/// 合成的分区号量，可下推为 pre-filter
pub const ORIGINAL_HEALPIXEL: &str     = "original_healpixel";
pub const BANDS: [char; 5]             = ['g', 'r', 'i', 'z', 'Y'];

fn truth(field: &str) -> NativeAddress {
    NativeAddress::field(TRUTH, field)
}

pub fn registry() -> QuantityModifierRegistry {
    let mut reg = QuantityModifierRegistry::new();
    reg.alias(ORIGINAL_HEALPIXEL, NativeAddress::PartitionId)
        .alias("galaxy_id",     truth("ID"))
        .alias("redshift_true", truth("Z"))
        .alias("ra",            truth("RA"))
        .alias("dec",           truth("DEC"))
        .alias("ra_true",       truth("TRA"))
        .alias("dec_true",      truth("TDEC"))
        .alias("halo_id",       truth("HALOID"))
        .derive("is_bcg", Transform::to_bool(), vec![truth("CENTRAL").into()])
        .alias("ellipticity_1",      NativeAddress::element(TRUTH, "EPSILON", 0))
        .alias("ellipticity_2",      NativeAddress::element(TRUTH, "EPSILON", 1))
        .alias("ellipticity_1_true", NativeAddress::element(TRUTH, "TE", 0))
        .alias("ellipticity_2_true", NativeAddress::element(TRUTH, "TE", 1))
        .alias("size",          truth("SIZE"))
        .alias("size_true",     truth("TSIZE"))
        .alias("shear_1",       truth("GAMMA1"))
        .alias("shear_2",       truth("GAMMA2"))
        .alias("convergence",   truth("KAPPA"))
        .alias("magnification", truth("MU"))
        .alias("position_x",    truth("PX"))
        .alias("position_y",    truth("PY"))
        .alias("position_z",    truth("PZ"))
        .alias("velocity_x",    truth("VX"))
        .alias("velocity_y",    truth("VY"))
        .alias("velocity_z",    truth("VZ"));

    for (i, band) in BANDS.iter().enumerate() {
        let i = i as u32;
        for system in ["des", "any"] {
            reg.alias(&format!("Mag01_true_{band}_{system}"), NativeAddress::element(TRUTH, "AMAG", i))
                .alias(&format!("mag_{band}_{system}"),       NativeAddress::element(TRUTH, "OMAG", i))
                .alias(&format!("magerr_{band}_{system}"),    NativeAddress::element(TRUTH, "OMAGERR", i));
        }
    }
    reg
}

pub fn config(catalog_dir: impl Into<PathBuf>) -> CatalogConfig {
    CatalogConfig::new(catalog_dir, NPIX, FILENAME_TEMPLATE, &[TRUTH])
}

/// 打开 `<base_dir>/<catalog_dir>` 下的 Buzzard catalog
pub fn open(catalog_dir: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Result<GalaxyCatalog> {
    let cfg = config(catalog_dir).with_base_directory(base_dir);
    GalaxyCatalog::open(cfg, registry())?.with_pre_filter_quantities(&[ORIGINAL_HEALPIXEL])
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use super::*;
    use crate::array::Array;
    use crate::catalog::QuantityFilter;
    use crate::field_type::{FieldMeta, FieldType};
    use crate::modifier::QuantityModifier;
    use crate::segment::SegmentWriter;

    #[test]
    fn registry_covers_both_photometric_systems() {
        let reg = registry();
        // 24 个标量/派生量 + original_healpixel + 5 波段 × 2 系统 × 3 类
        assert_eq!(reg.len(), 24 + 1 + 30);
        for name in ["Mag01_true_Y_des", "mag_g_any", "magerr_z_des"] {
            assert!(reg.contains(name), "{name}");
        }
        match reg.resolve_spec("mag_i_any").unwrap() {
            QuantityModifier::Alias(a) => assert_eq!(*a, NativeAddress::element(TRUTH, "OMAG", 2)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(reg.resolve_spec("is_bcg").unwrap(), QuantityModifier::Derived { .. }));
    }

    #[test]
    fn config_matches_chinchilla_layout() {
        let cfg = config("buzzard").with_base_directory("/sims");
        assert_eq!(cfg.partition_count, 768);
        assert_eq!(
            cfg.group_path(TRUTH, 7),
            PathBuf::from("/sims/buzzard/truth/Chinchilla-0_lensed.7.seg")
        );
    }

    // ── 磁盘上的 catalog ──────────────────────────────────────────────────────

    fn write_truth(root: &Path, id: u64, z: Vec<f64>, central: Vec<i32>) {
        let rows = z.len();
        let schema = vec![
            FieldMeta::scalar("ID", FieldType::Int64),
            FieldMeta::scalar("Z", FieldType::Float64),
            FieldMeta::scalar("CENTRAL", FieldType::Int32),
            FieldMeta::vector("OMAG", FieldType::Float32, 5),
        ];
        let mut w = SegmentWriter::new(schema).unwrap();
        w.append("ID", Array::Int64((0..rows as i64).map(|i| id as i64 * 1000 + i).collect())).unwrap();
        w.append("Z", Array::Float64(z)).unwrap();
        w.append("CENTRAL", Array::Int32(central)).unwrap();
        w.append("OMAG", Array::Float32((0..rows * 5).map(|i| 20.0 + i as f32).collect())).unwrap();

        let cfg = config("buzzard").with_base_directory(root);
        let path = cfg.group_path(TRUTH, id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        w.write_to_path(&path).unwrap();
    }

    #[test]
    fn on_disk_catalog_resolves_aliases_and_casts() {
        let dir = tempfile::tempdir().unwrap();
        write_truth(dir.path(), 3, vec![0.2, 0.7, 1.1], vec![1, 0, 0]);
        write_truth(dir.path(), 500, vec![0.4], vec![1]);

        let cat = open("buzzard", dir.path()).unwrap();
        let available = cat.list_available_quantities().unwrap();
        for q in ["galaxy_id", "redshift_true", "is_bcg", "mag_Y_des", "mag_Y_any", "original_healpixel"] {
            assert!(available.contains(q), "{q}");
        }
        assert!(!available.contains("ra"));
        assert!(!available.contains("Mag01_true_g_des"));

        let parts = cat
            .get_quantities(&["is_bcg", "mag_r_des", "mag_r_any", "galaxy_id"], vec![])
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(parts.iter().map(|p| p.partition_id).collect::<Vec<_>>(), vec![3, 500]);
        assert_eq!(parts[0].get("is_bcg"), Some(&Array::Bool(vec![true, false, false])));
        assert_eq!(parts[0].get("mag_r_des"), Some(&Array::Float32(vec![21.0, 26.0, 31.0])));
        assert_eq!(parts[0].get("mag_r_des"), parts[0].get("mag_r_any"));
        assert_eq!(parts[1].get("galaxy_id"), Some(&Array::Int64(vec![500_000])));
    }

    #[test]
    fn healpixel_filter_is_pushed_down() {
        let dir = tempfile::tempdir().unwrap();
        write_truth(dir.path(), 3, vec![0.2], vec![0]);
        write_truth(dir.path(), 500, vec![0.4], vec![1]);

        let cat = open("buzzard", dir.path()).unwrap();
        let ids: Vec<_> = cat
            .get_quantities(&["redshift_true"], vec![QuantityFilter::range(ORIGINAL_HEALPIXEL, 400.0, 768.0)])
            .unwrap()
            .map(|p| p.unwrap().partition_id)
            .collect();
        assert_eq!(ids, vec![500]);
    }

    #[test]
    fn corrupt_group_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_truth(dir.path(), 1, vec![0.3], vec![0]);
        let cfg = config("buzzard").with_base_directory(dir.path());
        std::fs::write(cfg.group_path(TRUTH, 2), b"not a segment").unwrap();

        let cat = open("buzzard", dir.path()).unwrap();
        let ids: Vec<_> = cat.get_quantities(&["redshift_true"], vec![])
            .unwrap()
            .map(|p| p.unwrap().partition_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }
}
