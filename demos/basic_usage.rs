//! # galaxy-catalog 使用案例
//!
//! 1. 在临时目录写出一个小型 Buzzard catalog（SegmentWriter）
//! 2. 打开 catalog，列出可用逻辑量
//! 3. 逐分区读取逻辑量（别名 / 向量列元素 / 派生量）
//! 4. 分区号谓词下推 + 逐行过滤

use galaxy_catalog::{
    buzzard,
    field_type::{FieldMeta, FieldType},
    segment::SegmentWriter,
    Array, QuantityFilter,
};

fn main() -> galaxy_catalog::Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   galaxy-catalog 演示                                      ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 写出 catalog：分区 12 / 40 / 613 各一个 truth 文件
    // =========================================================================
    let dir  = std::env::temp_dir().join("galaxy-catalog-demo");
    let base = buzzard::config("buzzard").with_base_directory(&dir);
    println!("【1】写出 Buzzard catalog 到 {} ...", base.catalog_root().display());

    for (pix, rows) in [(12u64, 4usize), (40, 2), (613, 3)] {
        let schema = vec![
            FieldMeta::scalar("ID",      FieldType::Int64),
            FieldMeta::scalar("Z",       FieldType::Float64),
            FieldMeta::scalar("CENTRAL", FieldType::Int32),
            FieldMeta::vector("AMAG",    FieldType::Float32, 5),
            FieldMeta::vector("OMAG",    FieldType::Float32, 5),
        ];
        let mut w = SegmentWriter::new(schema)?;
        w.append("ID",      Array::Int64((0..rows as i64).map(|i| pix as i64 * 100 + i).collect()))?;
        w.append("Z",       Array::Float64((0..rows).map(|i| 0.1 + 0.3 * i as f64).collect()))?;
        w.append("CENTRAL", Array::Int32((0..rows as i32).map(|i| (i == 0) as i32).collect()))?;
        w.append("AMAG",    Array::Float32((0..rows * 5).map(|i| -20.0 - i as f32 * 0.1).collect()))?;
        w.append("OMAG",    Array::Float32((0..rows * 5).map(|i| 22.0 + i as f32 * 0.1).collect()))?;

        let path = base.group_path(buzzard::TRUTH, pix);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = w.write_to_path(&path)?;
        println!("    partition {pix:>3}: {rows} rows, {bytes} bytes");
    }
    println!();

    // =========================================================================
    // 2. 打开并列出可用逻辑量
    // =========================================================================
    println!("【2】可用逻辑量 ...");
    let catalog   = buzzard::open("buzzard", &dir)?;
    let available = catalog.list_available_quantities()?;
    println!("    registered = {}, available = {}", catalog.registry().len(), available.len());
    for name in &available {
        println!("      {name}");
    }
    println!("    has ra? {}\n", catalog.has_quantity("ra")?);

    // =========================================================================
    // 3. 逐分区读取
    // =========================================================================
    println!("【3】读取 redshift_true / mag_r_des / is_bcg ...");
    for part in catalog.get_quantities(&["redshift_true", "mag_r_des", "is_bcg"], vec![])? {
        let part = part?;
        println!("    partition {}:", part.partition_id);
        for (name, values) in &part.quantities {
            println!("      {name:<14} {values:?}");
        }
    }
    println!();

    // =========================================================================
    // 4. 下推 + 逐行过滤
    // =========================================================================
    println!("【4】original_healpixel ∈ [0, 100) 且 redshift_true ∈ [0.3, 1.0) ...");
    let filters = vec![
        QuantityFilter::range(buzzard::ORIGINAL_HEALPIXEL, 0.0, 100.0),
        QuantityFilter::range("redshift_true", 0.3, 1.0),
    ];
    for part in catalog.get_quantities(&["galaxy_id", "redshift_true"], filters)? {
        let part = part?;
        println!(
            "    partition {}: galaxy_id = {:?}, z = {:?}",
            part.partition_id,
            part.get("galaxy_id"),
            part.get("redshift_true"),
        );
    }

    std::fs::remove_dir_all(&dir)?;
    println!("\n✓ done");
    Ok(())
}
