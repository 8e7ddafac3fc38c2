mod utils;

use std::fs;

use complaint_medallion::config::{EntityConfig, QualityThresholds};
use complaint_medallion::ingest::{
    DataSource, EntityMatcher, MetadataAnnotator, QualityGate, UNKNOWN_FILE_MONTH, deduplicate,
    extract_file_month, quality_score,
};
use complaint_medallion::loader::{Loader, detect_delimiter};
use complaint_medallion::{PipelineError, Result};
use utils::{count_true, export_row, text_batch, write_export};

#[test]
fn test_delimiter_follows_separator_counts() {
    assert_eq!(detect_delimiter(b"a;b;c,d"), b';');
    assert_eq!(detect_delimiter(b"a,b,c;d"), b',');
    assert_eq!(detect_delimiter(b"a;b,c"), b',');
    assert_eq!(detect_delimiter(b"single"), b',');
}

#[test]
fn test_export_loads_with_malformed_row_skipped() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = write_export(
        dir.path(),
        "consumidor_2025-04.csv",
        &[
            export_row("SP", "São Paulo", "Nubank"),
            format!("{};extra", export_row("SP", "Santos", "Vivo")),
            export_row("RJ", "Niterói", "Claro"),
        ],
    );

    let batch = Loader::new().load(&path)?;
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 14);
    assert_eq!(batch.schema().field(0).name(), "Região");
    Ok(())
}

#[test]
fn test_latin1_export_is_decoded() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.csv");
    // "Região;Cidade" / "Sudeste;São Paulo" in ISO-8859-1
    let mut bytes = b"Regi\xe3o;Cidade\n".to_vec();
    bytes.extend_from_slice(b"Sudeste;S\xe3o Paulo\n");
    fs::write(&path, bytes).unwrap();

    let batch = Loader::new().load(&path)?;
    assert_eq!(batch.schema().field(0).name(), "Região");
    let cities = complaint_medallion::utils::arrow::string_column(&batch, "Cidade")?.unwrap();
    assert_eq!(cities.value(0), "São Paulo");
    Ok(())
}

#[test]
fn test_missing_file_is_not_found() {
    let result = Loader::new().load(std::path::Path::new("/nonexistent/export.csv"));
    assert!(matches!(result, Err(PipelineError::NotFound { .. })));
}

#[test]
fn test_every_alias_variant_is_flagged() -> Result<()> {
    let batch = text_batch(&[(
        "Nome Fantasia",
        vec![
            Some("Banco Agibank"),
            Some("banco agibank (agiplan)"),
            Some("AGIBANK S.A."),
            Some("Agi Bank Digital"),
            Some("Nubank"),
            None,
        ],
    )]);

    let matcher = EntityMatcher::new(EntityConfig::default());
    let flagged = matcher.flag(&batch)?;
    assert_eq!(count_true(&flagged, "is_agibank"), 4);
    Ok(())
}

#[test]
fn test_annotation_and_file_month() -> Result<()> {
    assert_eq!(extract_file_month("consumidor_202503.csv"), "03/2025");
    assert_eq!(extract_file_month("dump_final.csv"), UNKNOWN_FILE_MONTH);

    let batch = text_batch(&[("Cidade", vec![Some("Campinas"), Some("Santos")])]);
    let path = std::path::Path::new("raw/consumidor_2025-07.csv");
    let annotated = MetadataAnnotator::default().annotate(&batch, path, DataSource::ConsumidorGov)?;

    let months = complaint_medallion::utils::arrow::string_column(&annotated, "file_month")?.unwrap();
    assert_eq!(months.value(1), "07/2025");
    let origins = complaint_medallion::utils::arrow::string_column(&annotated, "file_origin")?.unwrap();
    assert_eq!(origins.value(0), "consumidor_2025-07.csv");
    assert_eq!(count_true(&annotated, "is_agibank"), 0);
    Ok(())
}

#[test]
fn test_gate_scores_and_dedup_keeps_first() -> Result<()> {
    let batch = text_batch(&[
        ("a", vec![Some("x"), Some("x"), Some("y")]),
        ("b", vec![None, None, Some("z")]),
    ]);
    let gate = QualityGate::new(QualityThresholds {
        max_null_fraction: 0.3,
        min_row_count: 10,
    });

    // too few rows, nulls in b, one duplicate
    let (scored, issues) = gate.evaluate(&batch, "f.csv")?;
    assert_eq!(issues.len(), 3);
    assert!((quality_score(issues.len()) - 0.7).abs() < 1e-9);
    assert_eq!(scored.num_rows(), 3);

    let deduped = deduplicate(&scored, "file")?;
    assert_eq!(deduped.removed, 1);
    assert_eq!(deduped.batch.num_rows(), 2);
    Ok(())
}

#[test]
fn test_unbalanced_quote_keeps_following_rows() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quoted.csv");
    fs::write(&path, "cidade;empresa\nSantos;\"Vivo\nCampinas;Claro\nNiterói;Oi\n").unwrap();

    let batch = Loader::new().load(&path)?;
    assert_eq!(batch.num_rows(), 3);
    let cities = complaint_medallion::utils::arrow::string_column(&batch, "cidade")?.unwrap();
    assert_eq!(cities.value(2), "Niterói");
    Ok(())
}

#[test]
fn test_same_complaint_in_two_exports_is_kept_once() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let shared = export_row("SP", "Campinas", "Vivo");
    write_export(
        dir.path(),
        "consumidor_2025-01.csv",
        &[shared.clone(), export_row("SP", "Santos", "Claro")],
    );
    write_export(
        dir.path(),
        "consumidor_2025-02.csv",
        &[shared, export_row("SP", "Sorocaba", "Oi")],
    );
    let mut config = utils::test_config(dir.path());
    config.quality.min_row_count = 1;

    let report = complaint_medallion::BronzeStage::new(&config).run()?;
    assert_eq!(report.rows_concatenated, 4);
    assert_eq!(report.corpus_duplicates, 1);
    assert_eq!(report.rows, 3);
    Ok(())
}
