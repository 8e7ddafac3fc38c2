mod utils;

use complaint_medallion::{Loader, Result, run_all};
use utils::{count_true, export_row, test_config, write_export};

/// Three monthly exports, each with one over-long row
fn write_corpus(dir: &std::path::Path) {
    let itau = export_row("SP", "São Paulo", "Itaú");
    let santos = export_row("SP", "Santos", "Bradesco");
    write_export(
        dir,
        "consumidor_2025-01.csv",
        &[
            export_row("SP", "São Paulo", "Nubank"),
            itau.clone(),
            export_row("SP", "Campinas", "Vivo"),
            export_row("RJ", "Rio de Janeiro", "Claro"),
            itau,
            format!("{santos};sobra"),
            santos,
        ],
    );
    write_export(
        dir,
        "consumidor_2025-02.csv",
        &[
            export_row("SP", "São Paulo", "AGIBANK S.A."),
            export_row("SP", "Campinas", "AGIBANK S.A."),
            format!("{};sobra", export_row("SP", "Campinas", "Inter")),
            export_row("SP", "São Paulo", "Nubank"),
            export_row("MG", "Belo Horizonte", "Inter"),
            export_row("SP", "Campinas", "Vivo"),
        ],
    );
    write_export(
        dir,
        "consumidor_2025-03.csv",
        &[
            export_row("SP", "São Paulo", "Vivo"),
            format!("{};sobra", export_row("SP", "Santos", "Vivo")),
            export_row("SP", "Cafel?ndia", "Nubank"),
            export_row("RJ", "Niterói", "Claro"),
        ],
    );
}

#[test]
fn test_bronze_combines_files_and_flags_entity() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let mut config = test_config(dir.path());
    config.quality.min_row_count = 5;

    let report = complaint_medallion::BronzeStage::new(&config).run()?;

    assert_eq!(report.files_processed(), 3);
    // 6 + 5 + 3 valid rows, one in-file duplicate removed
    assert_eq!(report.rows_concatenated, 13);
    // Nubank/São Paulo and Vivo/Campinas are exported in both January and February
    assert_eq!(report.corpus_duplicates, 2);
    assert_eq!(report.rows, 11);
    assert_eq!(report.entity_rows, 2);
    assert_eq!(report.issues.len(), 2);
    assert!(
        report
            .issues
            .iter()
            .any(|i| i.file == "consumidor_2025-03.csv" && i.description.starts_with("Too few rows"))
    );
    assert!(
        report
            .issues
            .iter()
            .any(|i| i.file == "consumidor_2025-01.csv" && i.description.contains("duplicate"))
    );

    let bronze = Loader::new().load(&config.paths.bronze_output())?;
    assert_eq!(bronze.num_rows(), 11);
    let origins = complaint_medallion::utils::arrow::string_column(&bronze, "file_origin")?.unwrap();
    let from_january = origins
        .iter()
        .filter(|o| *o == Some("consumidor_2025-01.csv"))
        .count();
    // the first export keeps its copy of each repeated complaint
    assert_eq!(from_january, 5);
    assert_eq!(count_true(&bronze, "is_agibank"), 2);
    Ok(())
}

#[test]
fn test_full_run_writes_every_layer() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let mut config = test_config(dir.path());
    config.quality.min_row_count = 5;
    config.region.low_frequency_threshold = 1;

    let report = run_all(&config)?;

    assert_eq!(report.bronze.rows, 11);
    assert_eq!(report.silver.rows_in, 11);
    assert_eq!(report.silver.rows_out, 11);
    assert!(report.silver.dropped_columns.contains(&"Gestor".to_string()));
    assert_eq!(report.silver.entity_rows, 2);

    // Timestamps written by bronze parse back in silver
    for column in ["processed_at", "data_abertura"] {
        let conversion = report
            .silver
            .conversions
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, conversion)| conversion.clone())
            .unwrap();
        let stats = conversion.stats().unwrap();
        assert_eq!(stats.rows_before, 11, "{column}");
        assert_eq!(stats.rows_after, 11, "{column}");
        assert!((stats.success_rate - 100.0).abs() < 1e-9, "{column}");
    }

    // SP rows: 4 + 2 + 2; Santos and Cafelândia occur once each
    assert_eq!(report.gold.region_rows, 8);
    assert_eq!(report.gold.curated_rows, 6);
    assert_eq!(report.gold.cities_after, 2);
    assert_eq!(report.gold.entity_rows, 2);

    let gold_dir = &config.paths.gold_dir;
    for name in [
        "sp_consumidor_completo_v1.csv",
        "sp_ranking_cidades_v1.csv",
        "sp_analise_etaria_v1.csv",
        "sp_agibank_only_v1.csv",
    ] {
        assert!(gold_dir.join(name).exists(), "missing {name}");
    }

    let silver = Loader::new().load(&config.paths.silver_output())?;
    let names = utils::column_names(&silver);
    assert!(names.contains(&"nome_fantasia".to_string()));
    assert!(names.contains(&"avaliacao_reclamacao".to_string()));
    assert!(!names.iter().any(|n| n == "gestor"));

    let ranking = Loader::new().load(&gold_dir.join("sp_ranking_cidades_v1.csv"))?;
    assert_eq!(ranking.num_rows(), 2);
    let cities = complaint_medallion::utils::arrow::string_column(&ranking, "cidade")?.unwrap();
    assert_eq!(cities.value(0), "São Paulo");
    Ok(())
}

#[test]
fn test_missing_inputs_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    assert!(run_all(&config).is_err());
}
