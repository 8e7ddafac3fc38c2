#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use complaint_medallion::PipelineConfig;
use complaint_medallion::utils::arrow::bool_column;

/// Header of a Consumidor.gov.br style export
pub const EXPORT_HEADER: &str = "Região;UF;Cidade;Sexo;Faixa Etária;Data Abertura;Nome Fantasia;\
Segmento de Mercado;Área;Problema;Respondida;Tempo Resposta;Avaliação Reclamação;Gestor";

/// One export row with fixed values for the columns the tests don't vary
#[must_use]
pub fn export_row(uf: &str, city: &str, company: &str) -> String {
    format!(
        "Sudeste;{uf};{city};M;entre 31 a 40 anos;15/01/2025;{company};Bancos;\
Bancos, Financeiras e Administradoras de Cartão;Cobrança indevida;S;5;Resolvida;G1"
    )
}

/// Write `lines` under `dir/raw/name`, one per line, after the export header
pub fn write_export(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    let mut content = String::from(EXPORT_HEADER);
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    let path = raw.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Configuration whose inputs and outputs all live under `dir`
#[must_use]
pub fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.raw_glob = format!("{}/raw/*.csv", dir.display());
    config.paths.silver_dir = dir.join("silver");
    config.paths.gold_dir = dir.join("gold");
    config
}

/// Build an all-text batch from `(name, values)` pairs
#[must_use]
pub fn text_batch(columns: &[(&str, Vec<Option<&str>>)]) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(StringArray::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

/// Number of true values in a flag column
#[must_use]
pub fn count_true(batch: &RecordBatch, column: &str) -> usize {
    bool_column(batch, column)
        .unwrap()
        .map_or(0, |flags| flags.into_iter().filter(|f| *f).count())
}

/// Column names of a batch
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}
