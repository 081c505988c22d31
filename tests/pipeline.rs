//! End-to-end tests over the public API with the logistic backend.

use approx::assert_relative_eq;
use std::path::PathBuf;
use student_outcome_pipeline::config::{ModelConfig, ModelFormat};
use student_outcome_pipeline::io::{demo_table, read_table, write_result_table, write_template};
use student_outcome_pipeline::models::{Classifier, LogisticClassifier, ModelLoader};
use student_outcome_pipeline::schema::SchemaSource;
use student_outcome_pipeline::{
    summarize, AppConfig, ColumnPolicy, FeatureSchema, Outcome, PipelineError, PredictionPipeline,
    RawTable, SchemaMismatch, STUDENT_FEATURES,
};

fn manifest_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn shipped_model() -> Box<dyn Classifier> {
    let config = ModelConfig {
        path: manifest_path("models/dropout_logistic.json").display().to_string(),
        format: ModelFormat::Auto,
        ..ModelConfig::default()
    };
    ModelLoader::new().load(&config).unwrap()
}

fn feature_names() -> Vec<String> {
    STUDENT_FEATURES.iter().map(|s| s.to_string()).collect()
}

/// Three varied, fully numeric student rows in schema order.
fn students() -> RawTable {
    let mut rows = Vec::new();
    for seed in 0..3 {
        let row: Vec<String> = (0..36)
            .map(|col| ((col * 7 + seed * 13) % 11).to_string())
            .collect();
        rows.push(row);
    }
    RawTable::from_records(feature_names(), rows)
}

fn blank_cells(table: &RawTable, cells: &[(usize, usize)]) -> RawTable {
    let rows: Vec<Vec<String>> = (0..table.row_count())
        .map(|r| {
            (0..table.column_count())
                .map(|c| {
                    if cells.contains(&(r, c)) {
                        String::new()
                    } else {
                        table.cell(r, c).unwrap_or_default().to_string()
                    }
                })
                .collect()
        })
        .collect();
    RawTable::from_records(table.columns().to_vec(), rows)
}

fn without_columns(table: &RawTable, removed: &[usize]) -> RawTable {
    let keep: Vec<usize> = (0..table.column_count()).filter(|c| !removed.contains(c)).collect();
    table.reordered(&keep)
}

#[test]
fn test_shipped_config_and_model_load() {
    let config = AppConfig::load_from_path(manifest_path("config/config.toml")).unwrap();
    assert_eq!(config.validation.column_policy, ColumnPolicy::DropExtras);

    let model = shipped_model();
    assert_eq!(model.feature_count(), Some(36));

    let pipeline = PredictionPipeline::from_config(&*model, &config.validation).unwrap();
    assert_eq!(pipeline.schema_source(), SchemaSource::ModelNames);
    assert_eq!(pipeline.schema(), &FeatureSchema::builtin());
}

#[test]
fn test_demo_row_predicts_one_row() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();

    let output = pipeline.run(&demo_table(pipeline.schema())).unwrap();

    assert_eq!(output.result_table.row_count(), 1);
    let p = output.result_table.predictions()[0];
    assert_relative_eq!(p.dropout_probability + p.graduate_probability, 1.0, epsilon = 1e-6);
    assert_eq!(output.summary.total(), 1);
}

#[test]
fn test_template_round_trip_validates_columns() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::StrictColumns, 0.5).unwrap();

    let mut template = Vec::new();
    write_template(&mut template, pipeline.schema(), b',').unwrap();
    let read_back = read_table(&template, b',').unwrap();
    assert_eq!(read_back.columns(), pipeline.schema().names().unwrap());

    // Header only: columns pass, then the empty body is rejected
    let err = pipeline.run(&read_back).unwrap_err();
    assert!(matches!(err, PipelineError::Input(_)));

    let mut filled = String::from_utf8(template).unwrap();
    for r in 0..4 {
        let row: Vec<String> = (0..36).map(|c| format!("{}.5", (c + r) % 9)).collect();
        filled.push_str(&row.join(","));
        filled.push('\n');
    }
    let output = pipeline.run(&read_table(filled.as_bytes(), b',').unwrap()).unwrap();
    assert_eq!(output.result_table.row_count(), 4);
    assert_eq!(output.result_table.features().columns(), pipeline.schema().names().unwrap());
}

#[test]
fn test_column_order_does_not_change_predictions() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::StrictColumns, 0.5).unwrap();
    let table = students();

    let expected = pipeline.run(&table).unwrap();

    let reversed: Vec<usize> = (0..36).rev().collect();
    let rotated: Vec<usize> = (0..36).map(|c| (c + 11) % 36).collect();
    for order in [reversed, rotated] {
        let shuffled = table.reordered(&order);
        let output = pipeline.run(&shuffled).unwrap();
        assert_eq!(output.result_table, expected.result_table);
    }
}

#[test]
fn test_removed_columns_are_reported_exactly() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();
    let table = students();

    let removals: [&[usize]; 5] = [&[0], &[35], &[7, 15], &[1, 2, 3], &[5, 12, 20, 30, 33]];
    for removed in removals {
        let err = pipeline.run(&without_columns(&table, removed)).unwrap_err();
        let expected: Vec<String> = removed.iter().map(|&c| STUDENT_FEATURES[c].to_string()).collect();

        match err {
            PipelineError::SchemaMismatch(SchemaMismatch::Columns {
                missing,
                unexpected,
            }) => {
                assert_eq!(missing, expected);
                assert!(unexpected.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn test_nulls_reported_for_exactly_affected_columns() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();

    // Columns 2, 9 and 30, with two cells blanked in column 9
    let table = blank_cells(&students(), &[(0, 2), (1, 9), (2, 9), (1, 30)]);
    let err = pipeline.run(&table).unwrap_err();

    assert_eq!(
        err.missing_columns(),
        vec![STUDENT_FEATURES[2], STUDENT_FEATURES[9], STUDENT_FEATURES[30]]
    );
    match err {
        PipelineError::MissingValue { columns } => assert_eq!(columns[1].count, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_null_tokens_count_as_missing() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();
    let table = students();

    for token in ["NA", "NaN", "null", "None", "  "] {
        let mut rows: Vec<Vec<String>> = (0..table.row_count())
            .map(|r| (0..36).map(|c| table.cell(r, c).unwrap_or_default().to_string()).collect())
            .collect();
        rows[1][4] = token.to_string();
        let err = pipeline.run(&RawTable::from_records(feature_names(), rows)).unwrap_err();
        assert_eq!(err.missing_columns(), vec![STUDENT_FEATURES[4]]);
    }
}

#[test]
fn test_non_numeric_cell_names_column_row_and_value() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();

    let mut text = STUDENT_FEATURES.join(";");
    text.push('\n');
    for r in 0..2 {
        let mut row: Vec<String> = (0..36).map(|c| ((c + r) % 5).to_string()).collect();
        if r == 1 {
            row[19] = "twenty".to_string();
        }
        text.push_str(&row.join(";"));
        text.push('\n');
    }

    let table = read_table(text.as_bytes(), b';').unwrap();
    match pipeline.run(&table).unwrap_err() {
        PipelineError::TypeCoercion { column, row, value } => {
            assert_eq!(column, "Age at enrollment");
            assert_eq!(row, 2);
            assert_eq!(value, "twenty");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_extra_columns_follow_policy() {
    let model = shipped_model();
    let mut columns = feature_names();
    columns.insert(0, "Student ID".to_string());
    columns.push("Target".to_string());
    let rows: Vec<Vec<String>> = (0..2)
        .map(|r| {
            let mut row = vec![format!("s{}", r)];
            row.extend((0..36).map(|c| (c % 3).to_string()));
            row.push("Dropout".to_string());
            row
        })
        .collect();
    let table = RawTable::from_records(columns, rows);

    let lenient = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();
    let output = lenient.run(&table).unwrap();
    assert_eq!(output.dropped_columns, vec!["Student ID", "Target"]);
    assert_eq!(output.result_table.features().columns(), feature_names().as_slice());

    let strict = PredictionPipeline::new(&*model, ColumnPolicy::StrictColumns, 0.5).unwrap();
    assert!(matches!(
        strict.run(&table).unwrap_err(),
        PipelineError::SchemaMismatch(SchemaMismatch::Unexpected(_))
    ));
}

#[test]
fn test_count_only_model_validates_width() {
    let model = LogisticClassifier::new("unnamed", vec![0.1; 36], 0.0);
    let pipeline = PredictionPipeline::new(&model, ColumnPolicy::DropExtras, 0.5).unwrap();
    assert_eq!(pipeline.schema_source(), SchemaSource::ModelCount);

    // Names are irrelevant, only the count is checked
    let columns: Vec<String> = (0..36).map(|i| format!("col{}", i)).collect();
    let table = RawTable::from_records(columns, [vec!["1"; 36]]);
    assert_eq!(pipeline.run(&table).unwrap().result_table.row_count(), 1);

    let narrow = without_columns(&table, &[3]);
    assert!(matches!(
        pipeline.run(&narrow).unwrap_err(),
        PipelineError::SchemaMismatch(SchemaMismatch::Count { expected: 36, actual: 35 })
    ));
}

#[test]
fn test_predictions_are_deterministic_and_summary_conserves_rows() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();
    let table = students();

    let first = pipeline.run(&table).unwrap();
    let second = pipeline.run(&table).unwrap();
    assert_eq!(first.result_table, second.result_table);

    let summary = summarize(&first.result_table);
    assert_eq!(summary, first.summary);
    assert_eq!(summary.get(Outcome::Dropout) + summary.get(Outcome::Graduate), table.row_count());

    for p in first.result_table.predictions() {
        assert_eq!(p.outcome == Outcome::Graduate, p.graduate_probability > 0.5);
    }
}

#[test]
fn test_file_round_trip() {
    let model = shipped_model();
    let pipeline = PredictionPipeline::new(&*model, ColumnPolicy::DropExtras, 0.5).unwrap();
    let output = pipeline.run(&students()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    let file = std::fs::File::create(&path).unwrap();
    write_result_table(file, &output.result_table, b',', false).unwrap();

    let written = read_table(&std::fs::read(&path).unwrap(), b',').unwrap();
    assert_eq!(written.row_count(), 3);
    assert_eq!(written.column_count(), 36 + 3);
    assert_eq!(written.columns()[36], "prediction");
    assert_eq!(written.columns()[38], "graduate_probability");

    for (r, p) in output.result_table.predictions().iter().enumerate() {
        assert_eq!(written.cell(r, 36), Some(p.class_index().to_string().as_str()));
        assert_eq!(written.cell(r, 37), Some(p.label()));
    }
}

#[test]
fn test_model_fitted_on_tab_suffixed_header_scores_uploads() {
    let model = LogisticClassifier::new("m", vec![0.5, -0.5], 0.0)
        .with_feature_names(vec!["a\t".to_string(), "b".to_string()]);
    let pipeline = PredictionPipeline::new(&model, ColumnPolicy::StrictColumns, 0.5).unwrap();
    assert_eq!(pipeline.schema().names().unwrap(), &["a".to_string(), "b".to_string()]);

    for header in [["a\t", "b"], ["a", "b"], ["b", "a\t"]] {
        let values = if header[0] == "b" { ["2", "1"] } else { ["1", "2"] };
        let table = RawTable::from_records(header, [values]);

        let output = pipeline.run(&table).unwrap();
        let p = output.result_table.predictions()[0];
        assert_relative_eq!(p.graduate_probability, 1.0 / (1.0 + 0.5f64.exp()), epsilon = 1e-9);
        assert_eq!(p.outcome, Outcome::Dropout);
    }
}
