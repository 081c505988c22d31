//! Student Outcome Pipeline - Main Entry Point
//!
//! Validates tabular uploads against the model's feature schema, predicts
//! Dropout/Graduate per row and writes result tables with label summaries.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use student_outcome_pipeline::{
    batch::{process_uploads, BatchOptions, FileOutcome},
    config::{AppConfig, LoggingConfig},
    io::{demo_table, write_result_table, write_template, Delimiter},
    metrics::PipelineMetrics,
    models::{Classifier, ModelLoader},
    pipeline::PredictionPipeline,
};
use tracing::info;

const USAGE: &str = "usage: student-outcome <predict <input>... | template [path] | demo | schema>";

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("student_outcome_pipeline={}", logging.level).parse()?)
        .add_directive(format!("student_outcome={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::from(2));
    };

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;
    info!(
        model = %config.model.path,
        policy = ?config.validation.column_policy,
        threshold = config.validation.decision_threshold,
        "Configuration loaded"
    );

    // Load the model once; every request borrows it
    let model = ModelLoader::with_threads(config.model.onnx_threads)
        .load(&config.model)
        .with_context(|| format!("Failed to load model from {}", config.model.path))?;

    let pipeline = PredictionPipeline::from_config(&*model, &config.validation)?;
    info!(
        model = %model.name(),
        features = pipeline.schema().len(),
        source = ?pipeline.schema_source(),
        "Pipeline ready"
    );

    let delimiter = Delimiter::parse(&config.io.delimiter)?;

    match command {
        "predict" => {
            let inputs: Vec<PathBuf> = args[2..].iter().map(PathBuf::from).collect();
            if inputs.is_empty() {
                eprintln!("{}", USAGE);
                return Ok(ExitCode::from(2));
            }
            predict(&pipeline, &config, &inputs)
        }
        "template" => {
            let out = delimiter.for_output();
            match args.get(2) {
                Some(path) => {
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path))?;
                    write_template(file, pipeline.schema(), out)?;
                    info!(path = %path, columns = pipeline.schema().len(), "Template written");
                }
                None => write_template(std::io::stdout().lock(), pipeline.schema(), out)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        "demo" => {
            let output = pipeline.run(&demo_table(pipeline.schema()))?;
            write_result_table(
                std::io::stdout().lock(),
                &output.result_table,
                delimiter.for_output(),
                config.io.include_dropout_probability,
            )?;
            info!(summary = ?output.summary, "Demo prediction complete");
            Ok(ExitCode::SUCCESS)
        }
        "schema" => {
            for (i, name) in pipeline.schema().template_columns().iter().enumerate() {
                println!("{:>2}  {}", i, name);
            }
            if pipeline.schema().is_count_only() {
                info!("Model records no feature names; columns are validated by count only");
            }
            Ok(ExitCode::SUCCESS)
        }
        other => {
            eprintln!("unknown command {:?}\n{}", other, USAGE);
            Ok(ExitCode::from(2))
        }
    }
}

/// Process each upload as an independent request.
fn predict(pipeline: &PredictionPipeline<'_>, config: &AppConfig, inputs: &[PathBuf]) -> Result<ExitCode> {
    let options = BatchOptions::from_config(&config.io)?;
    let metrics = PipelineMetrics::new();

    let outcomes = process_uploads(pipeline, inputs, &options, &metrics);
    metrics.print_summary();

    if outcomes.iter().all(FileOutcome::is_ok) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
