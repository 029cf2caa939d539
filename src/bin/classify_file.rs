// src/bin/classify_file.rs
//
// Classify a local dataset without going through the service.
//
//   classify_file <INPUT.json|INPUT.parquet> <SURVEY_COLUMN> <REGION_COLUMN> [OUTPUT]
//
// JSON output goes to stdout when OUTPUT is omitted; Parquet output defaults to
// `<INPUT stem>_strata.parquet` next to the input.
use anyhow::{bail, Context, Result};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    env,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};
use strata_period::{classify, classify_batch, dataset, telemetry, MethodConfig, StrataColumns};
use tracing::info;

const DEFAULT_VALUE_COLUMN: &str = "Q608_total";
const DEFAULT_STRATA_COLUMN: &str = "strata";

fn load_config() -> Result<MethodConfig> {
    MethodConfig::from_lookup(|key| {
        env::var(key).ok().or_else(|| match key {
            "value_column" => Some(DEFAULT_VALUE_COLUMN.to_string()),
            "strata_column" => Some(DEFAULT_STRATA_COLUMN.to_string()),
            _ => None,
        })
    })
    .map_err(Into::into)
}

/// Classify a records/columns JSON file; returns the encoded records.
fn classify_json_file(input: &Path, columns: &StrataColumns) -> Result<String> {
    let payload = fs::read_to_string(input)
        .with_context(|| format!("failed to read `{}`", input.display()))?;
    let rows = dataset::decode(&payload)
        .with_context(|| format!("failed to decode `{}`", input.display()))?;
    let classified = classify(&rows, columns)?;
    info!(rows = classified.len(), "classified {}", input.display());
    Ok(dataset::encode(&classified)?)
}

/// Stream a Parquet file through `classify_batch`; returns rows written.
fn classify_parquet_file(input: &Path, output: &Path, columns: &StrataColumns) -> Result<usize> {
    let file =
        File::open(input).with_context(|| format!("failed to open `{}`", input.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).with_context(|| {
        format!(
            "failed to create RecordBatchReaderBuilder for `{}`",
            input.display()
        )
    })?;

    let out_schema = classify_batch(&RecordBatch::new_empty(builder.schema().clone()), columns)?
        .schema();
    let mut reader = builder
        .with_batch_size(8192)
        .build()
        .with_context(|| format!("failed to build RecordBatchReader for `{}`", input.display()))?;

    let out_file = File::create(output)
        .with_context(|| format!("could not create `{}`", output.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(out_file), out_schema, Some(props))
        .context("creating ArrowWriter for classified output")?;

    let mut rows = 0;
    while let Some(batch) = reader
        .next()
        .transpose()
        .with_context(|| format!("error reading RecordBatch from `{}`", input.display()))?
    {
        let classified = classify_batch(&batch, columns)
            .with_context(|| format!("classifying batch at row {}", rows))?;
        rows += classified.num_rows();
        writer.write(&classified).context("writing classified batch")?;
    }
    writer.close().context("closing classified output")?;
    Ok(rows)
}

fn default_parquet_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_strata.parquet", stem))
}

struct CliArgs {
    input: PathBuf,
    survey_column: String,
    region_column: String,
    output: Option<PathBuf>,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self> {
        if args.len() < 4 || args.len() > 5 {
            bail!(
                "Usage: {} <INPUT.json|INPUT.parquet> <SURVEY_COLUMN> <REGION_COLUMN> [OUTPUT]",
                args.first().map(String::as_str).unwrap_or("classify_file")
            );
        }
        Ok(Self {
            input: PathBuf::from(&args[1]),
            survey_column: args[2].clone(),
            region_column: args[3].clone(),
            output: args.get(4).map(PathBuf::from),
        })
    }
}

fn main() -> Result<()> {
    telemetry::init_logging();

    let args: Vec<String> = env::args().collect();
    let cli = CliArgs::parse(&args)?;
    let input = cli.input;
    let config = load_config()?;
    let columns = config.columns(&cli.survey_column, &cli.region_column);
    let output = cli.output;

    let start = Instant::now();
    let is_parquet = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));

    if is_parquet {
        let output = output.unwrap_or_else(|| default_parquet_output(&input));
        let rows = classify_parquet_file(&input, &output, &columns)?;
        info!(rows, elapsed = ?start.elapsed(), "wrote {}", output.display());
    } else {
        let encoded = classify_json_file(&input, &columns)?;
        match output {
            Some(path) => {
                fs::write(&path, encoded)
                    .with_context(|| format!("could not write `{}`", path.display()))?;
                info!(elapsed = ?start.elapsed(), "wrote {}", path.display());
            }
            None => println!("{}", encoded),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::{tempdir, NamedTempFile};

    fn cols() -> StrataColumns {
        StrataColumns::new("Q608_total", "survey", "region", "strata")
    }

    #[test]
    fn test_cli_args_usage_without_argv() {
        let err = CliArgs::parse(&[]).err().expect("usage error");
        assert!(err.to_string().starts_with("Usage: classify_file "));

        let args: Vec<String> = ["classify_file", "in.json", "survey", "region"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cli = CliArgs::parse(&args).unwrap();
        assert_eq!(cli.input, PathBuf::from("in.json"));
        assert_eq!(cli.survey_column, "survey");
        assert_eq!(cli.region_column, "region");
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_default_parquet_output_name() {
        assert_eq!(
            default_parquet_output(Path::new("/data/responses.parquet")),
            PathBuf::from("/data/responses_strata.parquet")
        );
    }

    #[test]
    fn test_classify_json_file() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            r#"[{{"responder_id": 1, "Q608_total": 90000, "survey": "066", "region": 5}},
                {{"responder_id": 2, "Q608_total": 90000, "survey": "999", "region": 5}}]"#
        )?;
        let encoded = classify_json_file(tmp.path(), &cols())?;
        let rows = dataset::decode(&encoded)?;
        assert_eq!(rows[0]["strata"], "C");
        assert_eq!(rows[1]["strata"], "");
        Ok(())
    }

    #[test]
    fn test_classify_parquet_file() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("responses.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("Q608_total", DataType::Float64, true),
            Field::new("survey", DataType::Utf8, true),
            Field::new("region", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![Some(250000.0), None, Some(50000.0)])),
                Arc::new(StringArray::from(vec!["066", "066", "076"])),
                Arc::new(Int64Array::from(vec![15, 5, 5])),
            ],
        )?;
        let mut writer = ArrowWriter::try_new(File::create(&input)?, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        let output = default_parquet_output(&input);
        assert_eq!(output, dir.path().join("responses_strata.parquet"));
        let rows = classify_parquet_file(&input, &output, &cols())?;
        assert_eq!(rows, 3);

        let mut reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&output)?)?.build()?;
        let out = reader.next().transpose()?.expect("one batch");
        let strata = out
            .column_by_name("strata")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let got: Vec<&str> = strata.iter().map(|s| s.unwrap()).collect();
        assert_eq!(got, vec!["A", "", "M"]);
        Ok(())
    }
}
