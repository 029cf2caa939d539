// src/strata.rs
use crate::error::{FieldError, StrataError};
use anyhow::Result;
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    compute::{cast_with_options, CastOptions},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// One survey response: column name → value, in column order.
pub type Record = Map<String, Value>;

pub const MARINE_SURVEY: &str = "076";
pub const LAND_SURVEY: &str = "066";

/// Strata bucket assigned to a response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strata {
    /// No rule matched, or the value was falsy.
    #[default]
    Unassigned,
    M,
    E,
    D,
    C,
    B1,
    B2,
    A,
}

impl Strata {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strata::Unassigned => "",
            Strata::M => "M",
            Strata::E => "E",
            Strata::D => "D",
            Strata::C => "C",
            Strata::B1 => "B1",
            Strata::B2 => "B2",
            Strata::A => "A",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "" => Some(Strata::Unassigned),
            "M" => Some(Strata::M),
            "E" => Some(Strata::E),
            "D" => Some(Strata::D),
            "C" => Some(Strata::C),
            "B1" => Some(Strata::B1),
            "B2" => Some(Strata::B2),
            "A" => Some(Strata::A),
            _ => None,
        }
    }
}

/// Names of the columns holding each role in a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrataColumns {
    pub value: String,
    pub survey: String,
    pub region: String,
    pub strata: String,
}

impl StrataColumns {
    pub fn new(
        value: impl Into<String>,
        survey: impl Into<String>,
        region: impl Into<String>,
        strata: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            survey: survey.into(),
            region: region.into(),
            strata: strata.into(),
        }
    }
}

/// Falsiness of a decoded cell: null, zero, false and empty values are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// The rule table. Every rule is checked and a later match overwrites an
/// earlier one; `amount` and `region` are only read when a rule needs them.
fn cascade<V, R>(survey: Option<&str>, amount: V, region: R) -> Result<Strata, FieldError>
where
    V: Fn() -> Result<f64, FieldError>,
    R: Fn() -> Result<f64, FieldError>,
{
    let is = |code: &str| survey == Some(code);
    let mut strata = Strata::Unassigned;

    if is(MARINE_SURVEY) {
        strata = Strata::M;
    }
    if is(LAND_SURVEY) && amount()? < 30000.0 {
        strata = Strata::E;
    }
    if is(LAND_SURVEY) && amount()? > 29999.0 {
        strata = Strata::D;
    }
    if is(LAND_SURVEY) && amount()? > 79999.0 {
        strata = Strata::C;
    }
    if is(LAND_SURVEY) && amount()? > 129999.0 && region()? > 9.0 {
        strata = Strata::B2;
    }
    if is(LAND_SURVEY) && amount()? > 129999.0 && region()? < 10.0 {
        strata = Strata::B1;
    }
    if is(LAND_SURVEY) && amount()? > 200000.0 {
        strata = Strata::A;
    }
    Ok(strata)
}

fn lookup<'a>(row: &'a Record, column: &str) -> Result<&'a Value, FieldError> {
    row.get(column)
        .ok_or_else(|| FieldError::MissingField(column.to_string()))
}

/// Numeric view of a cell. Booleans compare as 0/1; a null cell is NaN, which
/// fails every threshold comparison.
fn as_number(value: &Value, column: &str) -> Result<f64, FieldError> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64().ok_or_else(|| FieldError::NotNumeric {
            column: column.to_string(),
            found: other.to_string(),
        }),
    }
}

/// Strata for a single record.
pub fn calculate_strata(row: &Record, columns: &StrataColumns) -> Result<Strata, FieldError> {
    let value = lookup(row, &columns.value)?;
    if !is_truthy(value) {
        return Ok(Strata::Unassigned);
    }
    let survey = lookup(row, &columns.survey)?.as_str();

    cascade(
        survey,
        || as_number(value, &columns.value),
        || lookup(row, &columns.region).and_then(|r| as_number(r, &columns.region)),
    )
}

/// Classify every record, returning fresh records with the strata column set.
/// Output order matches input order; the first failing row (by position) is reported.
#[instrument(level = "debug", skip_all, fields(rows = rows.len(), strata = %columns.strata))]
pub fn classify(rows: &[Record], columns: &StrataColumns) -> Result<Vec<Record>, StrataError> {
    let results: Vec<Result<Record, StrataError>> = rows
        .par_iter()
        .enumerate()
        .map(|(idx, row)| -> Result<Record, StrataError> {
            let strata =
                calculate_strata(row, columns).map_err(|source| StrataError { row: idx, source })?;
            let mut out = row.clone();
            out.insert(
                columns.strata.clone(),
                Value::String(strata.as_str().to_string()),
            );
            Ok(out)
        })
        .collect();

    let classified = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    debug!(rows = classified.len(), "classified dataset");
    Ok(classified)
}

fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Option<Float64Array>, FieldError> {
    let Some(arr) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cast = cast_with_options(arr, &DataType::Float64, &options).map_err(|e| {
        FieldError::NotNumeric {
            column: name.to_string(),
            found: e.to_string(),
        }
    })?;
    let floats = cast
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| FieldError::NotNumeric {
            column: name.to_string(),
            found: arr.data_type().to_string(),
        })?;
    Ok(Some(floats))
}

/// Columnar variant of [`classify`] over an Arrow batch.
///
/// The value and region columns are cast to `Float64`, the survey column to
/// `Utf8`. The strata column replaces a column of the same name in place, or
/// is appended.
pub fn classify_batch(batch: &RecordBatch, columns: &StrataColumns) -> Result<RecordBatch> {
    let values = numeric_column(batch, &columns.value)?
        .ok_or_else(|| FieldError::MissingField(columns.value.clone()))?;
    let regions = numeric_column(batch, &columns.region)?;

    let survey_arr = batch
        .column_by_name(&columns.survey)
        .ok_or_else(|| FieldError::MissingField(columns.survey.clone()))?;
    let survey_utf8 = arrow::compute::cast(survey_arr, &DataType::Utf8)?;
    let surveys = survey_utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("survey column '{}' did not cast to Utf8", columns.survey))?;

    let mut out: Vec<&'static str> = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let amount = values.is_valid(i).then(|| values.value(i));
        let strata = match amount {
            None => Strata::Unassigned,
            Some(v) if v == 0.0 => Strata::Unassigned,
            Some(v) => {
                let survey = surveys.is_valid(i).then(|| surveys.value(i));
                let region = || match &regions {
                    None => Err(FieldError::MissingField(columns.region.clone())),
                    Some(r) if r.is_null(i) => Ok(f64::NAN),
                    Some(r) => Ok(r.value(i)),
                };
                cascade(survey, || Ok(v), region)
                    .map_err(|source| StrataError { row: i, source })?
            }
        };
        out.push(strata.as_str());
    }
    let strata_arr = Arc::new(StringArray::from(out)) as ArrayRef;

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
    let strata_field = Field::new(&columns.strata, DataType::Utf8, false);
    match schema.index_of(&columns.strata) {
        Ok(idx) => {
            fields[idx] = strata_field;
            arrays[idx] = strata_arr;
        }
        Err(_) => {
            fields.push(strata_field);
            arrays.push(strata_arr);
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Into::into)
}
