// src/error.rs

use thiserror::Error;

/// Failure to read one of the columns a rule needs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    /// The column is absent from the record (or batch).
    #[error("missing field '{0}'")]
    MissingField(String),
    /// The column is present but cannot be compared against a threshold.
    #[error("field '{column}' is not numeric: {found}")]
    NotNumeric { column: String, found: String },
}

/// A [`FieldError`] located at a row of the dataset being classified.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("row {row}: {source}")]
pub struct StrataError {
    pub row: usize,
    #[source]
    pub source: FieldError,
}

impl StrataError {
    pub fn is_missing_field(&self) -> bool {
        matches!(self.source, FieldError::MissingField(_))
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported dataset shape: {0}")]
    Shape(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Error validating environment parameters: missing {0}")]
    Invalid(String),
}

/// Failure categories reported back to the caller of the method.
#[derive(Debug, Error)]
pub enum MethodError {
    /// Bad configuration or an undecodable payload.
    #[error("{0}")]
    Input(String),
    /// A key the method looked up was not there.
    #[error("{0}")]
    Key(String),
    #[error("{detail}")]
    General { kind: &'static str, detail: String },
}

impl MethodError {
    /// Render the message carried in a failed response.
    pub fn response_message(&self, module: &str, request_id: &str) -> String {
        match self {
            MethodError::Input(detail) => {
                format!("Input Error in {module} |- {detail} | Request ID: {request_id}")
            }
            MethodError::Key(detail) => {
                format!("Key Error in {module} |- {detail} | Request ID: {request_id}")
            }
            MethodError::General { kind, detail } => format!(
                "General Error in {module} ({kind}) |- {detail} | Request ID: {request_id}"
            ),
        }
    }
}

impl From<ConfigError> for MethodError {
    fn from(err: ConfigError) -> Self {
        MethodError::Input(err.to_string())
    }
}

impl From<StrataError> for MethodError {
    fn from(err: StrataError) -> Self {
        match err.source {
            FieldError::MissingField(_) => MethodError::Key(err.to_string()),
            FieldError::NotNumeric { .. } => MethodError::General {
                kind: "NotNumeric",
                detail: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_maps_to_key_error() {
        let err = StrataError {
            row: 3,
            source: FieldError::MissingField("region".into()),
        };
        assert!(err.is_missing_field());
        let msg = MethodError::from(err).response_message("Strata - Method", "abc");
        assert_eq!(
            msg,
            "Key Error in Strata - Method |- row 3: missing field 'region' | Request ID: abc"
        );
    }

    #[test]
    fn not_numeric_maps_to_general_error() {
        let err = StrataError {
            row: 0,
            source: FieldError::NotNumeric {
                column: "Q608_total".into(),
                found: "\"lots\"".into(),
            },
        };
        assert!(!err.is_missing_field());
        let msg = MethodError::from(err).response_message("Strata - Method", "r-1");
        assert!(msg.starts_with("General Error in Strata - Method (NotNumeric) |- row 0:"));
        assert!(msg.ends_with("| Request ID: r-1"));
    }

    #[test]
    fn config_error_is_input_error() {
        let err = ConfigError::Invalid("value_column".into());
        let msg = MethodError::from(err).response_message("Strata - Method", "id");
        assert_eq!(
            msg,
            "Input Error in Strata - Method |- Error validating environment parameters: \
             missing value_column | Request ID: id"
        );
    }
}
