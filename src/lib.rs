pub mod config;
pub mod dataset;
pub mod error;
pub mod handler;
pub mod strata;
pub mod telemetry;

pub use config::MethodConfig;
pub use error::{ConfigError, DatasetError, FieldError, MethodError, StrataError};
pub use handler::{handle_with, lambda_handler, MethodResponse};
pub use strata::{calculate_strata, classify, classify_batch, Record, Strata, StrataColumns};
