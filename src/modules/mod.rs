//! Built-in cleaning modules.
//!
//! Each module is a parameter struct that doubles as its configuration: the
//! pipeline deserializes a step's `params` into it, then calls `process`.

pub mod missing_imputer;
pub mod outlier_detector;
pub mod stopwords;
pub mod text_normalizer;

pub use missing_imputer::{ImputeMethod, MissingImputer};
pub use outlier_detector::{OutlierAction, OutlierDetector, OutlierMethod};
pub use text_normalizer::TextNormalizer;

use crate::core::DataFrame;
use crate::error::CleanError;
use anyhow::Result;
use serde::de::DeserializeOwned;

/// Deserialize a step's parameters, treating `null` as "all defaults".
pub(crate) fn parse_params<T: DeserializeOwned>(module: &str, params: serde_json::Value) -> Result<T> {
    let params = match params {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| CleanError::invalid_params(module, e).into())
}

/// Fail with `ColumnsNotFound` unless every name is present.
pub(crate) fn require_columns<S: AsRef<str>>(df: &DataFrame, names: &[S]) -> Result<()> {
    let missing = df.missing_columns(names);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CleanError::ColumnsNotFound(missing).into())
    }
}

/// Column lists may be given as a single name or a list of names.
pub(crate) mod columns {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    impl From<OneOrMany> for Vec<String> {
        fn from(value: OneOrMany) -> Self {
            match value {
                OneOrMany::One(name) => vec![name],
                OneOrMany::Many(names) => names,
            }
        }
    }

    pub fn list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        OneOrMany::deserialize(deserializer).map(Into::into)
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(Into::into))
    }
}
