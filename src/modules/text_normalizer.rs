use super::{columns, parse_params, require_columns, stopwords};
use crate::core::{CleaningModule, DataFrame, ModuleContext, Value};
use crate::error::CleanError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sheetpilot_macros::CleaningModule;

pub const MODULE_ID: &str = "text_normalizer";

/// Rule-based clean-up of free-text columns
#[derive(CleaningModule, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[module_meta(
    id = "text_normalizer",
    name = "Text Normalizer",
    category = "Cleaning",
    description = "Trim, lowercase, strip punctuation, replace slang and drop stop words"
)]
#[serde(default, deny_unknown_fields)]
pub struct TextNormalizer {
    #[param(kind = "list", required, description = "Text columns to normalize")]
    #[serde(deserialize_with = "columns::list")]
    pub columns: Vec<String>,

    #[param(default = "true")]
    pub lowercase: bool,

    #[param(default = "true")]
    pub remove_punct: bool,

    #[param(default = "false")]
    pub remove_stopwords: bool,

    /// Literal replacements applied in insertion order
    #[param(kind = "object", description = "Map of slang term to replacement")]
    #[serde(with = "ordered_pairs")]
    pub slang_dict: Vec<(String, String)>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            lowercase: true,
            remove_punct: true,
            remove_stopwords: false,
            slang_dict: Vec::new(),
        }
    }
}

impl TextNormalizer {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        require_columns(&result, &self.columns)?;

        for name in &self.columns {
            if let Some(column) = result.column(name) {
                if !column.is_text() {
                    return Err(CleanError::NotText(name.clone()).into());
                }
            }
        }

        for name in &self.columns {
            if let Some(column) = result.column_mut(name) {
                for value in column.values.iter_mut() {
                    let normalized = self.normalize(&value.to_string());
                    *value = Value::Text(normalized);
                }
            }
        }

        Ok(result)
    }

    /// Normalize one cell's text.
    pub fn normalize(&self, text: &str) -> String {
        let mut text = text.trim().to_string();

        if self.lowercase {
            text = text.to_lowercase();
        }

        if self.remove_punct {
            text.retain(|c| !c.is_ascii_punctuation());
        }

        for (slang, replacement) in &self.slang_dict {
            if !slang.is_empty() {
                text = text.replace(slang.as_str(), replacement);
            }
        }

        if self.remove_stopwords {
            text = text
                .split_whitespace()
                .filter(|word| !stopwords::is_stopword(word))
                .collect::<Vec<_>>()
                .join(" ");
        }

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
impl CleaningModule for TextNormalizer {
    async fn on_create(&mut self, params: serde_json::Value) -> Result<()> {
        let parsed: Self = parse_params(MODULE_ID, params)?;
        if parsed.columns.is_empty() {
            return Err(CleanError::invalid_params(MODULE_ID, "'columns' must be provided").into());
        }
        *self = parsed;
        Ok(())
    }

    async fn process(&self, input: &DataFrame, _ctx: &ModuleContext) -> Result<DataFrame> {
        self.apply(input)
    }
}

/// A JSON object read as ordered `(key, value)` pairs.
mod ordered_pairs {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of strings or null")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    pairs.push((k, v));
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_any(PairsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults() {
        let n = TextNormalizer::default();
        assert_eq!(n.normalize("  HELLO   World!!! "), "hello world");
        assert_eq!(n.normalize("Test@#$ STRING"), "test string");
    }

    #[test]
    fn test_slang_replacement_follows_insertion_order() {
        let n: TextNormalizer = serde_json::from_value(serde_json::json!({
            "columns": ["t"],
            "slang_dict": {"u": "you", "yoou": "you"}
        }))
        .unwrap();
        assert_eq!(n.slang_dict[0].0, "u");
        assert_eq!(n.normalize("u ok"), "you ok");
    }

    #[test]
    fn test_stopword_removal() {
        let mut n = TextNormalizer::default();
        n.remove_stopwords = true;
        assert_eq!(n.normalize("This is a Test of the system"), "test system");
    }

    #[test]
    fn test_single_column_name_accepted() {
        let n: TextNormalizer = serde_json::from_value(serde_json::json!({"columns": "notes"})).unwrap();
        assert_eq!(n.columns, vec!["notes"]);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = parse_params::<TextNormalizer>(MODULE_ID, serde_json::json!({"colums": ["a"]}));
        assert!(err.is_err());
    }
}
