//! On-disk configuration shapes.
//!
//! Two layouts are supported, both JSON:
//! - **Block style** (`<block>/<entity>/<grain>.json`): an explicit list of group keys
//!   (`chaves`), an ordered list of metrics (`variaveis`, each with `nome`/`tratamento`/`params`)
//!   and an optional `custom_code` marker declaring a post-aggregation custom step.
//! - **Catalog style** (`<block>/<entity>.json`): a `variaveis` object mapping metric names to
//!   `{funcao, params}`. Key order in the object is preserved.
//!
//! English aliases (`keys`, `metrics`, `name`, `treatment`) are accepted alongside the original
//! field names. Treatment names and parameters stay as raw strings here; validating them is the
//! engine's job.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

/// Raw treatment parameters (`field`, `numerator_field`, `campo`, `nominador`, ...).
pub type Params = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Explicit group keys. `None` means "derive keys from the granularity".
    #[serde(rename = "chaves", alias = "keys", default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(rename = "variaveis", alias = "metrics", default)]
    pub metrics: Vec<BlockMetric>,
    #[serde(default, alias = "custom_step", skip_serializing_if = "Option::is_none")]
    pub custom_code: Option<serde_json::Value>,
}

impl BlockConfig {
    /// Whether the block asks for a post-aggregation custom step.
    ///
    /// Any present value other than `null` or `false` counts as a declaration.
    pub fn declares_custom_step(&self) -> bool {
        declares(&self.custom_code)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockMetric {
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    #[serde(rename = "tratamento", alias = "treatment")]
    pub treatment: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(
        rename = "variaveis",
        alias = "metrics",
        default,
        deserialize_with = "deserialize_ordered",
        serialize_with = "serialize_ordered"
    )]
    pub metrics: Vec<(String, CatalogMetric)>,
    #[serde(default, alias = "custom_step", skip_serializing_if = "Option::is_none")]
    pub custom_code: Option<serde_json::Value>,
}

impl CatalogConfig {
    pub fn declares_custom_step(&self) -> bool {
        declares(&self.custom_code)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogMetric {
    #[serde(rename = "funcao", alias = "treatment")]
    pub treatment: String,
    #[serde(default)]
    pub params: Params,
}

fn declares(marker: &Option<serde_json::Value>) -> bool {
    !matches!(
        marker,
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false))
    )
}

/// Deserialize a JSON object into an insertion-ordered list, rejecting repeated keys.
fn deserialize_ordered<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of metric names to definitions")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            let mut seen = HashSet::new();
            while let Some((key, value)) = map.next_entry::<String, T>()? {
                if !seen.insert(key.clone()) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate metric `{key}`"
                    )));
                }
                out.push((key, value));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

fn serialize_ordered<S, T>(entries: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}
