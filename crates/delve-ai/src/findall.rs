//! Find-all: build a dataset from the web in two phases.
//!
//! 1. `generate_spec` turns an objective into an [`ExtractionSpec`].
//! 2. `execute_spec` runs a (possibly edited) spec and returns entities.
//!
//! Each phase is a single request/response round trip; there is no polling.
//! Specs are semi-structured: `columns` is parsed and validated, every other
//! field is kept as-is and sent back to the execute endpoint unchanged.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::client::{AuthScheme, ParallelClient};
use crate::error::{AiError, Result};

/// One column of an extraction spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionColumn {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractionColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            column_type: None,
            extra: Map::new(),
        }
    }
}

/// Extraction spec produced by the generate phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ExtractionSpec {
    columns: Vec<ExtractionColumn>,
    document: Map<String, Value>,
}

impl ExtractionSpec {
    /// Build a spec from columns alone.
    pub fn new(columns: Vec<ExtractionColumn>) -> Result<Self> {
        let mut document = Map::new();
        document.insert("columns".to_string(), serde_json::to_value(&columns)?);
        Self::try_from(document)
    }

    pub fn columns(&self) -> &[ExtractionColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// A top-level field, including ones this client does not model.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Replace the columns, leaving all other fields untouched.
    pub fn set_columns(&mut self, columns: Vec<ExtractionColumn>) -> Result<()> {
        validate_columns(&columns)?;
        self.document
            .insert("columns".to_string(), serde_json::to_value(&columns)?);
        self.columns = columns;
        Ok(())
    }

    /// The full spec document as sent to the execute endpoint.
    pub fn as_document(&self) -> &Map<String, Value> {
        &self.document
    }
}

fn validate_columns(columns: &[ExtractionColumn]) -> Result<()> {
    let mut seen = HashSet::new();
    for column in columns {
        if column.name.trim().is_empty() {
            return Err(AiError::InvalidSpec("column name is empty".into()));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(AiError::InvalidSpec(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
    }
    Ok(())
}

impl TryFrom<Map<String, Value>> for ExtractionSpec {
    type Error = AiError;

    fn try_from(document: Map<String, Value>) -> Result<Self> {
        let columns = match document.get("columns") {
            Some(value @ Value::Array(_)) => {
                serde_json::from_value::<Vec<ExtractionColumn>>(value.clone()).map_err(|err| {
                    AiError::InvalidSpec(format!("malformed columns: {err}"))
                })?
            }
            Some(_) => return Err(AiError::InvalidSpec("columns must be an array".into())),
            None => return Err(AiError::InvalidSpec("missing columns".into())),
        };
        validate_columns(&columns)?;

        Ok(Self { columns, document })
    }
}

impl From<ExtractionSpec> for Map<String, Value> {
    fn from(spec: ExtractionSpec) -> Self {
        spec.document
    }
}

/// A single extracted entity: column name to value
pub type Entity = Map<String, Value>;

/// Entities returned by the execute phase. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Accepts a bare array or an object carrying the array under
    /// `results`, `entities` or `candidates`.
    fn from_response(value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => ["results", "entities", "candidates"]
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| {
                    AiError::InvalidResponse("execute response has no entity list".into())
                })?,
            other => {
                return Err(AiError::InvalidResponse(format!(
                    "unexpected execute response: {other}"
                )));
            }
        };

        let entities = items
            .into_iter()
            .map(|item| match item {
                Value::Object(entity) => Ok(entity),
                other => Err(AiError::InvalidResponse(format!(
                    "entity is not an object: {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entities })
    }
}

/// A spec together with its execution result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindAllRun {
    pub spec: ExtractionSpec,
    pub results: ExtractionResult,
}

/// Failure of the combined generate-then-execute flow
#[derive(Debug, Error)]
pub enum FindAllError {
    #[error("Spec generation failed: {0}")]
    Generate(#[source] AiError),

    /// Execution failed; the generated spec is kept so it can be retried
    /// without generating again.
    #[error("Execution error: {source}")]
    Execute {
        spec: Box<ExtractionSpec>,
        #[source]
        source: AiError,
    },
}

impl FindAllError {
    /// The generated spec, when generation succeeded.
    pub fn spec(&self) -> Option<&ExtractionSpec> {
        match self {
            FindAllError::Generate(_) => None,
            FindAllError::Execute { spec, .. } => Some(spec.as_ref()),
        }
    }
}

/// Drives the two find-all phases against the remote API.
#[derive(Debug, Clone)]
pub struct FindAllCoordinator {
    client: ParallelClient,
}

impl FindAllCoordinator {
    pub fn new(client: ParallelClient) -> Self {
        Self { client }
    }

    /// Generate an extraction spec from a natural-language objective.
    pub async fn generate_spec(&self, objective: &str) -> Result<ExtractionSpec> {
        if objective.trim().is_empty() {
            return Err(AiError::InvalidInput("find-all objective is empty".into()));
        }

        let body = json!({ "query": objective });
        let spec: ExtractionSpec = self
            .client
            .post_json("/v1beta/findall/ingest", AuthScheme::ApiKey, &body)
            .await?;
        tracing::info!(columns = spec.columns().len(), "Extraction spec generated");
        Ok(spec)
    }

    /// Execute a spec. Unknown fields are transmitted unchanged.
    pub async fn execute_spec(&self, spec: &ExtractionSpec) -> Result<ExtractionResult> {
        let response: Value = self
            .client
            .post_json("/v1beta/findall/execute", AuthScheme::ApiKey, spec.as_document())
            .await?;
        let result = ExtractionResult::from_response(response)?;
        tracing::info!(entities = result.len(), "Extraction spec executed");
        Ok(result)
    }

    /// Generate a spec, then execute it immediately.
    pub async fn generate_and_execute(
        &self,
        objective: &str,
    ) -> std::result::Result<FindAllRun, FindAllError> {
        let spec = self
            .generate_spec(objective)
            .await
            .map_err(FindAllError::Generate)?;

        match self.execute_spec(&spec).await {
            Ok(results) => Ok(FindAllRun { spec, results }),
            Err(source) => Err(FindAllError::Execute {
                spec: Box::new(spec),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_preserves_unknown_fields_in_order() {
        let raw = r#"{"entity_type":"company","columns":[{"name":"company","priority":1},{"name":"contract_value","type":"number"}],"filters":{"region":"LATAM"}}"#;
        let spec: ExtractionSpec = serde_json::from_str(raw).unwrap();

        assert_eq!(
            spec.column_names().collect::<Vec<_>>(),
            vec!["company", "contract_value"]
        );
        assert_eq!(spec.columns()[1].column_type.as_deref(), Some("number"));
        assert_eq!(spec.field("entity_type"), Some(&json!("company")));
        assert_eq!(serde_json::to_string(&spec).unwrap(), raw);
    }

    #[test]
    fn test_spec_numbers_keep_their_exact_text() {
        let raw = r#"{"columns":[{"name":"company"},{"name":"contract_value","weight":0.10}],"min_value":1.50,"scale":1e3,"big_id":123456789012345678901234567890,"f":0.1000000000000000055511151231257827}"#;
        let spec: ExtractionSpec = serde_json::from_str(raw).unwrap();

        assert_eq!(serde_json::to_string(spec.as_document()).unwrap(), raw);
        assert_eq!(serde_json::to_string(&spec).unwrap(), raw);
        assert_eq!(spec.field("big_id").unwrap().to_string(), "123456789012345678901234567890");
        assert_eq!(spec.columns()[1].extra["weight"].to_string(), "0.10");
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = serde_json::from_value::<ExtractionSpec>(
            json!({ "columns": [{ "name": "a" }, { "name": "a" }] }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));

        let err = ExtractionSpec::new(vec![ExtractionColumn::new("x"), ExtractionColumn::new("x")])
            .unwrap_err();
        assert!(matches!(err, AiError::InvalidSpec(_)));
    }

    #[test]
    fn test_missing_columns_rejected() {
        let err = serde_json::from_value::<ExtractionSpec>(json!({ "query": "x" })).unwrap_err();
        assert!(err.to_string().contains("missing columns"));
    }

    #[test]
    fn test_set_columns_keeps_other_fields() {
        let mut spec: ExtractionSpec = serde_json::from_value(json!({
            "columns": [{ "name": "company" }],
            "opaque": { "nested": [1, 2, 3] }
        }))
        .unwrap();

        let mut column = ExtractionColumn::new("ceo");
        column.description = Some("Chief executive".into());
        spec.set_columns(vec![ExtractionColumn::new("company"), column])
            .unwrap();

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["opaque"], json!({ "nested": [1, 2, 3] }));
        assert_eq!(value["columns"][1]["description"], "Chief executive");
    }

    #[test]
    fn test_result_shapes() {
        let bare = ExtractionResult::from_response(json!([{ "company": "A" }])).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped =
            ExtractionResult::from_response(json!({ "results": [{ "company": "B" }] })).unwrap();
        assert_eq!(wrapped.entities[0]["company"], "B");

        let empty = ExtractionResult::from_response(json!([])).unwrap();
        assert!(empty.is_empty());

        assert!(ExtractionResult::from_response(json!("nope")).is_err());
        assert!(ExtractionResult::from_response(json!([1, 2])).is_err());
    }
}
