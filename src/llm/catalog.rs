//! Model catalog fetching and normalization.
//!
//! Upstream `/models` endpoints disagree on shape. The aggregator returns
//! names, context lengths and per-token pricing; OpenAI returns bare ids; other
//! servers return either `data` or `models` holding objects or plain strings.
//! Everything is normalized into [`ModelRecord`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::client::{build_headers, check_error_response, ApiSettings, AGGREGATOR_MARKER};
use super::error::LlmError;
use super::openai::OpenAiCompatClient;

/// Ids containing any of these are never offered.
const EXCLUDED_ID_MARKERS: [&str; 2] = ["deprecated", "-instruct"];

/// Tokens per priced unit used in the pricing label.
const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// A model offered by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    /// Identifier sent back in completion requests.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Context window label, e.g. `"128k"`.
    pub context_length: Option<String>,
    /// Pricing label, e.g. `"$0.15 in / $0.60 out"`.
    pub pricing_label: Option<String>,
}

/// Response layout of the `/models` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogShape {
    /// Aggregator listing with names, context and pricing.
    Aggregator,
    /// Plain OpenAI listing: ids only.
    OpenAi,
    /// Anything else: `data` or `models`, objects or strings.
    Generic,
}

impl CatalogShape {
    /// Picks the shape from the base URL.
    pub fn for_settings(settings: &ApiSettings) -> Self {
        let base = settings.resolved_base_url();
        if base.contains(AGGREGATOR_MARKER) {
            Self::Aggregator
        } else if base.contains("openai") {
            Self::OpenAi
        } else {
            Self::Generic
        }
    }
}

#[derive(Deserialize, Default)]
struct AggregatorPricing {
    prompt: Option<Value>,
    completion: Option<Value>,
}

#[derive(Deserialize)]
struct AggregatorModel {
    id: Option<String>,
    name: Option<String>,
    context_length: Option<Value>,
    pricing: Option<AggregatorPricing>,
}

/// Fetches and normalizes the model list for `client`'s settings.
pub async fn list_models(client: &OpenAiCompatClient) -> Result<Vec<ModelRecord>> {
    let settings = client.settings();
    let headers = build_headers(settings)?;
    let url = settings.endpoint("/models");
    info!(url = %url, "Fetching model catalog");

    let response = client
        .http()
        .get(&url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| LlmError::Network(e.to_string()))?;
    let response = check_error_response(response).await?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| LlmError::api(format!("invalid model list: {e}")))?;

    let shape = CatalogShape::for_settings(settings);
    let models = normalize(shape, &body);
    debug!(shape = ?shape, count = models.len(), "Normalized model catalog");
    Ok(models)
}

/// Normalizes a raw `/models` body: parse per shape, drop excluded ids, sort.
pub fn normalize(shape: CatalogShape, body: &Value) -> Vec<ModelRecord> {
    let records = match shape {
        CatalogShape::Aggregator => parse_aggregator(body),
        CatalogShape::OpenAi => parse_openai(body),
        CatalogShape::Generic => parse_generic(body),
    };
    sort_records(filter_excluded(records))
}

fn list_at<'a>(body: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    body.get(key).and_then(Value::as_array)
}

fn parse_aggregator(body: &Value) -> Vec<ModelRecord> {
    list_at(body, "data")
        .into_iter()
        .flatten()
        .filter_map(|item| serde_json::from_value::<AggregatorModel>(item.clone()).ok())
        .filter_map(|model| {
            let id = model.id?;
            let pricing = model.pricing.unwrap_or_default();
            Some(ModelRecord {
                display_name: model.name.unwrap_or_else(|| id.clone()),
                context_length: model
                    .context_length
                    .as_ref()
                    .and_then(Value::as_u64)
                    .map(context_label),
                pricing_label: pricing_label(pricing.prompt.as_ref(), pricing.completion.as_ref()),
                id,
            })
        })
        .collect()
}

fn parse_openai(body: &Value) -> Vec<ModelRecord> {
    list_at(body, "data")
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("id").and_then(Value::as_str))
        .map(|id| ModelRecord {
            id: id.to_string(),
            display_name: id.to_string(),
            context_length: None,
            pricing_label: None,
        })
        .collect()
}

fn parse_generic(body: &Value) -> Vec<ModelRecord> {
    let items = list_at(body, "data").or_else(|| list_at(body, "models"));
    items
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(id) => Some(ModelRecord {
                id: id.clone(),
                display_name: id.clone(),
                context_length: None,
                pricing_label: None,
            }),
            Value::Object(obj) => {
                let name = obj.get("name").and_then(Value::as_str);
                let id = obj
                    .get("id")
                    .and_then(Value::as_str)
                    .or_else(|| obj.get("model").and_then(Value::as_str))
                    .or(name)?;
                Some(ModelRecord {
                    id: id.to_string(),
                    display_name: name.unwrap_or(id).to_string(),
                    context_length: obj
                        .get("context_length")
                        .and_then(Value::as_u64)
                        .map(context_label),
                    pricing_label: None,
                })
            }
            _ => None,
        })
        .collect()
}

/// Drops deprecated and instruct-tuned models.
pub fn filter_excluded(records: Vec<ModelRecord>) -> Vec<ModelRecord> {
    records
        .into_iter()
        .filter(|r| !EXCLUDED_ID_MARKERS.iter().any(|marker| r.id.contains(marker)))
        .collect()
}

/// Stable, case-insensitive sort by display name.
pub fn sort_records(mut records: Vec<ModelRecord>) -> Vec<ModelRecord> {
    records.sort_by_cached_key(|r| r.display_name.to_lowercase());
    records
}

/// Keeps records whose id or display name contains `term`, ignoring case.
pub fn filter_models<'a>(records: &'a [ModelRecord], term: &str) -> Vec<&'a ModelRecord> {
    let term = term.to_lowercase();
    records
        .iter()
        .filter(|r| {
            r.id.to_lowercase().contains(&term) || r.display_name.to_lowercase().contains(&term)
        })
        .collect()
}

/// Formats a context window: `"Nk"` from 1000 tokens up, the bare number below.
pub fn context_label(tokens: u64) -> String {
    if tokens >= 1000 {
        format!("{}k", (tokens as f64 / 1000.0).round() as u64)
    } else {
        tokens.to_string()
    }
}

fn rate(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Formats per-token rates as a per-million label; negative rates clamp to zero.
pub fn pricing_label(prompt: Option<&Value>, completion: Option<&Value>) -> Option<String> {
    let per_million = |r: f64| (r * TOKENS_PER_PRICE_UNIT).max(0.0);
    let input = per_million(rate(prompt)?);
    let output = per_million(rate(completion)?);
    Some(format!("${input:.2} in / ${output:.2} out"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::llm::error::llm_error;

    fn ids(records: &[ModelRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn context_labels() {
        assert_eq!(context_label(999), "999");
        assert_eq!(context_label(1000), "1k");
        assert_eq!(context_label(128_000), "128k");
        assert_eq!(context_label(32_768), "33k");
    }

    #[test]
    fn pricing_label_from_strings() {
        let label = pricing_label(Some(&json!("0.00000015")), Some(&json!("0.0000006")));
        assert_eq!(label.as_deref(), Some("$0.15 in / $0.60 out"));
    }

    #[test]
    fn pricing_label_clamps_negative_rates() {
        let label = pricing_label(Some(&json!("-1")), Some(&json!(-1)));
        assert_eq!(label.as_deref(), Some("$0.00 in / $0.00 out"));
    }

    #[test]
    fn pricing_label_needs_both_rates() {
        assert_eq!(pricing_label(Some(&json!("0.1")), None), None);
        assert_eq!(pricing_label(Some(&json!("abc")), Some(&json!("0.1"))), None);
    }

    #[test]
    fn aggregator_shape_normalized() {
        let body = json!({
            "data": [
                {
                    "id": "openai/gpt-4o-mini",
                    "name": "OpenAI: GPT-4o-mini",
                    "context_length": 128000,
                    "pricing": {"prompt": "0.00000015", "completion": "0.0000006"}
                },
                {"id": "meta/llama-3-8b-instruct", "name": "Llama 3 8B Instruct"},
                {"id": "anthropic/claude-3-haiku", "name": "Anthropic: Claude 3 Haiku"},
                {"name": "no id here"}
            ]
        });

        let records = normalize(CatalogShape::Aggregator, &body);
        assert_eq!(
            ids(&records),
            vec!["anthropic/claude-3-haiku", "openai/gpt-4o-mini"]
        );
        assert_eq!(records[1].context_length.as_deref(), Some("128k"));
        assert_eq!(
            records[1].pricing_label.as_deref(),
            Some("$0.15 in / $0.60 out")
        );
        assert_eq!(records[0].pricing_label, None);
    }

    #[test]
    fn openai_shape_uses_ids() {
        let body = json!({
            "object": "list",
            "data": [
                {"id": "gpt-4o", "object": "model"},
                {"id": "gpt-3.5-turbo-instruct", "object": "model"},
                {"id": "babbage-deprecated", "object": "model"},
                {"id": "dall-e-3", "object": "model"}
            ]
        });

        let records = normalize(CatalogShape::OpenAi, &body);
        assert_eq!(ids(&records), vec!["dall-e-3", "gpt-4o"]);
        assert_eq!(records[1].display_name, "gpt-4o");
    }

    #[test]
    fn generic_shape_accepts_models_key_and_strings() {
        let body = json!({
            "models": [
                "zephyr",
                {"name": "Alpha", "model": "alpha:latest", "context_length": 512},
                {"id": "old-deprecated"},
                42
            ]
        });

        let records = normalize(CatalogShape::Generic, &body);
        assert_eq!(ids(&records), vec!["alpha:latest", "zephyr"]);
        assert_eq!(records[0].display_name, "Alpha");
        assert_eq!(records[0].context_length.as_deref(), Some("512"));
    }

    #[test]
    fn generic_shape_skips_non_string_id() {
        let body = json!({
            "models": [{"id": 7, "model": "mistral:7b"}]
        });

        let records = normalize(CatalogShape::Generic, &body);
        assert_eq!(ids(&records), vec!["mistral:7b"]);
    }

    #[test]
    fn empty_body_gives_empty_list() {
        assert!(normalize(CatalogShape::Generic, &json!({})).is_empty());
        assert!(normalize(CatalogShape::Aggregator, &json!({"data": null})).is_empty());
    }

    #[test]
    fn sort_is_case_insensitive_and_stable() {
        let record = |id: &str, name: &str| ModelRecord {
            id: id.to_string(),
            display_name: name.to_string(),
            context_length: None,
            pricing_label: None,
        };
        let sorted = sort_records(vec![
            record("b1", "beta"),
            record("a", "Alpha"),
            record("b2", "Beta"),
        ]);
        assert_eq!(ids(&sorted), vec!["a", "b1", "b2"]);
    }

    #[test]
    fn search_matches_id_or_name() {
        let records = normalize(
            CatalogShape::Aggregator,
            &json!({"data": [
                {"id": "openai/gpt-4o", "name": "GPT-4o"},
                {"id": "mistral/large", "name": "Mistral Large"}
            ]}),
        );
        assert_eq!(filter_models(&records, "MISTRAL").len(), 1);
        assert_eq!(filter_models(&records, "openai/").len(), 1);
        assert_eq!(filter_models(&records, "").len(), 2);
    }

    #[test]
    fn shape_detection_from_base_url() {
        let shape = |url: &str| {
            CatalogShape::for_settings(&ApiSettings::new(Some(url.to_string()), "k"))
        };
        assert_eq!(shape("https://openrouter.ai/api/v1"), CatalogShape::Aggregator);
        assert_eq!(shape("https://api.openai.com/v1"), CatalogShape::OpenAi);
        assert_eq!(shape("http://localhost:11434/v1"), CatalogShape::Generic);
    }

    #[tokio::test]
    async fn list_models_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("authorization", "Bearer sk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "mixtral"}, {"id": "codellama-instruct"}, {"id": "Llama"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(ApiSettings::new(Some(server.uri()), "sk")).unwrap();
        let records = list_models(&client).await.unwrap();
        assert_eq!(ids(&records), vec!["Llama", "mixtral"]);
    }

    #[tokio::test]
    async fn list_models_propagates_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key"}
            })))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(ApiSettings::new(Some(server.uri()), "bad")).unwrap();
        let err = list_models(&client).await.unwrap_err();
        assert_eq!(
            llm_error(&err),
            Some(&LlmError::Api("API Error: Invalid API key".to_string()))
        );
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn excluded_ids_never_survive(
                ids in proptest::collection::vec("[a-z-]{0,12}(deprecated|-instruct)?[a-z]{0,4}", 0..20)
            ) {
                let body = json!({ "data": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>() });
                for shape in [CatalogShape::Aggregator, CatalogShape::OpenAi, CatalogShape::Generic] {
                    let records = normalize(shape, &body);
                    for record in &records {
                        prop_assert!(!record.id.contains("deprecated"));
                        prop_assert!(!record.id.contains("-instruct"));
                    }
                    let expected = ids
                        .iter()
                        .filter(|id| !id.contains("deprecated") && !id.contains("-instruct"))
                        .count();
                    prop_assert_eq!(records.len(), expected);
                }
            }

            #[test]
            fn output_is_sorted_by_lowercase_name(
                names in proptest::collection::vec("[A-Za-z]{1,8}", 0..20)
            ) {
                let body = json!({ "data": names.iter().map(|n| json!({"id": n})).collect::<Vec<_>>() });
                let records = normalize(CatalogShape::OpenAi, &body);
                for pair in records.windows(2) {
                    prop_assert!(pair[0].display_name.to_lowercase() <= pair[1].display_name.to_lowercase());
                }
            }
        }
    }
}
