use ai_slop::compare::run_comparison;
use ai_slop::credentials::{CredentialState, CredentialStore, FileStorage, StorageArea, StorageMode};
use ai_slop::data::{Comparison, Transformation};
use ai_slop::llm::{list_models, OpenAiCompatClient};
use ai_slop::pipeline::{PipelineRunner, RunOutcome, Step};
use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test setup with file-backed storage areas and a mock upstream API.
struct TestEnv {
    temp_dir: TempDir,
    server: MockServer,
}

impl TestEnv {
    async fn new() -> Result<Self> {
        Ok(TestEnv {
            temp_dir: tempfile::tempdir()?,
            server: MockServer::start().await,
        })
    }

    fn local(&self) -> FileStorage {
        FileStorage::new(self.temp_dir.path().join("local"))
    }

    fn session(&self) -> FileStorage {
        FileStorage::new(self.temp_dir.path().join("session"))
    }

    fn store(&self) -> CredentialStore {
        CredentialStore::new(Box::new(self.local()), Box::new(self.session()))
    }

    /// Saves `api_key` for the mock server and returns a client built the
    /// way the CLI builds one: from a fresh store reading the files back.
    fn saved_client(&self, api_key: &str, base_path: &str, mode: StorageMode) -> Result<OpenAiCompatClient> {
        let base_url = format!("{}{}", self.server.uri(), base_path);
        self.store().save(api_key, &base_url, mode)?;

        let credentials = self
            .store()
            .load()?
            .ok_or_else(|| anyhow::anyhow!("credentials not readable"))?;
        OpenAiCompatClient::new(credentials.to_api_settings())
    }

    fn chat_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }
}

#[tokio::test]
async fn settings_round_trip_through_files() -> Result<()> {
    let env = TestEnv::new().await?;

    for mode in [StorageMode::Local, StorageMode::Session] {
        env.store().save("sk-round-trip", "https://openrouter.ai/api/v1", mode)?;

        let credentials = env.store().load()?.expect("credentials present");
        assert_eq!(credentials.api_key, "sk-round-trip");
        assert_eq!(credentials.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(credentials.storage, mode);

        // The record only lives in the chosen area.
        let (kept, removed) = match mode {
            StorageMode::Local => (env.local(), env.session()),
            StorageMode::Session => (env.session(), env.local()),
        };
        assert_eq!(fs::read_dir(kept.dir())?.count(), 1);
        assert!(removed.get("ai_slop_settings")?.is_none());
        assert!(removed.get("ai_slop_session_settings")?.is_none());
    }

    env.store().clear()?;
    assert_eq!(env.store().load_state()?, CredentialState::Missing);
    Ok(())
}

#[test]
fn tampered_record_reads_as_unconfigured() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let local = FileStorage::new(temp_dir.path().join("local"));
    let session = FileStorage::new(temp_dir.path().join("session"));
    let mut store = CredentialStore::new(Box::new(local.clone()), Box::new(session));
    store.save("sk-secret", "", StorageMode::Local)?;

    let raw = local.get("ai_slop_settings")?.expect("record written");
    let mut record: Value = serde_json::from_str(&raw)?;
    record["encryptedApiKey"] = json!("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    local.set("ai_slop_settings", &record.to_string())?;

    let mut fresh = CredentialStore::new(
        Box::new(local),
        Box::new(FileStorage::new(temp_dir.path().join("session"))),
    );
    assert!(matches!(fresh.load_state()?, CredentialState::Corrupt { .. }));
    assert!(fresh.load()?.is_none());
    Ok(())
}

#[tokio::test]
async fn single_step_pipeline_hits_chat_endpoint() -> Result<()> {
    let env = TestEnv::new().await?;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{
                "role": "user",
                "content": "<content>Hello</content>\n\n<instructions>Translate to French<instructions>"
            }],
            "max_tokens": 8000
        })))
        .respond_with(TestEnv::chat_reply("  Bonjour  "))
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.saved_client("sk-test", "/v1/", StorageMode::Session)?;
    let mut steps = vec![Step::new("Translate to French", "gpt-4o-mini")];
    let report = PipelineRunner::new(&client)
        .run_sequential(&mut steps, "Hello", |_| {})
        .await?;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.output.as_deref(), Some("Bonjour"));
    Ok(())
}

#[tokio::test]
async fn saved_transformation_runs_all_steps() -> Result<()> {
    let env = TestEnv::new().await?;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(TestEnv::chat_reply("step reply"))
        .expect(2)
        .mount(&env.server)
        .await;

    let doc_path = env.temp_dir.path().join("pipeline.json");
    fs::write(
        &doc_path,
        serde_json::to_string_pretty(&json!({
            "title": "Two steps",
            "input": "Some text",
            "output": "",
            "steps": [
                {"stepNumber": 1, "instructions": "Summarize", "model": "gpt-4o-mini"},
                {"stepNumber": 2, "instructions": "Shorten"}
            ]
        }))?,
    )?;

    let client = env.saved_client("sk-test", "", StorageMode::Local)?;
    let mut transformation = Transformation::load_from_file(&doc_path)?;
    let input = transformation.input.clone();
    let report = PipelineRunner::new(&client)
        .run_sequential(transformation.steps_mut(), &input, |_| {})
        .await?;
    assert_eq!(report.executed, 2);

    let requests = env.server.received_requests().await.unwrap_or_default();
    let second: Value = serde_json::from_slice(&requests[1].body)?;
    assert_eq!(second["model"], "gpt-4o");
    let roles: Vec<&str> = second["messages"]
        .as_array()
        .map(|m| m.iter().filter_map(|x| x["role"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(roles, vec!["user", "assistant", "user"]);
    assert_eq!(second["messages"][2]["content"], "<instructions>Shorten<instructions>");

    transformation.output = report.output.unwrap_or_default();
    transformation.save_to_file(&doc_path)?;
    let reloaded = Transformation::load_from_file(&doc_path)?;
    assert_eq!(reloaded.output, "step reply");
    assert_eq!(reloaded.steps()[1].last_response.as_deref(), Some("step reply"));
    Ok(())
}

#[tokio::test]
async fn comparison_reports_failing_model_and_keeps_others() -> Result<()> {
    let env = TestEnv::new().await?;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(TestEnv::chat_reply("A haiku"))
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-missing"})))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"message": "The model does not exist"}
        })))
        .mount(&env.server)
        .await;

    let client = env.saved_client("sk-test", "", StorageMode::Session)?;
    let mut comparison = Comparison::new("Haiku", "Write a haiku", ["gpt-4o", "gpt-missing"]);
    let failures = run_comparison(&mut comparison, &client, 256).await?;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].model, "gpt-missing");
    assert_eq!(
        failures[0].error.to_string(),
        "API Error: The model does not exist"
    );
    assert_eq!(comparison.responses[0].llm_response, "A haiku");
    Ok(())
}

#[tokio::test]
async fn aggregator_catalog_is_filtered_and_sorted() -> Result<()> {
    let env = TestEnv::new().await?;
    Mock::given(method("GET"))
        .and(path("/openrouter/api/v1/models"))
        .and(header("x-title", "AI Slop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "z/zeta", "name": "Zeta", "context_length": 200000,
                 "pricing": {"prompt": "0.000003", "completion": "0.000015"}},
                {"id": "a/old-deprecated", "name": "Old"},
                {"id": "a/alpha", "name": "alpha"},
                {"id": "b/gpt-3.5-turbo-instruct", "name": "Instruct"}
            ]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.saved_client("sk-or", "/openrouter/api/v1", StorageMode::Local)?;
    let models = list_models(&client).await?;

    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a/alpha", "z/zeta"]);
    assert_eq!(models[1].context_length.as_deref(), Some("200k"));
    assert_eq!(models[1].pricing_label.as_deref(), Some("$3.00 in / $15.00 out"));
    Ok(())
}
