use crate::sunset::cluster::{IndexStat, SearchCluster, TaskProgress};
use crate::sunset::config::ClusterConfig;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;

const READ_RETRIES: usize = 2;
const ERROR_BODY_MAX_CHARS: usize = 400;

/// `SearchCluster` over the OpenSearch/Elasticsearch REST API.
///
/// Reads (GET/HEAD) are retried with linear backoff; mutations are sent
/// exactly once and left to the caller's compensation logic.
pub struct HttpCluster {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CatIndexRow {
    index: String,
    #[serde(rename = "store.size")]
    store_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    completed: bool,
}

impl HttpCluster {
    pub fn from_config(cfg: &ClusterConfig) -> Result<Self> {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty() {
            bail!("cluster endpoint is not configured; set SUNSET_ENDPOINT");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_deref()),
            None => builder,
        }
    }

    fn send_read(
        &self,
        build: impl Fn() -> RequestBuilder,
        what: &str,
    ) -> Result<Response> {
        let mut last_err = None;
        for attempt in 0..=READ_RETRIES {
            match self.authed(build()).send() {
                Ok(response) => return Ok(response),
                Err(err) => last_err = Some(err),
            }
            if attempt < READ_RETRIES {
                let delay_ms = 250 * (attempt + 1) as u64;
                thread::sleep(Duration::from_millis(delay_ms));
            }
        }
        let err = last_err.map(anyhow::Error::from).unwrap_or_else(|| anyhow!("no response"));
        Err(err).with_context(|| format!("request failed after retries: {what}"))
    }

    fn send_write(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        self.authed(builder)
            .send()
            .with_context(|| format!("request failed: {what}"))
    }

    fn ensure_success(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_MAX_CHARS).collect();
        bail!("{what} returned status {status}: {snippet}");
    }

    fn head_exists(&self, path: &str, what: &str) -> Result<bool> {
        let url = self.url(path);
        let response = self.send_read(|| self.client.head(&url), what)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => bail!("{what} returned status {status}"),
        }
    }
}

fn parse_store_size(raw: Option<&str>) -> u64 {
    raw.map(|v| v.trim_end_matches('b'))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

impl SearchCluster for HttpCluster {
    fn list_indices(&self) -> Result<Vec<IndexStat>> {
        let url = self.url("_cat/indices?format=json&bytes=b");
        let response = self.send_read(|| self.client.get(&url), "list indices")?;
        let response = Self::ensure_success(response, "list indices")?;
        let rows: Vec<CatIndexRow> = response.json().context("invalid index listing payload")?;
        Ok(rows
            .into_iter()
            .map(|row| IndexStat {
                size_bytes: parse_store_size(row.store_size.as_deref()),
                name: row.index,
            })
            .collect())
    }

    fn refresh(&self, index: &str) -> Result<()> {
        let what = format!("refresh {index}");
        let response = self.send_write(self.client.post(self.url(&format!("{index}/_refresh"))), &what)?;
        Self::ensure_success(response, &what)?;
        Ok(())
    }

    fn exists(&self, index: &str) -> Result<bool> {
        self.head_exists(index, &format!("check index {index}"))
    }

    fn set_read_only(&self, index: &str, read_only: bool) -> Result<()> {
        let what = format!("update write block on {index}");
        let body = json!({"index": {"blocks": {"read_only": read_only}}});
        let response = self.send_write(
            self.client
                .put(self.url(&format!("{index}/_settings")))
                .json(&body),
            &what,
        )?;
        Self::ensure_success(response, &what)?;
        Ok(())
    }

    fn mapping(&self, index: &str) -> Result<Value> {
        let what = format!("read mapping of {index}");
        let url = self.url(&format!("{index}/_mapping"));
        let response = self.send_read(|| self.client.get(&url), &what)?;
        let response = Self::ensure_success(response, &what)?;
        response.json().with_context(|| format!("invalid mapping payload for {index}"))
    }

    fn settings(&self, index: &str) -> Result<Value> {
        let what = format!("read settings of {index}");
        let url = self.url(&format!("{index}/_settings"));
        let response = self.send_read(|| self.client.get(&url), &what)?;
        let response = Self::ensure_success(response, &what)?;
        response.json().with_context(|| format!("invalid settings payload for {index}"))
    }

    fn create_index(&self, index: &str, settings: &Value, mappings: &Value) -> Result<()> {
        let what = format!("create index {index}");
        let body = json!({"settings": settings, "mappings": mappings});
        let response = self.send_write(self.client.put(self.url(index)).json(&body), &what)?;
        Self::ensure_success(response, &what)?;
        Ok(())
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        let what = format!("delete index {index}");
        let response = self.send_write(self.client.delete(self.url(index)), &what)?;
        Self::ensure_success(response, &what)?;
        Ok(())
    }

    fn start_reindex(&self, source: &str, dest: &str, slices: u32) -> Result<String> {
        let what = format!("start reindex {source} -> {dest}");
        let url = self.url(&format!(
            "_reindex?wait_for_completion=false&slices={slices}"
        ));
        let body = json!({
            "source": {"index": source},
            "dest": {"index": dest}
        });
        let response = self.send_write(self.client.post(url).json(&body), &what)?;
        let response = Self::ensure_success(response, &what)?;
        let payload: Value = response.json().context("invalid reindex payload")?;
        let task_id = payload
            .get("task")
            .and_then(Value::as_str)
            .context("reindex response missing task id")?;
        Ok(task_id.to_string())
    }

    fn task_status(&self, task_id: &str) -> Result<TaskProgress> {
        let what = format!("read status of task {task_id}");
        let url = self.url(&format!("_tasks/{task_id}"));
        let response = self.send_read(|| self.client.get(&url), &what)?;
        let response = Self::ensure_success(response, &what)?;
        let payload: TaskResponse = response
            .json()
            .with_context(|| format!("invalid task payload for {task_id}"))?;
        Ok(TaskProgress {
            completed: payload.completed,
        })
    }

    fn count(&self, target: &str) -> Result<u64> {
        let what = format!("count documents in {target}");
        let url = self.url(&format!("{target}/_count"));
        let response = self.send_read(|| self.client.get(&url), &what)?;
        let response = Self::ensure_success(response, &what)?;
        let payload: CountResponse = response
            .json()
            .with_context(|| format!("invalid count payload for {target}"))?;
        Ok(payload.count)
    }

    fn put_settings(&self, index: &str, settings: &Value) -> Result<()> {
        let what = format!("update settings on {index}");
        let response = self.send_write(
            self.client
                .put(self.url(&format!("{index}/_settings")))
                .json(settings),
            &what,
        )?;
        Self::ensure_success(response, &what)?;
        Ok(())
    }

    fn update_aliases(&self, actions: &Value) -> Result<()> {
        let what = "update aliases";
        let body = json!({"actions": actions});
        let response = self.send_write(self.client.post(self.url("_aliases")).json(&body), what)?;
        Self::ensure_success(response, what)?;
        Ok(())
    }

    fn alias_exists(&self, alias: &str) -> Result<bool> {
        self.head_exists(&format!("_alias/{alias}"), &format!("check alias {alias}"))
    }

    fn alias_indices(&self, alias: &str) -> Result<Vec<String>> {
        let what = format!("resolve alias {alias}");
        let url = self.url(&format!("_alias/{alias}"));
        let response = self.send_read(|| self.client.get(&url), &what)?;
        let response = Self::ensure_success(response, &what)?;
        let payload: Value = response
            .json()
            .with_context(|| format!("invalid alias payload for {alias}"))?;
        let object = payload
            .as_object()
            .with_context(|| format!("alias payload for {alias} should be an object"))?;
        Ok(object.keys().cloned().collect())
    }
}
