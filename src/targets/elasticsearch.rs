//! Elasticsearch target adapter.
//!
//! Entities map to indices; batches go through the `_bulk` API as NDJSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::domain::{Entity, Value};
use crate::interfaces::{Target, TargetError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Writes generated documents into Elasticsearch indices.
pub struct ElasticsearchTarget {
    base_url: String,
    client: Option<Client>,
}

impl ElasticsearchTarget {
    pub fn new(dsn: &str) -> Self {
        Self {
            base_url: normalize_url(dsn),
            client: None,
        }
    }

    fn client(&self) -> Result<&Client, TargetError> {
        self.client.as_ref().ok_or(TargetError::NotConnected)
    }
}

#[async_trait]
impl Target for ElasticsearchTarget {
    async fn connect(&mut self) -> Result<(), TargetError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TargetError::Connect(e.to_string()))?;
        let resp = client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| TargetError::Connect(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TargetError::Connect(format!(
                "elasticsearch ping failed: status={status} body={}",
                body.trim()
            )));
        }
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        self.client = None;
        Ok(())
    }

    async fn create_table_if_not_exists(&mut self, entity: &Entity) -> Result<(), TargetError> {
        let index = to_index_name(&entity.target_table);
        let url = format!("{}/{index}", self.base_url);
        let resp = self.client()?.put(&url).send().await?;
        match resp.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::BAD_REQUEST => {
                let body = resp.text().await.unwrap_or_default();
                if body.contains("resource_already_exists_exception") {
                    Ok(())
                } else {
                    Err(TargetError::Protocol(format!(
                        "elasticsearch create index failed: {}",
                        body.trim()
                    )))
                }
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(TargetError::Protocol(format!(
                    "elasticsearch create index failed: status={status} body={}",
                    body.trim()
                )))
            }
        }
    }

    async fn truncate_table(&mut self, table: &str) -> Result<(), TargetError> {
        let index = to_index_name(table);
        let url = format!("{}/{index}/_delete_by_query", self.base_url);
        let resp = self
            .client()?
            .post(&url)
            .json(&json!({ "query": { "match_all": {} } }))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TargetError::Protocol(format!(
                "elasticsearch truncate failed: status={status} body={}",
                body.trim()
            )));
        }
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        entity: &Entity,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), TargetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let index = to_index_name(&entity.target_table);

        let mut body = String::new();
        for row in &rows {
            let action = json!({ "index": { "_index": index } });
            body.push_str(&action.to_string());
            body.push('\n');

            let mut doc = serde_json::Map::new();
            for (column, value) in columns.iter().zip(row) {
                doc.insert(column.clone(), serde_json::to_value(value)?);
            }
            body.push_str(&serde_json::Value::Object(doc).to_string());
            body.push('\n');
        }

        let resp = self
            .client()?
            .post(format!("{}/_bulk", self.base_url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TargetError::Protocol(format!(
                "elasticsearch bulk insert failed: status={status} body={}",
                text.trim()
            )));
        }

        #[derive(serde::Deserialize)]
        struct BulkResponse {
            #[serde(default)]
            errors: bool,
        }
        if let Ok(bulk) = serde_json::from_str::<BulkResponse>(&text) {
            if bulk.errors {
                return Err(TargetError::Protocol(
                    "elasticsearch bulk insert returned errors".into(),
                ));
            }
        }
        Ok(())
    }

    async fn server_version(&mut self) -> Result<String, TargetError> {
        let resp = self.client()?.get(format!("{}/", self.base_url)).send().await?;
        if !resp.status().is_success() {
            return Err(TargetError::Protocol(format!(
                "status={}",
                resp.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct Root {
            #[serde(default)]
            version: VersionInfo,
        }
        #[derive(serde::Deserialize, Default)]
        struct VersionInfo {
            #[serde(default)]
            number: String,
        }
        let root: Root = resp.json().await?;
        Ok(root.version.number)
    }
}

fn normalize_url(dsn: &str) -> String {
    let dsn = dsn.trim();
    if dsn.is_empty() {
        return "http://localhost:9200".to_string();
    }
    let with_scheme = if dsn.starts_with("http://") || dsn.starts_with("https://") {
        dsn.to_string()
    } else {
        format!("http://{dsn}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

fn to_index_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dsn_into_base_url() {
        assert_eq!(normalize_url(""), "http://localhost:9200");
        assert_eq!(normalize_url("localhost:9200/"), "http://localhost:9200");
        assert_eq!(
            normalize_url("https://search.example.com"),
            "https://search.example.com"
        );
    }

    #[test]
    fn index_names_are_lowercased() {
        assert_eq!(to_index_name(" Events "), "events");
    }
}
