//! Zilliz Cloud REST-backed [`VectorStore`], grounded on the teacher's
//! `vector_rag::services::vector_store::VectorStoreService` — same
//! `/v1/vector/...` endpoints, same bearer-token auth, same
//! `ZillizResponse<T>` envelope — generalized from the teacher's ad hoc
//! method set into the `VectorStore` trait, wrapped in the resilience
//! crate's circuit breaker + retry composition.

use async_trait::async_trait;
use raqe_config::VectorStoreConfig;
use raqe_resilience::{execute_with_retry, CircuitBreakerManager, RetryPolicy};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::errors::{VectorError, VectorResult};
use crate::store::{VectorMatch, VectorPoint, VectorStore};

const OPERATION: &str = "vector_store";

pub struct ZillizVectorStore {
    client: Client,
    base_url: String,
    api_key: String,
    breaker: Arc<CircuitBreakerManager>,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionRequest {
    collection_name: String,
    dimension: u32,
    metric_type: String,
    primary_field: String,
    vector_field: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRequest {
    collection_name: String,
    data: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    collection_name: String,
    vector: Vec<f32>,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest {
    collection_name: String,
    filter: String,
}

#[derive(Debug, Deserialize, Default)]
struct ZillizResponse<T: Default> {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl ZillizVectorStore {
    pub fn new(config: &VectorStoreConfig, breaker: Arc<CircuitBreakerManager>) -> VectorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            breaker,
            retry: RetryPolicy::for_network(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/vector{}", self.base_url, path)
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
    ) -> VectorResult<ZillizResponse<R>> {
        if !self.breaker.is_call_allowed(OPERATION) {
            return Err(VectorError::CircuitOpen);
        }

        let result = execute_with_retry(
            OPERATION,
            &self.retry,
            |e: &VectorError| !matches!(e, VectorError::CircuitOpen),
            || self.post_once(path, body),
        )
        .await;

        match &result {
            Ok(_) => self.breaker.record_success(OPERATION),
            Err(_) => self.breaker.record_failure(OPERATION),
        }
        result
    }

    async fn post_once<B: Serialize + Sync, R: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
    ) -> VectorResult<ZillizResponse<R>> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| VectorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VectorError::Request(format!("{status}: {text}")));
        }

        let parsed: ZillizResponse<R> = response
            .json()
            .await
            .map_err(|e| VectorError::Request(e.to_string()))?;

        if parsed.code != 0 && parsed.code != 200 {
            return Err(VectorError::Api {
                code: parsed.code,
                message: parsed.message.clone().unwrap_or_default(),
            });
        }
        Ok(parsed)
    }
}

#[async_trait]
impl VectorStore for ZillizVectorStore {
    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str, dimension: u32) -> VectorResult<()> {
        let req = CreateCollectionRequest {
            collection_name: name.to_string(),
            dimension,
            metric_type: "COSINE".to_string(),
            primary_field: "id".to_string(),
            vector_field: "vector".to_string(),
        };
        self.post::<_, Value>("/collections/create", &req).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn exists(&self, name: &str) -> VectorResult<bool> {
        let url = format!(
            "{}/collections/describe?collectionName={}",
            self.url(""),
            urlencoding::encode(name)
        );
        if !self.breaker.is_call_allowed(OPERATION) {
            return Err(VectorError::CircuitOpen);
        }
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VectorError::Request(e.to_string()))?;
        if response.status().as_u16() == 404 {
            self.breaker.record_success(OPERATION);
            return Ok(false);
        }
        let body: ZillizResponse<Value> = response
            .json()
            .await
            .map_err(|e| VectorError::Request(e.to_string()))?;
        self.breaker.record_success(OPERATION);
        Ok(body.code == 0 || body.code == 200)
    }

    #[instrument(skip(self, points))]
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> VectorResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let count = points.len();
        let data: Vec<Value> = points
            .into_iter()
            .map(|p| {
                let mut payload = p.payload;
                payload.insert("id".to_string(), json!(p.id));
                payload.insert("vector".to_string(), json!(p.vector));
                Value::Object(payload)
            })
            .collect();

        let req = InsertRequest {
            collection_name: collection.to_string(),
            data,
        };
        self.post::<_, Value>("/insert", &req).await?;
        Ok(count)
    }

    #[instrument(skip(self, vector))]
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&str>,
    ) -> VectorResult<Vec<VectorMatch>> {
        let req = SearchRequest {
            collection_name: collection.to_string(),
            vector: vector.to_vec(),
            limit: k,
            filter: filter.map(str::to_string),
        };
        let response: ZillizResponse<Vec<Value>> = self.post("/search", &req).await?;

        let matches = response
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| {
                let mut obj = v.as_object()?.clone();
                let score = obj.remove("distance")?.as_f64()? as f32;
                let id = obj
                    .remove("id")
                    .map(|v| v.as_str().unwrap_or_default().to_string())
                    .unwrap_or_default();
                Some(VectorMatch { id, score, payload: obj })
            })
            .collect();
        Ok(matches)
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> VectorResult<()> {
        let filter = format!("id == \"{id}\"");
        let req = DeleteRequest {
            collection_name: collection.to_string(),
            filter,
        };
        self.post::<_, Value>("/delete", &req).await?;
        Ok(())
    }
}
