use crate::config::{CollectionKind, CollectionMap, StoreConnectionConfig};
use crate::persistence::credentials::TokenSource;
use crate::persistence::error::{PersistenceError, PersistenceResult};
use crate::persistence::value::{decode_fields, encode_fields};
use crate::persistence::Record;
use serde::Deserialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, warn};

/// REST client for one Firestore database.
///
/// Holds the HTTP pool and the token source; collections are reached through
/// [`FirestoreClient::collection`], keyed by record type.
pub struct FirestoreClient {
    http: reqwest::Client,
    documents_url: String,
    project_id: String,
    collections: CollectionMap,
    tokens: TokenSource,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<Document>,
}

impl FirestoreClient {
    /// Build a client and prove the credentials work.
    ///
    /// Against production this mints the first access token; against the
    /// emulator no request is made.
    pub async fn connect(config: &StoreConnectionConfig) -> PersistenceResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .connect_timeout(config.connect_timeout)
            .timeout(Duration::from_secs(30))
            .build()?;

        let (root, tokens) = match &config.emulator_host {
            Some(host) => {
                info!("Using Firestore emulator at {host}");
                (emulator_root(host), TokenSource::Emulator)
            }
            None => {
                let tokens = TokenSource::from_file(&config.credentials_path)?;
                if let Some(key_project) = tokens.project_id() {
                    if key_project != config.project_id {
                        warn!(
                            "Service account belongs to project {key_project}, connecting to {}",
                            config.project_id
                        );
                    }
                }
                (config.endpoint.trim_end_matches('/').to_string(), tokens)
            }
        };

        let client = Self {
            http,
            documents_url: format!(
                "{root}/v1/projects/{}/databases/(default)/documents",
                config.project_id
            ),
            project_id: config.project_id.clone(),
            collections: config.collections.clone(),
            tokens,
        };

        client.tokens.bearer(&client.http).await?;
        info!("Connected to Firestore project {}", client.project_id);
        Ok(client)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Physical collection name for a logical collection.
    pub fn collection_name(&self, kind: CollectionKind) -> &str {
        self.collections.resolve(kind)
    }

    /// Typed access to the collection that stores `T`.
    pub fn collection<T: Record>(&self) -> Collection<'_, T> {
        Collection {
            client: self,
            name: self.collection_name(T::KIND),
            _record: PhantomData,
        }
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> PersistenceResult<reqwest::Response> {
        let token = self.tokens.bearer(&self.http).await?;
        let resp = request.bearer_auth(token).send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PersistenceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Documents of one record type, addressed by logical collection.
pub struct Collection<'a, T> {
    client: &'a FirestoreClient,
    name: &'a str,
    _record: PhantomData<T>,
}

impl<'a, T: Record> Collection<'a, T> {
    pub fn name(&self) -> &str {
        self.name
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.client.documents_url, self.name)
    }

    fn document_url(&self, id: &str) -> PersistenceResult<String> {
        if id.is_empty() || id.contains('/') {
            return Err(PersistenceError::Codec(format!("Invalid document id '{id}'")));
        }
        Ok(format!("{}/{id}", self.collection_url()))
    }

    fn body(record: &T) -> PersistenceResult<Value> {
        let fields = encode_fields(&serde_json::to_value(record)?)?;
        Ok(json!({ "fields": fields }))
    }

    fn decode(doc: Document) -> PersistenceResult<T> {
        let plain = decode_fields(&doc.fields)?;
        Ok(serde_json::from_value(plain)?)
    }

    /// Store a new document under a fresh id and return that id.
    pub async fn add(&self, record: &T) -> PersistenceResult<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let request = self
            .client
            .http
            .post(self.collection_url())
            .query(&[("documentId", id.as_str())])
            .json(&Self::body(record)?);
        self.client.execute(request).await?;
        debug!("Added {}/{id}", self.name);
        Ok(id)
    }

    /// Create or overwrite the document `id`.
    pub async fn set(&self, id: &str, record: &T) -> PersistenceResult<()> {
        let request = self
            .client
            .http
            .patch(self.document_url(id)?)
            .json(&Self::body(record)?);
        self.client.execute(request).await?;
        debug!("Set {}/{id}", self.name);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> PersistenceResult<Option<T>> {
        let request = self.client.http.get(self.document_url(id)?);
        match self.client.execute(request).await {
            Ok(resp) => {
                let doc: Document = resp.json().await?;
                Self::decode(doc).map(Some)
            }
            Err(PersistenceError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let request = self.client.http.delete(self.document_url(id)?);
        self.client.execute(request).await?;
        Ok(())
    }

    /// Most recent `limit` documents, ordered by `order_by` descending.
    pub async fn latest(&self, order_by: &str, limit: u32) -> PersistenceResult<Vec<T>> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.name }],
                "orderBy": [{
                    "field": { "fieldPath": order_by },
                    "direction": "DESCENDING"
                }],
                "limit": limit
            }
        });
        let request = self
            .client
            .http
            .post(format!("{}:runQuery", self.client.documents_url))
            .json(&query);
        let rows: Vec<QueryRow> = self.client.execute(request).await?.json().await?;

        // Rows without a document only carry read metadata
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(Self::decode)
            .collect()
    }
}

fn emulator_root(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
