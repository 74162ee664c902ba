//! etcd v3 backend

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, GetOptions, KvClient};
use std::time::Duration;
use tracing::{debug, info};

use super::{KeySnapshot, RevisionedStore};
use crate::error::{HistoryError, StoreError};
use crate::types::Credentials;

/// Store client backed by an etcd cluster
#[derive(Clone)]
pub struct EtcdStore {
    kv: KvClient,
}

impl EtcdStore {
    /// Connect to `endpoints`, authenticating when credentials are given
    pub async fn connect(
        endpoints: &[String],
        credentials: Option<&Credentials>,
        dial_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, HistoryError> {
        let mut options = ConnectOptions::new()
            .with_connect_timeout(dial_timeout)
            .with_timeout(request_timeout);
        if let Some(creds) = credentials {
            options = options.with_user(creds.username.clone(), creds.password.clone());
        }

        debug!(?endpoints, authenticated = credentials.is_some(), "Connecting to etcd");
        let client = Client::connect(endpoints, Some(options))
            .await
            .map_err(|e| HistoryError::Connection(e.to_string()))?;
        info!(?endpoints, "Connected to etcd");

        Ok(Self { kv: client.kv_client() })
    }
}

#[async_trait]
impl RevisionedStore for EtcdStore {
    async fn get(&self, key: &str, revision: Option<i64>) -> Result<Option<KeySnapshot>, StoreError> {
        let options = revision.map(|rev| GetOptions::new().with_revision(rev));

        // KvClient is a cheap handle over a shared channel
        let mut kv = self.kv.clone();
        let resp = kv.get(key, options).await.map_err(map_etcd_error)?;

        Ok(resp.kvs().first().map(|kv| KeySnapshot {
            value: kv.value().to_vec(),
            version: kv.version(),
            create_revision: kv.create_revision(),
            mod_revision: kv.mod_revision(),
        }))
    }
}

fn map_etcd_error(err: etcd_client::Error) -> StoreError {
    match err {
        etcd_client::Error::TransportError(e) => StoreError::Unavailable(e.to_string()),
        etcd_client::Error::IoError(e) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Request(other.to_string()),
    }
}
