// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cold tier: named blobs with string metadata in an object store

use crate::Result;
use crate::config::ColdConfig;
use crate::error::TieringError;
use async_trait::async_trait;
use bytes::Bytes;
use diagnostics::*;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::prefix::PrefixStore;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreScheme, PutOptions, PutPayload,
};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Per-object metadata (key → value strings)
pub type Metadata = BTreeMap<String, String>;

const SIDECAR_SUFFIX: &str = ".meta";

/// A fetched object with its metadata
#[derive(Debug, Clone)]
pub struct ColdObject {
    pub bytes: Bytes,
    pub metadata: Metadata,
}

impl ColdObject {
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Put/get/list/delete by name against the cold tier
///
/// `put` overwrites, `delete` of an absent name succeeds, and `get` of an
/// absent name is [`TieringError::NotFound`]. `list` is lazy and makes no
/// promise about objects written or deleted while it is being consumed.
#[async_trait]
pub trait ColdStore: Send + Sync {
    async fn put(&self, name: &str, payload: Bytes, metadata: Metadata) -> Result<()>;

    async fn get(&self, name: &str) -> Result<ColdObject>;

    fn list(&self) -> BoxStream<'_, Result<String>>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Where object metadata lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLayout {
    /// Native object attributes (S3 user metadata, Azure blob metadata, memory)
    Attributes,
    /// A JSON `<name>.meta` object next to each blob, for backends without metadata
    Sidecar,
}

/// [`ColdStore`] over any `object_store` backend
#[derive(Debug, Clone)]
pub struct ObjectColdStore {
    store: Arc<dyn ObjectStore>,
    layout: MetadataLayout,
}

impl ObjectColdStore {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, layout: MetadataLayout) -> Self {
        Self { store, layout }
    }

    /// Process-local store, used by tests and `memory://` URLs
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), MetadataLayout::Attributes)
    }

    /// Build the backend named by `cold.url`, rooted at the URL's path
    pub fn from_config(config: &ColdConfig) -> Result<Self> {
        let url = Url::parse(&config.url).map_err(|e| {
            TieringError::Configuration(format!("invalid cold.url '{}': {e}", config.url))
        })?;
        let (scheme, _) = ObjectStoreScheme::parse(&url).map_err(|e| {
            TieringError::Configuration(format!("unsupported cold.url '{}': {e}", config.url))
        })?;
        let (store, prefix) = object_store::parse_url_opts(&url, config.options.iter())
            .map_err(|e| {
                TieringError::Configuration(format!(
                    "cannot open cold store '{}': {e}",
                    config.url
                ))
            })?;

        let layout = match scheme {
            ObjectStoreScheme::Local => MetadataLayout::Sidecar,
            _ => MetadataLayout::Attributes,
        };

        let store: Arc<dyn ObjectStore> = Arc::from(store);
        let store: Arc<dyn ObjectStore> = if prefix.as_ref().is_empty() {
            store
        } else {
            Arc::new(PrefixStore::new(store, prefix))
        };

        info!(
            "opened cold store {url} with {layout} metadata",
            url: config.url.as_str(),
            layout: format!("{layout:?}")
        );
        Ok(Self::new(store, layout))
    }

    #[must_use]
    pub fn layout(&self) -> MetadataLayout {
        self.layout
    }

    async fn read_sidecar(&self, name: &str) -> Result<Metadata> {
        let path = object_path(&format!("{name}{SIDECAR_SUFFIX}"))?;
        match self.store.get(&path).await {
            Ok(result) => Ok(serde_json::from_slice(&result.bytes().await?)?),
            Err(object_store::Error::NotFound { .. }) => Ok(Metadata::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn object_path(name: &str) -> Result<Path> {
    Path::parse(name)
        .map_err(|e| TieringError::Validation(format!("invalid object name '{name}': {e}")))
}

#[async_trait]
impl ColdStore for ObjectColdStore {
    async fn put(&self, name: &str, payload: Bytes, metadata: Metadata) -> Result<()> {
        let path = object_path(name)?;
        debug!("put {name} ({size} bytes)", name: name, size: payload.len());

        match self.layout {
            MetadataLayout::Attributes => {
                let mut attributes = Attributes::new();
                for (key, value) in metadata {
                    attributes.insert(
                        Attribute::Metadata(Cow::Owned(key)),
                        AttributeValue::from(value),
                    );
                }
                let options = PutOptions {
                    attributes,
                    ..PutOptions::default()
                };
                self.store
                    .put_opts(&path, PutPayload::from(payload), options)
                    .await?;
            }
            MetadataLayout::Sidecar => {
                // Sidecar first: the blob must never be visible without its metadata
                let sidecar = object_path(&format!("{name}{SIDECAR_SUFFIX}"))?;
                self.store
                    .put(&sidecar, PutPayload::from(serde_json::to_vec(&metadata)?))
                    .await?;
                self.store.put(&path, PutPayload::from(payload)).await?;
            }
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ColdObject> {
        let path = object_path(name)?;
        let result = self.store.get(&path).await?;

        let metadata = match self.layout {
            MetadataLayout::Attributes => {
                let mut metadata = Metadata::new();
                for (attribute, value) in result.attributes.iter() {
                    if let Attribute::Metadata(key) = attribute {
                        let value: &str = value.as_ref();
                        metadata.insert(key.to_string(), value.to_string());
                    }
                }
                metadata
            }
            MetadataLayout::Sidecar => self.read_sidecar(name).await?,
        };

        let bytes = result.bytes().await?;
        debug!("get {name} ({size} bytes)", name: name, size: bytes.len());
        Ok(ColdObject { bytes, metadata })
    }

    fn list(&self) -> BoxStream<'_, Result<String>> {
        self.store
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .map_err(TieringError::from)
            .boxed()
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = object_path(name)?;
        let mut targets = vec![path];
        if self.layout == MetadataLayout::Sidecar {
            targets.push(object_path(&format!("{name}{SIDECAR_SUFFIX}"))?);
        }
        for target in targets {
            match self.store.delete(&target).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
