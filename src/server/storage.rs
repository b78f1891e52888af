//! Asset persistence on `object_store`: a local directory or any S3 compatible bucket.
use super::config::{StoreBackend, StoreConfig};
use crate::orchestrator::BlobStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path, Attribute, Attributes, ObjectStore, PutOptions,
    PutPayload,
};
use std::sync::Arc;

pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    // LocalFileSystem rejects put attributes
    content_type_attribute: bool,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        ObjectBlobStore {
            store,
            public_base_url: public_base_url.into(),
            content_type_attribute: true,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match &config.backend {
            StoreBackend::Local { directory } => {
                std::fs::create_dir_all(directory)
                    .with_context(|| format!("Could not create asset directory {}", directory.display()))?;
                let store = LocalFileSystem::new_with_prefix(directory)
                    .with_context(|| format!("Could not open asset directory {}", directory.display()))?;
                tracing::info!(directory = %directory.display(), "asset store: local");
                Ok(ObjectBlobStore {
                    store: Arc::new(store),
                    public_base_url: config.public_base_url.clone(),
                    content_type_attribute: false,
                })
            }
            StoreBackend::S3 {
                bucket,
                endpoint,
                region,
                access_key_id,
                secret_access_key,
            } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(endpoint) = endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let (Some(key), Some(secret)) = (access_key_id, secret_access_key) {
                    builder = builder.with_access_key_id(key).with_secret_access_key(secret);
                }
                let store = builder
                    .build()
                    .with_context(|| format!("Could not configure bucket {bucket}"))?;
                tracing::info!(%bucket, "asset store: s3");
                Ok(Self::new(Arc::new(store), config.public_base_url.clone()))
            }
        }
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let location = Path::parse(key).with_context(|| format!("Invalid asset key {key}"))?;
        let mut attributes = Attributes::new();
        if self.content_type_attribute {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await?;
        tracing::debug!(%key, %content_type, "asset stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}
