use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;

use super::ObjectStore;
use crate::config::S3Config;

pub struct S3Store {
    client: Client,
    bucket: String,
    expiry: Duration,
}

impl S3Store {
    pub async fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "openbrief-config",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            expiry: Duration::from_secs(config.sign_expiry_secs),
        }
    }

    fn presigning(&self) -> Result<PresigningConfig, String> {
        PresigningConfig::expires_in(self.expiry).map_err(|e| format!("Invalid presign expiry: {e}"))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload_url(&self, key: &str) -> Result<String, String> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(self.presigning()?)
            .await
            .map_err(|e| format!("Failed to presign upload: {e}"))?;
        Ok(request.uri().to_string())
    }

    async fn download_url(&self, key: &str) -> Result<String, String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(self.presigning()?)
            .await
            .map_err(|e| format!("Failed to presign download: {e}"))?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| format!("Failed to delete {key}: {e}"))?;
        Ok(())
    }
}
