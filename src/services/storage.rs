//! S3 storage service for finding artifacts.
//!
//! Signature images and attachment files are uploaded here before the
//! finding record is inserted. Supports both AWS S3 and MinIO for
//! development.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::info;

use crate::config::S3Config;
use crate::error::{AppError, AppResult};
use crate::services::submission::BlobStore;

/// S3 storage client wrapper.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl Storage {
    /// Create a new S3 storage client from configuration.
    pub async fn new(config: &S3Config) -> AppResult<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "findings",
        );

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .force_path_style(true); // Required for MinIO

        // Use custom endpoint for MinIO in development
        if let Some(ref endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let s3_config = s3_config_builder.build();
        let client = Client::from_conf(s3_config);

        let storage = Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        // Verify bucket exists or create it
        storage.ensure_bucket_exists().await?;

        info!("S3 storage initialized: bucket={}", config.bucket);

        Ok(storage)
    }

    /// Ensure the bucket exists, creating it if necessary.
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("S3 bucket '{}' exists", self.bucket);
                Ok(())
            }
            Err(e) => {
                // Check if it's a "not found" error
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    info!("Creating S3 bucket '{}'", self.bucket);
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(|e| {
                            AppError::Storage(format!("Failed to create bucket: {}", e))
                        })?;
                    info!("S3 bucket '{}' created", self.bucket);
                    Ok(())
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to access bucket '{}': {}",
                        self.bucket, service_error
                    )))
                }
            }
        }
    }

    /// Upload an object to S3, returning the stored key.
    ///
    /// # Arguments
    /// * `key` - The S3 object key where the object will be uploaded
    /// * `data` - The object contents as bytes
    /// * `content_type` - Optional content type for the upload
    pub async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<String> {
        let body = aws_sdk_s3::primitives::ByteStream::from(data);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload object to S3: {}", e)))?;

        Ok(key.to_string())
    }

    /// Public URL for a stored object.
    ///
    /// Custom endpoints (MinIO) use path-style addressing; plain AWS uses
    /// virtual-hosted-style.
    pub fn public_url(&self, path: &str) -> String {
        public_url_for(self.endpoint.as_deref(), &self.bucket, &self.region, path)
    }
}

fn public_url_for(endpoint: Option<&str>, bucket: &str, region: &str, path: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, path),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, path),
    }
}

#[async_trait::async_trait]
impl BlobStore for Storage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<String> {
        self.put(key, data, content_type).await
    }

    fn public_url(&self, path: &str) -> String {
        Storage::public_url(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_path_style_for_custom_endpoint() {
        let url = public_url_for(
            Some("http://localhost:9100"),
            "findings",
            "us-east-1",
            "signatures/1700000000000.png",
        );
        assert_eq!(
            url,
            "http://localhost:9100/findings/signatures/1700000000000.png"
        );
    }

    #[test]
    fn test_public_url_trims_trailing_slash() {
        let url = public_url_for(Some("http://localhost:9100/"), "findings", "us-east-1", "k");
        assert_eq!(url, "http://localhost:9100/findings/k");
    }

    #[test]
    fn test_public_url_virtual_hosted_for_aws() {
        let url = public_url_for(None, "prod-findings", "us-west-2", "files/1-a.png");
        assert_eq!(
            url,
            "https://prod-findings.s3.us-west-2.amazonaws.com/files/1-a.png"
        );
    }
}
