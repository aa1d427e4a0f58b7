use std::env;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chrono::Utc;

use crate::{BlobError, BlobResult, BlobStore, ObjectHead, SignedTarget, SignedUrlBlobStore};

/// S3-compatible storage configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base for read URLs; defaults to `{endpoint}/{bucket}`
    pub public_base_url: Option<String>,
    /// Required by most self-hosted S3-compatible servers
    pub force_path_style: bool,
}

impl S3Config {
    /// Read `S3_BUCKET`, `S3_REGION`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`
    /// and the optional `S3_ENDPOINT_URL`, `S3_PUBLIC_BASE_URL`.
    pub fn from_env() -> BlobResult<Self> {
        fn required(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        let endpoint_url = env::var("S3_ENDPOINT_URL").ok();
        Ok(Self {
            bucket: required("S3_BUCKET")?,
            region: required("S3_REGION")?,
            access_key_id: required("S3_ACCESS_KEY_ID")?,
            secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            public_base_url: env::var("S3_PUBLIC_BASE_URL").ok(),
            force_path_style: endpoint_url.is_some(),
            endpoint_url,
        })
    }

    fn read_base(&self) -> String {
        if let Some(base) = &self.public_base_url {
            return base.trim_end_matches('/').to_string();
        }
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// Blob store backed by any S3-compatible service, writing through presigned PUTs
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
    read_base: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "quill",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let aws_config = loader.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            read_base: config.read_base(),
        }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(head) => Ok(ObjectHead {
                size_bytes: head.content_length().unwrap_or(0).max(0) as u64,
                content_type: head.content_type().map(str::to_string),
                etag: head.e_tag().map(str::to_string),
                last_modified: head.last_modified().map(|t| t.secs()),
            }),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);
                if missing {
                    Err(BlobError::not_found(key))
                } else {
                    Err(Self::map_aws_error(err))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.read_base, key)
    }
}

#[async_trait]
impl SignedUrlBlobStore for S3CompatibleStore {
    async fn sign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in_secs: u64,
    ) -> BlobResult<SignedTarget> {
        let expires_at = SignedTarget::expiry_after(Utc::now(), expires_in_secs)?;
        let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_in_secs))
            .map_err(Self::map_aws_error)?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .presigned(presigning)
            .await
            .map_err(Self::map_aws_error)?;

        let mut target = SignedTarget {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            headers: Vec::new(),
            expires_at,
        };
        for (name, value) in presigned.headers() {
            target = target.with_header(name, value);
        }
        Ok(target)
    }
}
