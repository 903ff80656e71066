//! S3 object backend

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials as SdkCredentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;

use super::{BackendError, ObjectBackend, ObjectBody, ObjectHead};
use crate::config::ResolvedConfig;
use crate::error::Result as FetcherResult;
use crate::tls;

const PROVIDER_NAME: &str = "s3-poll-fetcher";

/// S3 implementation of [`ObjectBackend`]
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: S3Client,
}

impl S3Backend {
    /// Build a client from resolved config. Does not touch the network.
    pub async fn from_config(config: &ResolvedConfig) -> FetcherResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        loader = match config.credentials.key_pair() {
            Some(pair) => loader.credentials_provider(SdkCredentials::new(
                pair.access_key.clone(),
                pair.secret_key.clone(),
                pair.session_token.clone(),
                None,
                PROVIDER_NAME,
            )),
            None => loader.no_credentials(),
        };

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if config.use_embedded_cert {
            loader = tls::with_embedded_roots(loader)?;
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(
            region = %config.region,
            credentials = config.credentials.source(),
            embedded_cert = config.use_embedded_cert,
            "Built S3 client"
        );

        Ok(Self::from_client(S3Client::from_conf(s3_config)))
    }

    /// Wrap a pre-built client
    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, BackendError> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;

        Ok(ObjectHead {
            e_tag: response.e_tag().map(String::from),
            content_encoding: response.content_encoding().map(String::from),
            content_length: response.content_length(),
            last_modified: response.last_modified().map(|dt| dt.to_string()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, BackendError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;

        Ok(ObjectBody {
            content_encoding: response.content_encoding().map(String::from),
            content_length: response.content_length(),
            body: Box::pin(response.body.into_async_read()),
        })
    }
}

fn sdk_error<E: std::error::Error>(err: &E) -> BackendError {
    DisplayErrorContext(err).to_string().into()
}
