//! S3-compatible adapter built on the `rust-s3` client.

use std::fmt;
use std::io;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use s3::bucket_ops::BucketConfiguration;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use super::{ObjectBody, ObjectListing, ObjectMetadata, ObjectStore};

/// Connection settings for [`S3Store`]. Credentials are never serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct S3StoreConfig {
    /// Host or URL of the endpoint. A bare host gets a scheme from `use_http`.
    pub endpoint: String,
    pub region: String,
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
    pub use_http: bool,
    pub path_style: bool,
    /// Reuse connections between requests. When off, every request asks the
    /// server to close the connection after answering.
    pub keep_alive: bool,
}

/// `User-Agent` sent with every request, matching the `source` metric tag.
pub const USER_AGENT: &str = "s3pt";

impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::defaults::ENDPOINT.to_string(),
            region: crate::defaults::REGION.to_string(),
            access_key: None,
            secret_key: None,
            use_http: false,
            path_style: false,
            keep_alive: true,
        }
    }
}

impl fmt::Debug for S3StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("use_http", &self.use_http)
            .field("path_style", &self.path_style)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

impl S3StoreConfig {
    /// Endpoint with an explicit scheme.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.use_http {
            format!("http://{}", self.endpoint)
        } else {
            format!("https://{}", self.endpoint)
        }
    }
}

/// Object store speaking the S3 REST API.
///
/// All requests go through one HTTP client. It belongs to a template bucket
/// handle built once in [`S3Store::new`]; per-bucket handles are clones of
/// it with the name swapped, so they share the client and its pool.
pub struct S3Store {
    template: Box<Bucket>,
    region: Region,
    credentials: Credentials,
}

impl S3Store {
    pub fn new(config: &S3StoreConfig) -> Result<Self> {
        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => Credentials::new(
                Some(access_key.as_str()),
                Some(secret_key.as_str()),
                None,
                None,
                None,
            )?,
            _ => {
                warn!("No access/secret key configured, sending anonymous requests");
                Credentials::anonymous()?
            }
        };
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint_url(),
        };

        let mut template = Bucket::new("", region.clone(), credentials.clone())?;
        if config.path_style {
            template.set_path_style();
        }
        template.add_header("user-agent", USER_AGENT);
        if !config.keep_alive {
            template.add_header("connection", "close");
        }

        Ok(Self {
            template,
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Box<Bucket> {
        let mut bucket = self.template.clone();
        bucket.name = name.to_string();
        bucket
    }
}

impl fmt::Debug for S3Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Store")
            .field("endpoint", &self.region.endpoint())
            .field("path_style", &self.template.is_path_style())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, bucket: &str, key: &str, mut body: ObjectBody, length: u64) -> Result<()> {
        debug!("PUT {}/{} ({} bytes)", bucket, key, length);
        self.bucket(bucket).put_object_stream(&mut body, key).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        debug!("GET {}/{}", bucket, key);
        let response = self.bucket(bucket).get_object_stream(key).await?;
        let bytes = response
            .bytes
            .map_err(|e| io::Error::other(e.to_string()));
        Ok(Box::new(StreamReader::new(bytes)))
    }

    async fn get_object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        debug!("HEAD {}/{}", bucket, key);
        let (head, _status) = self.bucket(bucket).head_object(key).await?;
        Ok(ObjectMetadata {
            content_length: head.content_length.unwrap_or(0).max(0) as u64,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!("DELETE {}/{}", bucket, key);
        self.bucket(bucket).delete_object(key).await?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, continuation: Option<String>) -> Result<ObjectListing> {
        let (page, _status) = self
            .bucket(bucket)
            .list_page(String::new(), None, continuation, None, None)
            .await?;

        Ok(ObjectListing {
            keys: page.contents.into_iter().map(|object| object.key).collect(),
            is_truncated: page.is_truncated,
            next_continuation: page.next_continuation_token,
        })
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let config = BucketConfiguration::default();
        // Bucket creation has no template-based form and builds its own client.
        let response = if self.template.is_path_style() {
            Bucket::create_with_path_style(bucket, self.region.clone(), self.credentials.clone(), config)
                .await?
        } else {
            Bucket::create(bucket, self.region.clone(), self.credentials.clone(), config).await?
        };
        if !response.success() {
            anyhow::bail!(
                "create bucket '{}' answered {}: {}",
                bucket,
                response.response_code,
                response.response_text
            );
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.bucket(bucket).delete().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_endpoint_scheme_follows_use_http() {
        let mut config = S3StoreConfig {
            endpoint: "minio.local:9000".to_string(),
            ..S3StoreConfig::default()
        };
        assert_eq!(config.endpoint_url(), "https://minio.local:9000");

        config.use_http = true;
        assert_eq!(config.endpoint_url(), "http://minio.local:9000");

        config.endpoint = "https://already.example".to_string();
        assert_eq!(config.endpoint_url(), "https://already.example");
    }

    #[test]
    fn test_credentials_are_not_leaked() {
        let config = S3StoreConfig {
            access_key: Some("AKIA".to_string()),
            secret_key: Some("shh".to_string()),
            ..S3StoreConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("AKIA"));
        assert!(!json.contains("shh"));
        assert!(!format!("{:?}", config).contains("shh"));
    }

    #[test]
    fn test_default_points_at_aws() {
        let config = S3StoreConfig::default();
        assert_eq!(config.endpoint_url(), "https://s3.amazonaws.com");
        assert_eq!(config.region, "us-east-1");
        assert!(config.keep_alive);
    }

    #[test]
    fn test_bucket_handles_share_one_http_client() {
        let config = S3StoreConfig {
            endpoint: "minio.local:9000".to_string(),
            use_http: true,
            path_style: true,
            ..S3StoreConfig::default()
        };
        let store = S3Store::new(&config).unwrap();

        let first = store.bucket("results");
        let second = store.bucket("scratch");
        assert!(Arc::ptr_eq(&first.http_client(), &second.http_client()));
        assert!(Arc::ptr_eq(&first.http_client(), &store.template.http_client()));
        assert_eq!(first.name, "results");
        assert_eq!(second.name, "scratch");
        assert!(second.is_path_style());
    }

    #[test]
    fn test_requests_identify_themselves() {
        let store = S3Store::new(&S3StoreConfig::default()).unwrap();
        let headers = store.bucket("bench").extra_headers().clone();
        assert_eq!(headers.get("user-agent").unwrap().to_str().unwrap(), USER_AGENT);
        assert!(headers.get("connection").is_none());
    }

    #[tokio::test]
    async fn test_get_object_streams_the_body() {
        let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/bench/object-1")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let config = S3StoreConfig {
            endpoint: server.host_with_port(),
            use_http: true,
            path_style: true,
            ..S3StoreConfig::default()
        };
        let store = S3Store::new(&config).unwrap();

        let mut reader = store.get_object("bench", "object-1").await.unwrap();
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, body);
        mock.assert_async().await;
    }

    #[test]
    fn test_disabled_keep_alive_closes_connections() {
        let config = S3StoreConfig {
            keep_alive: false,
            ..S3StoreConfig::default()
        };
        let store = S3Store::new(&config).unwrap();
        let headers = store.bucket("bench").extra_headers().clone();
        assert_eq!(headers.get("connection").unwrap().to_str().unwrap(), "close");
        assert!(format!("{:?}", config).contains("keep_alive: false"));
    }
}
