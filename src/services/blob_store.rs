//! Blob storage for uploaded file bytes.
//!
//! [`BlobStore`] is what the file service needs from object storage: write an
//! object with a content type and tags, and mint a time-limited read URL.
//! [`LocalBlobStore`] implements it on local disk, one directory per bucket,
//! with objects sharded beneath `base_path/{bucket}/{shard}/{shard}/{digest}`.
//! Every object has a JSON sidecar holding its key, content type, tags,
//! size and etag.
//!
//! Pre-signed URLs point at this service's `/blobs/{bucket}/{*key}` route and
//! carry an expiry plus an HMAC-SHA256 signature over method, bucket, key and
//! expiry. [`LocalBlobStore::open_signed`] checks both before handing out the
//! file.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Characters left as-is when a key is placed in a URL path.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("signature does not match")]
    SignatureMismatch,
    #[error("link expired")]
    Expired,
    #[error("signing key must not be empty")]
    InvalidSigningKey,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Sidecar metadata kept next to each object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlobMetadata {
    pub key: String,
    pub content_type: String,
    pub tags: BTreeMap<String, String>,
    pub size_bytes: u64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `body` under `key`, replacing any previous object.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        tags: BTreeMap<String, String>,
    ) -> BlobResult<()>;

    /// URL granting read access to `key` for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<String>;

    /// Write/read/delete round trip used by readiness probes.
    async fn probe(&self) -> BlobResult<()>;
}

/// Disk-backed blob store bound to a single bucket.
#[derive(Clone)]
pub struct LocalBlobStore {
    /// Root directory holding one subdirectory per bucket.
    pub base_path: PathBuf,

    pub bucket: String,

    /// Externally reachable base URL used when minting download links.
    pub public_url: String,

    /// HMAC keyed once at construction; cloned per signature.
    signer: HmacSha256,
}

impl LocalBlobStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_url: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> BlobResult<Self> {
        let bucket = bucket.into();
        ensure_bucket_name_safe(&bucket)?;

        let signing_key = signing_key.into();
        if signing_key.is_empty() {
            return Err(BlobStoreError::InvalidSigningKey);
        }
        let signer = HmacSha256::new_from_slice(&signing_key)
            .map_err(|_| BlobStoreError::InvalidSigningKey)?;

        Ok(Self {
            base_path: base_path.into(),
            bucket,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// Keys must be non-empty, within the S3 length limit and free of NUL.
    /// Other characters are fine since keys never become path components.
    fn ensure_key_safe(key: &str) -> BlobResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN || key.contains('\0') {
            return Err(BlobStoreError::InvalidObjectKey);
        }
        Ok(())
    }

    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    /// `bucket_root/{aa}/{bb}/{sha256(bucket/key)}`.
    fn object_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(format!("{}/{}", self.bucket, key)));
        let mut path = self.bucket_root();
        path.push(&digest[0..2]);
        path.push(&digest[2..4]);
        path.push(digest);
        path
    }

    fn sidecar_path(object_path: &Path) -> PathBuf {
        object_path.with_extension("meta.json")
    }

    fn sign(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.signer.clone();
        mac.update(format!("GET\n{}\n{}\n{}", self.bucket, key, expires).as_bytes());
        mac
    }

    /// Verify a pre-signed link and open the object it points to.
    ///
    /// The signature is compared in constant time before the expiry is
    /// checked, so a forged link never reveals whether it would have expired.
    pub async fn open_signed(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> BlobResult<(BlobMetadata, File)> {
        if bucket != self.bucket {
            return Err(BlobStoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Self::ensure_key_safe(key)?;

        let provided = hex::decode(signature).map_err(|_| BlobStoreError::SignatureMismatch)?;
        self.sign(key, expires)
            .verify_slice(&provided)
            .map_err(|_| BlobStoreError::SignatureMismatch)?;

        if expires < Utc::now().timestamp() {
            return Err(BlobStoreError::Expired);
        }

        self.open_object(key).await
    }

    async fn open_object(&self, key: &str) -> BlobResult<(BlobMetadata, File)> {
        let not_found = || BlobStoreError::ObjectNotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        };

        let object_path = self.object_path(key);
        let raw = match fs::read(Self::sidecar_path(&object_path)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };
        let meta: BlobMetadata = serde_json::from_slice(&raw)?;
        if meta.key != key {
            return Err(not_found());
        }

        let file = File::open(&object_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                not_found()
            } else {
                BlobStoreError::Io(err)
            }
        })?;

        Ok((meta, file))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    /// Writes go to a temp file that is fsynced and then renamed into place;
    /// the sidecar follows the same path once the payload is durable.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        tags: BTreeMap<String, String>,
    ) -> BlobResult<()> {
        Self::ensure_key_safe(key)?;

        let object_path = self.object_path(key);
        let parent = object_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        write_durably(&parent, &object_path, &body).await?;

        let meta = BlobMetadata {
            key: key.to_string(),
            content_type: content_type.to_string(),
            tags,
            size_bytes: body.len() as u64,
            etag: format!("{:x}", md5::compute(&body)),
            last_modified: Utc::now(),
        };
        let encoded = serde_json::to_vec(&meta)?;
        write_durably(&parent, &Self::sidecar_path(&object_path), &encoded).await?;

        debug!(bucket = %self.bucket, key, size = meta.size_bytes, "stored object");
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        Self::ensure_key_safe(key)?;

        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        let signature = hex::encode(self.sign(key, expires).finalize().into_bytes());

        Ok(format!(
            "{}/blobs/{}/{}?expires={}&signature={}",
            self.public_url,
            self.bucket,
            utf8_percent_encode(key, KEY_ENCODE_SET),
            expires,
            signature
        ))
    }

    async fn probe(&self) -> BlobResult<()> {
        let root = self.bucket_root();
        fs::create_dir_all(&root).await?;

        let tmp_path = root.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"probe").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await; // best-effort cleanup

        if read_back? != b"probe" {
            return Err(BlobStoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }
}

/// Write `data` to a temp file in `dir`, fsync, then rename onto `target`.
async fn write_durably(dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));

    let result: io::Result<()> = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, target).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn ensure_bucket_name_safe(name: &str) -> BlobResult<()> {
    let invalid = |reason: &str| BlobStoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-')
    {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|segment| !segment.is_empty() && segment.parse::<u8>().is_ok())
}
