//! Content Archive Service
//!
//! Proof package를 content-addressed 저장소(IPFS)에 업로드하고 CID로 다시 가져온다.
//!
//! # Interview Q&A
//!
//! Q: 업로드 실패가 왜 치명적이지 않은가?
//! A: Commitment의 유효성은 on-chain anchor와 DB 기록으로 충분
//!    - 저장소는 감사용 off-chain 증거 (best-effort)
//!    - 실패 시 CID 없이 진행, orchestrator가 `Option`으로 분기
//!
//! Q: 세션은 어떻게 관리하는가?
//! A: `Session { expires_at }` 값으로 명시적 모델링
//!    - `ensure_session`은 `now > expires_at`일 때만 재연결
//!    - 인증 실패(401/403) 응답을 받으면 세션을 버리고 다음 요청에서 재연결

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::ProofPackage;

pub const DEFAULT_GATEWAY_TEMPLATE: &str = "https://{cid}.ipfs.w3s.link";

/// 업로드 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveReceipt {
    pub cid: String,
    pub url: String,
    pub size: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid content identifier: {0:?}")]
    InvalidCid(String),

    #[error("archive session failed: {0}")]
    Session(String),

    #[error("archive upload failed: {0}")]
    Upload(String),

    #[error("content not found: {0}")]
    NotFound(String),

    #[error("archive fetch failed: {0}")]
    Fetch(String),

    #[error("archive step timed out after {0:?}")]
    Timeout(Duration),

    #[error("archived payload is not a proof package: {0}")]
    Decode(String),
}

/// Content-addressed 저장소 capability
#[async_trait]
pub trait ProofArchive: Send + Sync {
    async fn upload_json(
        &self,
        package: &ProofPackage,
        filename: &str,
    ) -> Result<ArchiveReceipt, ArchiveError>;

    async fn retrieve_json(&self, cid: &str) -> Result<ProofPackage, ArchiveError>;

    fn gateway_url(&self, cid: &str) -> String;
}

/// 저장소 설정
#[derive(Clone)]
pub struct ArchiveConfig {
    /// IPFS HTTP RPC endpoint (Kubo 호환)
    pub api_url: String,
    pub api_token: Option<String>,
    /// `{cid}` 자리표시자를 포함한 gateway URL
    pub gateway_template: String,
    pub session_ttl: Duration,
    /// 각 네트워크 단계의 최대 시간
    pub step_timeout: Duration,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            api_token: None,
            gateway_template: DEFAULT_GATEWAY_TEMPLATE.to_string(),
            session_ttl: Duration::from_secs(900),
            step_timeout: Duration::from_millis(45_000),
        }
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("gateway_template", &self.gateway_template)
            .field("session_ttl", &self.session_ttl)
            .field("step_timeout", &self.step_timeout)
            .finish()
    }
}

/// 저장소 세션
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub node_id: String,
    pub established_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(node_id: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            node_id,
            established_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// 유효한 세션이 있으면 그대로, 없거나 만료되었으면 `open`으로 새 세션
pub async fn ensure_session<F, Fut>(
    current: Option<Session>,
    now: DateTime<Utc>,
    open: F,
) -> Result<Session, ArchiveError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Session, ArchiveError>>,
{
    match current {
        Some(session) if !session.is_expired(now) => Ok(session),
        _ => open().await,
    }
}

/// CID 형식 검사 (URL에 삽입되기 전)
pub fn validate_cid(cid: &str) -> Result<&str, ArchiveError> {
    let trimmed = cid.trim();
    if trimmed.is_empty()
        || trimmed.len() > 128
        || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ArchiveError::InvalidCid(cid.to_string()));
    }
    Ok(trimmed)
}

fn render_gateway_url(template: &str, cid: &str) -> String {
    if template.contains("{cid}") {
        template.replace("{cid}", cid)
    } else {
        format!("{}/ipfs/{}", template.trim_end_matches('/'), cid)
    }
}

/// `/api/v0/id` 응답
#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
}

/// `/api/v0/add` 응답 (Size는 문자열)
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    size: Option<String>,
}

/// IPFS HTTP RPC 기반 저장소
pub struct IpfsArchive {
    config: ArchiveConfig,
    client: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl IpfsArchive {
    pub fn new(config: ArchiveConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.step_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            session: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn step<T, Fut>(&self, fut: Fut) -> Result<T, ArchiveError>
    where
        Fut: Future<Output = Result<T, ArchiveError>>,
    {
        tokio::time::timeout(self.config.step_timeout, fut)
            .await
            .map_err(|_| ArchiveError::Timeout(self.config.step_timeout))?
    }

    async fn open_session(&self) -> Result<Session, ArchiveError> {
        let request = self.authorized(self.client.post(self.endpoint("id")));

        let response = self
            .step(async {
                request
                    .send()
                    .await
                    .map_err(|e| ArchiveError::Session(e.to_string()))
            })
            .await?;
        if !response.status().is_success() {
            return Err(ArchiveError::Session(format!("status {}", response.status())));
        }

        let identity: IdResponse = response
            .json()
            .await
            .map_err(|e| ArchiveError::Session(e.to_string()))?;

        tracing::info!(node_id = %identity.id, "Archive session established");
        Ok(Session::new(identity.id, Utc::now(), self.config.session_ttl))
    }

    async fn current_session(&self) -> Result<Session, ArchiveError> {
        let mut guard = self.session.lock().await;
        let session = ensure_session(guard.clone(), Utc::now(), || self.open_session()).await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn drop_session(&self) {
        *self.session.lock().await = None;
    }
}

#[async_trait]
impl ProofArchive for IpfsArchive {
    async fn upload_json(
        &self,
        package: &ProofPackage,
        filename: &str,
    ) -> Result<ArchiveReceipt, ArchiveError> {
        let session = self.current_session().await?;

        let body =
            serde_json::to_vec_pretty(package).map_err(|e| ArchiveError::Upload(e.to_string()))?;
        let part = multipart::Part::bytes(body)
            .file_name(filename.to_string())
            .mime_str("application/json")
            .map_err(|e| ArchiveError::Upload(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let request = self.authorized(
            self.client
                .post(self.endpoint("add"))
                .query(&[("pin", "true"), ("cid-version", "1")])
                .multipart(form),
        );

        let response = self
            .step(async {
                request
                    .send()
                    .await
                    .map_err(|e| ArchiveError::Upload(e.to_string()))
            })
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.drop_session().await;
            return Err(ArchiveError::Upload(format!("rejected with status {}", status)));
        }
        if !status.is_success() {
            return Err(ArchiveError::Upload(format!("status {}", status)));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| ArchiveError::Upload(e.to_string()))?;
        let cid = validate_cid(&added.hash)?.to_string();

        tracing::info!(
            cid = %cid,
            name = %added.name,
            node_id = %session.node_id,
            "Proof package archived"
        );

        Ok(ArchiveReceipt {
            url: self.gateway_url(&cid),
            size: added.size.and_then(|s| s.parse().ok()),
            cid,
        })
    }

    async fn retrieve_json(&self, cid: &str) -> Result<ProofPackage, ArchiveError> {
        let cid = validate_cid(cid)?;
        let url = self.gateway_url(cid);

        let response = self
            .step(async {
                self.client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| ArchiveError::Fetch(e.to_string()))
            })
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ArchiveError::NotFound(cid.to_string())),
            status if !status.is_success() => {
                return Err(ArchiveError::Fetch(format!("status {}", status)))
            }
            _ => {}
        }

        let bytes = self
            .step(async {
                response
                    .bytes()
                    .await
                    .map_err(|e| ArchiveError::Fetch(e.to_string()))
            })
            .await?;

        serde_json::from_slice(&bytes).map_err(|e| ArchiveError::Decode(e.to_string()))
    }

    fn gateway_url(&self, cid: &str) -> String {
        render_gateway_url(&self.config.gateway_template, cid)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session_at(now: DateTime<Utc>) -> Session {
        Session::new("12D3KooWnode".to_string(), now, Duration::from_secs(900))
    }

    #[test]
    fn test_session_expiry_boundary() {
        let now = Utc::now();
        let session = session_at(now);

        assert!(!session.is_expired(now));
        assert!(!session.is_expired(session.expires_at));
        assert!(session.is_expired(session.expires_at + chrono::Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_ensure_session_reuses_live_session() {
        let now = Utc::now();
        let counter = AtomicUsize::new(0);
        let opened = &counter;
        let open = move || async move {
            opened.fetch_add(1, Ordering::SeqCst);
            Ok(session_at(Utc::now()))
        };

        let session = ensure_session(Some(session_at(now)), now, open).await.unwrap();

        assert_eq!(session.established_at, now);
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_session_reopens_after_expiry() {
        let then = Utc::now() - chrono::Duration::seconds(1000);
        let counter = AtomicUsize::new(0);
        let opened = &counter;

        let stale = session_at(then);
        let session = ensure_session(Some(stale.clone()), Utc::now(), move || async move {
            opened.fetch_add(1, Ordering::SeqCst);
            Ok(session_at(Utc::now()))
        })
        .await
        .unwrap();

        assert_ne!(session, stale);
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        let fresh = ensure_session(None, Utc::now(), || async {
            Err(ArchiveError::Session("offline".to_string()))
        })
        .await;
        assert!(matches!(fresh, Err(ArchiveError::Session(_))));
    }

    #[test]
    fn test_validate_cid() {
        assert_eq!(
            validate_cid("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap(),
            "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
        );
        assert!(validate_cid("").is_err());
        assert!(validate_cid("bafy/../../etc").is_err());
        assert!(validate_cid("bafy?x=1").is_err());
    }

    #[test]
    fn test_gateway_url_rendering() {
        assert_eq!(
            render_gateway_url(DEFAULT_GATEWAY_TEMPLATE, "bafyabc"),
            "https://bafyabc.ipfs.w3s.link"
        );
        assert_eq!(
            render_gateway_url("https://ipfs.io/", "bafyabc"),
            "https://ipfs.io/ipfs/bafyabc"
        );
    }

    #[test]
    fn test_add_response_parsing() {
        let raw = r#"{"Name":"verification-1.json","Hash":"bafkreiabc","Size":"1234"}"#;
        let added: AddResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(added.hash, "bafkreiabc");
        assert_eq!(added.size.and_then(|s| s.parse::<u64>().ok()), Some(1234));
    }

    #[test]
    fn test_default_config() {
        let config = ArchiveConfig::default();
        assert_eq!(config.session_ttl, Duration::from_secs(900));
        assert_eq!(config.step_timeout, Duration::from_millis(45_000));
        assert!(config.gateway_template.contains("{cid}"));
    }

    #[tokio::test]
    async fn test_ipfs_archive_rejects_bad_cid_before_network() {
        let archive = IpfsArchive::new(ArchiveConfig::default()).unwrap();

        let err = archive.retrieve_json("../secret").await.unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidCid(_)));
    }
}
