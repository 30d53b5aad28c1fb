//! 请求认证
//!
//! 默认使用 AWS 凭证链（环境变量、共享配置、实例角色等）做 SigV4 签名；
//! 配置了 Bearer Token 时改为发送 `Authorization: Bearer`。

use super::traits::{BackendError, BackendErrorKind};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningParams, SigningSettings};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Request;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// SageMaker Runtime 的签名服务名
pub const SAGEMAKER_SIGNING_NAME: &str = "sagemaker";
/// Bedrock Agent Runtime 的签名服务名
pub const AGENT_RUNTIME_SIGNING_NAME: &str = "bedrock";

/// 凭证到期前多久刷新
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// 请求认证方式
#[derive(Debug, Clone, Default)]
pub enum RequestAuth {
    /// 不附加认证（端点由签名代理提供）
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// AWS SigV4 签名
    SigV4(Arc<SigV4Signer>),
}

impl RequestAuth {
    /// 给已构建的请求附加认证信息
    pub async fn apply(&self, request: &mut Request) -> Result<(), BackendError> {
        match self {
            RequestAuth::None => Ok(()),
            RequestAuth::Bearer(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                    BackendError::new(
                        BackendErrorKind::Authentication,
                        format!("Bearer Token 不是合法的请求头: {}", e),
                    )
                })?;
                request.headers_mut().insert(AUTHORIZATION, value);
                Ok(())
            }
            RequestAuth::SigV4(signer) => signer.sign(request).await,
        }
    }
}

/// SigV4 签名器
///
/// 每个服务一个实例，共享同一个凭证提供者；凭证在到期前缓存复用。
#[derive(Debug)]
pub struct SigV4Signer {
    region: String,
    service: &'static str,
    provider: SharedCredentialsProvider,
    cached: Mutex<Option<Credentials>>,
}

impl SigV4Signer {
    pub fn new(
        provider: SharedCredentialsProvider,
        region: impl Into<String>,
        service: &'static str,
    ) -> Self {
        Self {
            region: region.into(),
            service,
            provider,
            cached: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// 使用当前时间签名
    pub async fn sign(&self, request: &mut Request) -> Result<(), BackendError> {
        let credentials = self.credentials().await?;
        self.sign_at(request, &credentials, SystemTime::now())
    }

    /// 使用指定凭证和时间签名
    pub fn sign_at(
        &self,
        request: &mut Request,
        credentials: &Credentials,
        time: SystemTime,
    ) -> Result<(), BackendError> {
        let identity: Identity = credentials.clone().into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(time)
            .settings(SigningSettings::default())
            .build()
            .map_err(signing_error)?
            .into();

        let instructions = {
            let headers: Vec<(&str, &str)> = request
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
                .collect();
            let body = request.body().and_then(|b| b.as_bytes()).unwrap_or(&[]);
            let signable = SignableRequest::new(
                request.method().as_str(),
                request.url().as_str(),
                headers.into_iter(),
                SignableBody::Bytes(body),
            )
            .map_err(signing_error)?;
            let (instructions, _signature) =
                sign(signable, &params).map_err(signing_error)?.into_parts();
            instructions
        };

        for (name, value) in instructions.headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(signing_error)?;
            let value = HeaderValue::from_str(value).map_err(signing_error)?;
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }

    async fn credentials(&self) -> Result<Credentials, BackendError> {
        let mut cached = self.cached.lock().await;
        if let Some(credentials) = cached.as_ref() {
            if !expiring(credentials, SystemTime::now()) {
                return Ok(credentials.clone());
            }
        }

        let fresh = self.provider.provide_credentials().await.map_err(|e| {
            BackendError::new(
                BackendErrorKind::Authentication,
                format!("获取 AWS 凭证失败: {}", e),
            )
        })?;
        tracing::debug!("[SIGV4] 已刷新凭证: service={}", self.service);
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

fn expiring(credentials: &Credentials, now: SystemTime) -> bool {
    credentials
        .expiry()
        .map(|expiry| expiry <= now + REFRESH_MARGIN)
        .unwrap_or(false)
}

fn signing_error(err: impl std::fmt::Display) -> BackendError {
    BackendError::new(
        BackendErrorKind::Authentication,
        format!("SigV4 签名失败: {}", err),
    )
}

/// 从默认凭证链加载凭证提供者
pub async fn default_credentials_provider(region: &str) -> Option<SharedCredentialsProvider> {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await
        .credentials_provider()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Client, Method};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::UNIX_EPOCH;

    fn credentials(expiry: Option<SystemTime>) -> Credentials {
        Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            Some("session-token".to_string()),
            expiry,
            "test",
        )
    }

    fn signer() -> SigV4Signer {
        SigV4Signer::new(
            SharedCredentialsProvider::new(credentials(None)),
            "us-east-1",
            AGENT_RUNTIME_SIGNING_NAME,
        )
    }

    fn request() -> Request {
        Client::new()
            .request(
                Method::POST,
                "https://bedrock-agent-runtime.us-east-1.amazonaws.com/flows/F/aliases/A",
            )
            .header("Content-Type", "application/json")
            .body(r#"{"inputs":[]}"#)
            .build()
            .unwrap()
    }

    fn header(request: &Request, name: &str) -> String {
        request
            .headers()
            .get(name)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_sign_at_adds_sigv4_headers() {
        let mut request = request();
        // 2024-01-02T03:04:05Z
        let time = UNIX_EPOCH + Duration::from_secs(1_704_164_645);
        signer()
            .sign_at(&mut request, &credentials(None), time)
            .unwrap();

        let authorization = header(&request, "authorization");
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240102/us-east-1/bedrock/aws4_request"
        ));
        assert!(authorization.contains("SignedHeaders="));
        assert!(authorization.contains("content-type"));
        assert!(authorization.contains("Signature="));
        assert_eq!(header(&request, "x-amz-date"), "20240102T030405Z");
        assert_eq!(header(&request, "x-amz-security-token"), "session-token");
    }

    #[test]
    fn test_signature_depends_on_body() {
        let time = UNIX_EPOCH + Duration::from_secs(1_704_164_645);
        let mut first = request();
        signer().sign_at(&mut first, &credentials(None), time).unwrap();

        let mut second = Client::new()
            .post("https://bedrock-agent-runtime.us-east-1.amazonaws.com/flows/F/aliases/A")
            .header("Content-Type", "application/json")
            .body(r#"{"inputs":[1]}"#)
            .build()
            .unwrap();
        signer().sign_at(&mut second, &credentials(None), time).unwrap();

        assert_ne!(
            header(&first, "authorization"),
            header(&second, "authorization")
        );
    }

    #[tokio::test]
    async fn test_bearer_overrides_signing() {
        let mut request = request();
        RequestAuth::Bearer("token-1".to_string())
            .apply(&mut request)
            .await
            .unwrap();
        assert_eq!(header(&request, "authorization"), "Bearer token-1");
        assert!(request.headers().get("x-amz-date").is_none());
    }

    #[tokio::test]
    async fn test_none_leaves_request_unsigned() {
        let mut request = request();
        RequestAuth::None.apply(&mut request).await.unwrap();
        assert!(request.headers().get("authorization").is_none());
    }

    #[derive(Debug)]
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        expiry: Option<SystemTime>,
    }

    impl ProvideCredentials for CountingProvider {
        fn provide_credentials<'a>(
            &'a self,
        ) -> aws_credential_types::provider::future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            aws_credential_types::provider::future::ProvideCredentials::ready(Ok(credentials(
                self.expiry,
            )))
        }
    }

    #[tokio::test]
    async fn test_credentials_cached_until_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let long_lived = SigV4Signer::new(
            SharedCredentialsProvider::new(CountingProvider {
                calls: calls.clone(),
                expiry: Some(SystemTime::now() + Duration::from_secs(3600)),
            }),
            "us-east-1",
            SAGEMAKER_SIGNING_NAME,
        );
        long_lived.sign(&mut request()).await.unwrap();
        long_lived.sign(&mut request()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let short_calls = Arc::new(AtomicUsize::new(0));
        let short_lived = SigV4Signer::new(
            SharedCredentialsProvider::new(CountingProvider {
                calls: short_calls.clone(),
                expiry: Some(SystemTime::now() + Duration::from_secs(60)),
            }),
            "us-east-1",
            SAGEMAKER_SIGNING_NAME,
        );
        short_lived.sign(&mut request()).await.unwrap();
        short_lived.sign(&mut request()).await.unwrap();
        assert_eq!(short_calls.load(Ordering::SeqCst), 2);
    }
}
