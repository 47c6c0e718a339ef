use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{
    ActionBackend, ActionTarget, BackendError, CommitResponse, SendOtpRequest, SendOtpResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::config::BackendConfig;
use crate::workflow::Confirmation;

/// REST backend. Every action uses the same route layout:
///
/// ```text
/// POST {base}/{orders|schemes}/{id}/{action}/send-otp
/// POST {base}/{orders|schemes}/{id}/{action}/verify-otp
/// POST {base}/{orders|schemes}/{id}/{action}/confirm
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, requests_per_second: u32, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(per_second);

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::new(
            config.base_url.clone(),
            config.requests_per_second,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, target: &ActionTarget, step: &str) -> String {
        let (collection, action) = target.action.route();
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url, collection, target.id, action, step
        )
    }

    async fn post<B, T>(&self, url: String, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        debug!(url = %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .unwrap_or(body);
            return Err(BackendError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ActionBackend for HttpBackend {
    async fn send_otp(
        &self,
        target: &ActionTarget,
        request: &SendOtpRequest,
    ) -> Result<SendOtpResponse, BackendError> {
        self.post(self.url(target, "send-otp"), request).await
    }

    async fn verify_otp(
        &self,
        target: &ActionTarget,
        request: &VerifyOtpRequest,
    ) -> Result<VerifyOtpResponse, BackendError> {
        self.post(self.url(target, "verify-otp"), request).await
    }

    async fn commit(
        &self,
        target: &ActionTarget,
        confirmation: &Confirmation,
    ) -> Result<CommitResponse, BackendError> {
        self.post(self.url(target, "confirm"), confirmation).await
    }
}
