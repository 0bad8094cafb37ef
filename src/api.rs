use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{
    AccountDetails, Envelope, PaymentRecord, ServiceDetails, ServiceSettings, ServiceSummary,
    TokenGrant,
};

/// Query window for `/service/{svcId}/payment/history`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentHistoryQuery {
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub rows: u32,
    pub offset: u32,
}

/// The remote account service. Every call is a single request/response;
/// `bearer` is the caller's current access token.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn request_otp(&self, phone_number: &str) -> Result<()>;

    async fn validate_otp(&self, phone_number: &str, otp: &str) -> Result<TokenGrant>;

    async fn refresh_token(&self, bearer: &str, refresh_token: &str) -> Result<TokenGrant>;

    async fn list_services(&self, bearer: &str) -> Result<Vec<ServiceSummary>>;

    async fn service_details(&self, bearer: &str, svc_id: &str) -> Result<ServiceDetails>;

    async fn payment_history(
        &self,
        bearer: &str,
        svc_id: &str,
        query: &PaymentHistoryQuery,
    ) -> Result<Vec<PaymentRecord>>;

    async fn service_settings(&self, bearer: &str, svc_id: &str) -> Result<ServiceSettings>;

    async fn update_service_settings(
        &self,
        bearer: &str,
        svc_id: &str,
        settings: &ServiceSettings,
    ) -> Result<ServiceSettings>;

    async fn account_details(&self, bearer: &str) -> Result<Vec<AccountDetails>>;
}

#[derive(Debug, Clone)]
pub struct HttpAccountApi {
    client: Client,
    base_url: Url,
}

impl HttpAccountApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("Failed to build URL for {}: {}", path, e)))
    }

    fn service_endpoint(&self, svc_id: &str, suffix: &str) -> Result<Url> {
        let encoded = urlencoding::encode(svc_id);
        self.endpoint(&format!("service/{}{}", encoded, suffix))
    }

    /// Send a request and unwrap the `{code, message, data}` envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            log::warn!("{} request failed: {}", what, e);
            ClientError::Network(e)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            log::warn!("{} returned 401, session is no longer valid", what);
            return Err(ClientError::SessionExpired);
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            log::warn!("Failed to decode {} response (HTTP {}): {}", what, status, e);
            ClientError::Network(e)
        })?;

        if envelope.code != 0 {
            log::info!(
                "{} rejected with code {}: {}",
                what,
                envelope.code,
                envelope.message
            );
            return Err(ClientError::Service {
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope
            .data
            .ok_or_else(|| ClientError::service(0, format!("{} returned no data", what)))
    }

    /// Like `send`, for endpoints whose payload the client ignores
    async fn send_ack(&self, request: RequestBuilder, what: &str) -> Result<()> {
        self.send::<serde_json::Value>(request, what)
            .await
            .map(|_| ())
            .or_else(|err| match err {
                // `/login` may answer with `data: null`
                ClientError::Service { code: 0, .. } => Ok(()),
                other => Err(other),
            })
    }
}

#[async_trait]
impl AccountApi for HttpAccountApi {
    async fn request_otp(&self, phone_number: &str) -> Result<()> {
        let url = self.endpoint("login")?;
        let request = self
            .client
            .post(url)
            .json(&json!({ "username": phone_number }));
        self.send_ack(request, "OTP request").await
    }

    async fn validate_otp(&self, phone_number: &str, otp: &str) -> Result<TokenGrant> {
        let url = self.endpoint("login/otp/validate")?;
        let request = self
            .client
            .post(url)
            .json(&json!({ "username": phone_number, "token": otp }));
        self.send(request, "OTP validation").await
    }

    async fn refresh_token(&self, bearer: &str, refresh_token: &str) -> Result<TokenGrant> {
        let url = self.endpoint("refresh")?;
        let request = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .json(&json!({ "refreshToken": refresh_token }));
        self.send(request, "Token refresh").await
    }

    async fn list_services(&self, bearer: &str) -> Result<Vec<ServiceSummary>> {
        let url = self.endpoint("services")?;
        self.send(self.client.get(url).bearer_auth(bearer), "Service list")
            .await
    }

    async fn service_details(&self, bearer: &str, svc_id: &str) -> Result<ServiceDetails> {
        let url = self.service_endpoint(svc_id, "")?;
        self.send(self.client.get(url).bearer_auth(bearer), "Service details")
            .await
    }

    async fn payment_history(
        &self,
        bearer: &str,
        svc_id: &str,
        query: &PaymentHistoryQuery,
    ) -> Result<Vec<PaymentRecord>> {
        let url = self.service_endpoint(svc_id, "/payment/history")?;
        let params = [
            ("startDate", query.start_date.format("%Y-%m-%d").to_string()),
            ("endDate", query.end_date.format("%Y-%m-%d").to_string()),
            ("rows", query.rows.to_string()),
            ("offset", query.offset.to_string()),
        ];
        let request = self.client.get(url).bearer_auth(bearer).query(&params);
        self.send(request, "Payment history").await
    }

    async fn service_settings(&self, bearer: &str, svc_id: &str) -> Result<ServiceSettings> {
        let url = self.service_endpoint(svc_id, "/settings")?;
        self.send(self.client.get(url).bearer_auth(bearer), "Service settings")
            .await
    }

    async fn update_service_settings(
        &self,
        bearer: &str,
        svc_id: &str,
        settings: &ServiceSettings,
    ) -> Result<ServiceSettings> {
        let url = self.service_endpoint(svc_id, "/settings")?;
        let request = self.client.post(url).bearer_auth(bearer).json(settings);
        self.send(request, "Service settings update").await
    }

    async fn account_details(&self, bearer: &str) -> Result<Vec<AccountDetails>> {
        let url = self.endpoint("service/account/details")?;
        self.send(self.client.get(url).bearer_auth(bearer), "Account details")
            .await
    }
}
