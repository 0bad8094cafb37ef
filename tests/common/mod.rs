#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use account_selfcare::{
    AccountApi, AccountDetails, ClientError, PaymentHistoryQuery, PaymentRecord, Result,
    ServiceDetails, ServiceSettings, ServiceSummary, SessionManager, TokenGrant,
};

pub const PHONE: &str = "91234567";
pub const GOOD_OTP: &str = "123456";

/// What the next refresh call answers
#[derive(Debug, Clone, Copy)]
pub enum RefreshReply {
    Grant { expires: i64 },
    Reject { code: i64 },
    /// Answered like an HTTP 401
    Unauthorized,
}

/// In-memory account service with scripted answers
pub struct FakeApi {
    calls: Mutex<Vec<&'static str>>,
    issued: AtomicUsize,
    pub otp_expires: AtomicI64,
    refresh_replies: Mutex<VecDeque<RefreshReply>>,
    /// Held refresh calls wait here until notified
    pub refresh_gate: Mutex<Option<Arc<Notify>>>,
    /// Held OTP validations wait here until notified
    pub validate_gate: Mutex<Option<Arc<Notify>>>,
    /// Data calls answer like an HTTP 401
    pub unauthorized: AtomicBool,
    pub services: Mutex<Vec<ServiceSummary>>,
    pub last_bearer: Mutex<Option<String>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
            otp_expires: AtomicI64::new(3600),
            refresh_replies: Mutex::new(VecDeque::new()),
            refresh_gate: Mutex::new(None),
            validate_gate: Mutex::new(None),
            unauthorized: AtomicBool::new(false),
            services: Mutex::new(vec![service("svc-1", "91234567")]),
            last_bearer: Mutex::new(None),
        }
    }
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_otp_expires(expires: i64) -> Arc<Self> {
        let api = Self::default();
        api.otp_expires.store(expires, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn push_refresh(&self, reply: RefreshReply) {
        self.refresh_replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn grant(&self, expires: i64) -> TokenGrant {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        TokenGrant {
            token: format!("access-{}", n),
            expires,
            token_type: "Bearer".to_string(),
            refresh_token: format!("refresh-{}", n),
        }
    }

    fn check_bearer(&self, bearer: &str) -> Result<()> {
        *self.last_bearer.lock().unwrap() = Some(bearer.to_string());
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(ClientError::SessionExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl AccountApi for FakeApi {
    async fn request_otp(&self, _phone_number: &str) -> Result<()> {
        self.record("request_otp");
        Ok(())
    }

    async fn validate_otp(&self, _phone_number: &str, otp: &str) -> Result<TokenGrant> {
        self.record("validate_otp");
        let gate = self.validate_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if otp != GOOD_OTP {
            return Err(ClientError::service(1, "Invalid OTP"));
        }
        Ok(self.grant(self.otp_expires.load(Ordering::SeqCst)))
    }

    async fn refresh_token(&self, _bearer: &str, _refresh_token: &str) -> Result<TokenGrant> {
        self.record("refresh_token");
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let reply = self
            .refresh_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RefreshReply::Grant { expires: 3600 });
        match reply {
            RefreshReply::Grant { expires } => Ok(self.grant(expires)),
            RefreshReply::Reject { code } => Err(ClientError::service(code, "Refresh rejected")),
            RefreshReply::Unauthorized => Err(ClientError::SessionExpired),
        }
    }

    async fn list_services(&self, bearer: &str) -> Result<Vec<ServiceSummary>> {
        self.record("list_services");
        self.check_bearer(bearer)?;
        Ok(self.services.lock().unwrap().clone())
    }

    async fn service_details(&self, bearer: &str, _svc_id: &str) -> Result<ServiceDetails> {
        self.record("service_details");
        self.check_bearer(bearer)?;
        Ok(service_details())
    }

    async fn payment_history(
        &self,
        bearer: &str,
        _svc_id: &str,
        _query: &PaymentHistoryQuery,
    ) -> Result<Vec<PaymentRecord>> {
        self.record("payment_history");
        self.check_bearer(bearer)?;
        Ok(serde_json::from_value(json!([
            { "paymentId": "p1", "amount": 42.5, "paymentDate": "2024-09-01", "status": "paid" },
            { "paymentId": "p2", "amount": 45.78, "paymentDate": "2024-10-01", "status": "pending" }
        ]))
        .unwrap())
    }

    async fn service_settings(&self, bearer: &str, _svc_id: &str) -> Result<ServiceSettings> {
        self.record("service_settings");
        self.check_bearer(bearer)?;
        Ok(serde_json::from_value(json!({ "roaming": false })).unwrap())
    }

    async fn update_service_settings(
        &self,
        bearer: &str,
        _svc_id: &str,
        settings: &ServiceSettings,
    ) -> Result<ServiceSettings> {
        self.record("update_service_settings");
        self.check_bearer(bearer)?;
        Ok(settings.clone())
    }

    async fn account_details(&self, bearer: &str) -> Result<Vec<AccountDetails>> {
        self.record("account_details");
        self.check_bearer(bearer)?;
        Ok(serde_json::from_value(json!([{
            "svcId": "svc-1",
            "mobileNumber": "6591234567",
            "lastName": "Tan",
            "postcode": "123456"
        }]))
        .unwrap())
    }
}

pub fn service(svc_id: &str, mobile: &str) -> ServiceSummary {
    serde_json::from_value(json!({
        "svcId": svc_id,
        "alias": null,
        "mobileNumber": mobile,
        "serialNumber": "8965000000",
        "plan": "SIM Only 30GB",
        "firstName": null,
        "lastName": "Tan",
        "blockNumber": null,
        "unitNumber": null,
        "streetName": null,
        "postcode": "123456",
        "buildingName": null,
        "contactMobile": null,
        "email": null,
        "serviceType": "MOBILE",
        "porting": false,
        "portStatus": "NONE",
        "portNumber": null,
        "portFrom": null
    }))
    .unwrap()
}

pub fn service_details() -> ServiceDetails {
    serde_json::from_value(json!({
        "currentPlan": {
            "productName": "SIM Only 30GB",
            "startDate": "2024-10-01",
            "endDate": "2024-10-31",
            "inclusions": [
                { "inclusionType": "DATA", "unitsType": "GB", "allowance": "30", "remaining": "15",
                  "unlimited": false, "walletType": null, "guiMetadata": null },
                { "inclusionType": "VOICE", "unitsType": "Min", "allowance": "0", "remaining": "0",
                  "unlimited": true, "walletType": null, "guiMetadata": null }
            ]
        },
        "futurePlans": null,
        "addons": null,
        "databank": null,
        "acctExpiry": "2025-10-31",
        "mainBalance": "12.50",
        "serviceType": "MOBILE"
    }))
    .unwrap()
}

pub fn manager(api: Arc<FakeApi>) -> SessionManager {
    SessionManager::with_refresh_margin(api, Duration::from_secs(30))
}

/// Log in through the normal OTP flow
pub async fn logged_in(api: Arc<FakeApi>) -> SessionManager {
    let session = manager(api);
    session.request_otp(PHONE).await.unwrap();
    session.validate_otp(GOOD_OTP).await.unwrap();
    session
}

/// Let spawned tasks run to completion on the current-thread runtime
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
