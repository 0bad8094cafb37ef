use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard response wrapper; `code != 0` means the call failed
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub locale: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    /// Lifetime of `token` in seconds
    pub expires: i64,
    #[serde(default)]
    pub token_type: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub svc_id: String,
    pub alias: Option<String>,
    pub mobile_number: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub plan: String,
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    pub block_number: Option<String>,
    pub unit_number: Option<String>,
    pub street_name: Option<String>,
    #[serde(default)]
    pub postcode: String,
    pub building_name: Option<String>,
    pub contact_mobile: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub porting: bool,
    #[serde(default)]
    pub port_status: String,
    pub port_number: Option<String>,
    pub port_from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInclusion {
    pub inclusion_type: String,
    pub units_type: String,
    /// Numeric string, e.g. "30" or "1000.00"
    pub allowance: String,
    pub remaining: String,
    #[serde(default)]
    pub unlimited: bool,
    pub wallet_type: Option<String>,
    pub gui_metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub product_name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub inclusions: Vec<ServiceInclusion>,
    pub atu_allowed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBank {
    pub product_name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub inclusions: Vec<ServiceInclusion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetails {
    pub current_plan: Plan,
    pub future_plans: Option<Vec<Plan>>,
    pub addons: Option<Vec<Value>>,
    pub databank: Option<DataBank>,
    #[serde(default)]
    pub acct_expiry: String,
    #[serde(default)]
    pub main_balance: String,
    #[serde(default)]
    pub service_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub payment_date: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Fields this client does not model yet
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub svc_id: String,
    pub mobile_number: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub plan: String,
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    pub block_number: Option<String>,
    pub unit_number: Option<String>,
    pub street_name: Option<String>,
    #[serde(default)]
    pub postcode: String,
    pub building_name: Option<String>,
    pub contact_mobile: Option<String>,
    pub email: Option<String>,
}

/// Per-service preferences; the server owns the schema, so keep it open
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceSettings {
    pub values: Map<String, Value>,
}

impl ServiceSettings {
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }
}
