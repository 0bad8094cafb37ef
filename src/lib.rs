mod account;
mod api;
mod auth;
mod billing;
mod config;
mod error;
mod models;
mod store;
mod usage;

pub use account::{format_phone_number, AccountManager};
pub use api::{AccountApi, HttpAccountApi, PaymentHistoryQuery};
pub use auth::{
    next_logout, refresh_delay, validate_phone_number, AuthStatus, LogoutReason, Session, SessionEvent,
    SessionManager,
};
pub use billing::{filter_payments, parse_date, BillFilter, BillStatus, BillingManager};
pub use config::ClientConfig;
pub use error::{ClientError, Result, StoreError};
pub use models::{
    AccountDetails, DataBank, Envelope, PaymentRecord, Plan, ServiceDetails, ServiceInclusion,
    ServiceSettings, ServiceSummary, TokenGrant,
};
pub use store::{Profile, ProfileStore};
pub use usage::{parse_quantity, AccountOverview, UsageManager, UsageSummary};
