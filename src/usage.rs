use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::SessionManager;
use crate::billing::parse_date;
use crate::error::{ClientError, Result};
use crate::models::{Plan, ServiceDetails, ServiceInclusion, ServiceSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub inclusion_type: String,
    pub units: String,
    pub unlimited: bool,
    pub allowance: Option<f64>,
    pub remaining: Option<f64>,
    pub used: Option<f64>,
    /// None for unlimited or unparseable inclusions
    pub percentage_used: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOverview {
    pub service: ServiceSummary,
    pub details: ServiceDetails,
    pub usage: Vec<UsageSummary>,
    pub timestamp: i64,
}

impl AccountOverview {
    pub fn main_balance(&self) -> Option<f64> {
        parse_quantity(&self.details.main_balance)
    }
}

/// Fetches the primary line's plan and usage, keeping the last result
pub struct UsageManager {
    session: SessionManager,
    cache: Mutex<Option<AccountOverview>>,
}

impl UsageManager {
    pub fn new(session: SessionManager) -> Self {
        Self {
            session,
            cache: Mutex::new(None),
        }
    }

    /// List services, then load details for the first one
    pub async fn fetch_overview(&self) -> Result<AccountOverview> {
        log::info!("Fetching account overview...");
        let api = self.session.api().clone();

        let result = self
            .session
            .authorized(|bearer| async move {
                let services = api.list_services(&bearer).await?;
                let service = services.into_iter().next().ok_or(ClientError::NoServices)?;
                let details = api.service_details(&bearer, &service.svc_id).await?;
                Ok::<_, ClientError>((service, details))
            })
            .await;

        let (service, details) = match result {
            Ok(data) => data,
            Err(err) => {
                if err.is_session_expired() {
                    self.clear_cache();
                }
                log::warn!("Overview fetch failed: {}", err);
                return Err(err);
            }
        };

        let usage = Self::summarize_inclusions(&details.current_plan.inclusions);
        log::info!(
            "Fetched overview for plan '{}' with {} inclusions",
            details.current_plan.product_name,
            usage.len()
        );

        let overview = AccountOverview {
            service,
            details,
            usage,
            timestamp: chrono::Utc::now().timestamp(),
        };
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(overview.clone());
        Ok(overview)
    }

    pub fn get_cached_overview(&self) -> Option<AccountOverview> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear_cache(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn summarize_inclusions(inclusions: &[ServiceInclusion]) -> Vec<UsageSummary> {
        inclusions.iter().map(Self::summarize).collect()
    }

    fn summarize(inclusion: &ServiceInclusion) -> UsageSummary {
        let allowance = parse_quantity(&inclusion.allowance);
        let remaining = parse_quantity(&inclusion.remaining);

        let (used, percentage_used) = match (inclusion.unlimited, allowance, remaining) {
            (false, Some(limit), Some(left)) => {
                let used = (limit - left).max(0.0);
                let percentage = if limit > 0.0 {
                    Some(((used / limit) * 100.0) as f32)
                } else {
                    None
                };
                (Some(used), percentage)
            }
            _ => (None, None),
        };

        UsageSummary {
            inclusion_type: inclusion.inclusion_type.clone(),
            units: inclusion.units_type.clone(),
            unlimited: inclusion.unlimited,
            allowance,
            remaining,
            used,
            percentage_used,
        }
    }

    /// Days left on `plan`, counting today; None if the end date is unreadable
    pub fn days_remaining(plan: &Plan, today: NaiveDate) -> Option<i64> {
        let end = parse_date(&plan.end_date)?;
        Some((end - today).num_days().max(0))
    }
}

/// Lenient number parsing for allowance/balance strings like "1,000.50" or "30GB"
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}
