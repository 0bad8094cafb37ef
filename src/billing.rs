use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::api::PaymentHistoryQuery;
use crate::auth::SessionManager;
use crate::error::{ClientError, Result};
use crate::models::PaymentRecord;

pub const DEFAULT_PAGE_ROWS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Paid,
    Pending,
    Overdue,
}

impl BillStatus {
    /// Map the service's free-form status text
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" | "success" | "successful" | "completed" | "settled" => Some(Self::Paid),
            "pending" | "processing" | "unpaid" | "outstanding" => Some(Self::Pending),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillFilter {
    #[default]
    All,
    Paid,
    Pending,
}

impl BillFilter {
    pub fn matches(&self, status: Option<BillStatus>) -> bool {
        match self {
            Self::All => true,
            Self::Paid => status == Some(BillStatus::Paid),
            Self::Pending => status == Some(BillStatus::Pending),
        }
    }
}

impl FromStr for BillFilter {
    type Err = ClientError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "paid" => Ok(Self::Paid),
            "pending" => Ok(Self::Pending),
            other => Err(ClientError::Validation(format!(
                "Unknown bill filter '{}', expected all, paid or pending",
                other
            ))),
        }
    }
}

impl PaymentRecord {
    pub fn bill_status(&self) -> Option<BillStatus> {
        self.status.as_deref().and_then(BillStatus::parse)
    }

    pub fn paid_on(&self) -> Option<NaiveDate> {
        parse_date(&self.payment_date)
    }
}

pub fn filter_payments(records: &[PaymentRecord], filter: BillFilter) -> Vec<&PaymentRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record.bill_status()))
        .collect()
}

impl PaymentHistoryQuery {
    /// The `months` months up to and including `today`, first page
    pub fn last_months(months: u32, today: NaiveDate) -> Self {
        let start_date = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);
        Self {
            start_date,
            end_date: today,
            rows: DEFAULT_PAGE_ROWS,
            offset: 0,
        }
    }

    pub fn with_rows(mut self, rows: u32) -> Self {
        self.rows = rows;
        self
    }

    pub fn next_page(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.rows),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(ClientError::Validation(format!(
                "Start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.rows == 0 {
            return Err(ClientError::Validation("rows must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Parse the date formats the account service uses
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    // "2024-10-01", "2024-10-01 00:00:00 +0800", "2024-10-01T00:00:00"
    let date_part = raw.split([' ', 'T']).next().unwrap_or("");
    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(date);
    }
    ["%d/%m/%Y", "%d %b %Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub struct BillingManager {
    session: SessionManager,
}

impl BillingManager {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// One page of payments for `svc_id`, newest first
    pub async fn payment_history(
        &self,
        svc_id: &str,
        query: &PaymentHistoryQuery,
    ) -> Result<Vec<PaymentRecord>> {
        query.validate()?;

        let api = self.session.api().clone();
        let mut records = self
            .session
            .authorized(|bearer| async move { api.payment_history(&bearer, svc_id, query).await })
            .await?;

        log::info!(
            "Fetched {} payments between {} and {}",
            records.len(),
            query.start_date,
            query.end_date
        );
        sort_newest_first(&mut records);
        Ok(records)
    }
}

fn sort_newest_first(records: &mut [PaymentRecord]) {
    records.sort_by(|a, b| b.paid_on().cmp(&a.paid_on()));
}
