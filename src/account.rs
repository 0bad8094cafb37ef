use crate::auth::SessionManager;
use crate::error::Result;
use crate::models::{AccountDetails, ServiceSettings};

pub struct AccountManager {
    session: SessionManager,
}

impl AccountManager {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// Contact and address details of the primary account holder
    pub async fn account_details(&self) -> Result<Option<AccountDetails>> {
        let api = self.session.api().clone();
        let details = self
            .session
            .authorized(|bearer| async move { api.account_details(&bearer).await })
            .await?;
        Ok(details.into_iter().next())
    }

    pub async fn service_settings(&self, svc_id: &str) -> Result<ServiceSettings> {
        let api = self.session.api().clone();
        self.session
            .authorized(|bearer| async move { api.service_settings(&bearer, svc_id).await })
            .await
    }

    pub async fn update_service_settings(
        &self,
        svc_id: &str,
        settings: &ServiceSettings,
    ) -> Result<ServiceSettings> {
        let api = self.session.api().clone();
        let updated = self
            .session
            .authorized(|bearer| async move {
                api.update_service_settings(&bearer, svc_id, settings).await
            })
            .await?;
        log::info!("Updated {} settings for service", updated.values.len());
        Ok(updated)
    }
}

/// Display form of a mobile number: drops the 65 country code and
/// groups as XXXX-XXXX
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let local = match digits.strip_prefix("65") {
        Some(rest) if rest.len() == 8 => rest,
        _ => digits.as_str(),
    };
    if local.len() <= 4 {
        return local.to_string();
    }
    let (first, second) = local.split_at(4);
    format!("{}-{}", first, second)
}
