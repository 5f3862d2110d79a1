use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewPass, Pass, PassUsage};
use crate::store::PassStore;
use crate::utils::geo::Coordinates;

/// The fields a pass QR code carries
#[derive(Debug, Clone, PartialEq)]
pub struct PassToken {
    pub pass_id: Uuid,
    pub user_id: String,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassValidation {
    pub valid: bool,
    pub pass: Pass,
    pub usage_count: i32,
    pub message: String,
}

/// How long a purchased pass stays valid
pub const PASS_VALIDITY_MONTHS: u32 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedPass {
    pub pass: Pass,
    /// Rendered as the pass QR code by the client
    pub qr_code_data: String,
}

/// Checks a scanned monthly pass and records that it was used
#[derive(Clone)]
pub struct PassService {
    passes: Arc<dyn PassStore>,
}

impl PassService {
    pub fn new(passes: Arc<dyn PassStore>) -> Self {
        Self { passes }
    }

    pub async fn purchase(
        &self,
        user_id: &str,
        route_id: &str,
        fare: f64,
    ) -> AppResult<PurchasedPass> {
        self.purchase_at(user_id, route_id, fare, Utc::now()).await
    }

    /// Issue a pass for `route_id`, valid for one month from `at`
    pub async fn purchase_at(
        &self,
        user_id: &str,
        route_id: &str,
        fare: f64,
        at: DateTime<Utc>,
    ) -> AppResult<PurchasedPass> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("User ID is required".to_string()));
        }
        if route_id.trim().is_empty() {
            return Err(AppError::Validation("Route ID is required".to_string()));
        }
        if !fare.is_finite() || fare <= 0.0 {
            return Err(AppError::InvalidAmount(fare));
        }

        let expires_at = at
            .checked_add_months(Months::new(PASS_VALIDITY_MONTHS))
            .ok_or_else(|| AppError::Validation("Pass expiry is out of range".to_string()))?;

        let pass = self
            .passes
            .create(NewPass {
                user_id: user_id.to_string(),
                route_id: route_id.to_string(),
                fare,
                purchased_at: at,
                expires_at,
            })
            .await?;

        tracing::info!(
            pass_id = %pass.id,
            user_id,
            route_id,
            fare,
            expires_at = %pass.expires_at,
            "Pass issued"
        );

        Ok(PurchasedPass {
            qr_code_data: pass.qr_payload(),
            pass,
        })
    }

    /// The rider's newest pass that can still be used
    pub async fn current_pass(&self, user_id: &str) -> AppResult<Pass> {
        self.passes
            .active_for_user(user_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("No active passes found".to_string()))
    }

    /// Scans of any of the rider's passes, newest first
    pub async fn usage_history(&self, user_id: &str) -> AppResult<Vec<PassUsage>> {
        Ok(self.passes.usages_for_user(user_id).await?)
    }

    pub async fn validate(
        &self,
        token: &PassToken,
        location: Option<Coordinates>,
    ) -> AppResult<PassValidation> {
        self.validate_at(token, location, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        token: &PassToken,
        location: Option<Coordinates>,
        at: DateTime<Utc>,
    ) -> AppResult<PassValidation> {
        let pass = self
            .passes
            .find_by_id(token.pass_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

        if pass.user_id != token.user_id {
            return Err(AppError::Forbidden(
                "Pass does not belong to this user".to_string(),
            ));
        }

        if !pass.is_valid_at(at) {
            return Err(AppError::InvalidState(
                "Pass is expired or inactive".to_string(),
            ));
        }

        let location = location.map(|c| format!("{},{}", c.latitude, c.longitude));
        let (pass, _usage) = self
            .passes
            .record_usage(pass.id, &token.user_id, location, at)
            .await?;

        tracing::info!(
            pass_id = %pass.id,
            user_id = %pass.user_id,
            usage_count = pass.usage_count,
            "Pass validated"
        );

        Ok(PassValidation {
            valid: true,
            usage_count: pass.usage_count,
            pass,
            message: "Pass validated successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::services::check_in::{decode_payload, ScanSubject};
    use crate::store::memory::MemoryPassStore;

    fn pass(user_id: &str, expires_in: Duration, active: bool) -> Pass {
        let now = Utc::now();
        Pass {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            route_id: "route-7".to_string(),
            fare: 600.0,
            purchased_at: now - Duration::days(3),
            expires_at: now + expires_in,
            active,
            usage_count: 0,
        }
    }

    fn token(pass: &Pass) -> PassToken {
        PassToken {
            pass_id: pass.id,
            user_id: pass.user_id.clone(),
            expiry_date: pass.expires_at,
        }
    }

    #[tokio::test]
    async fn test_valid_pass_counts_usage() {
        let store = Arc::new(MemoryPassStore::default());
        let monthly = pass("rider", Duration::days(20), true);
        store.insert(monthly.clone()).await;
        let service = PassService::new(store.clone());

        let first = service
            .validate(&token(&monthly), Some(Coordinates::new(15.49, 73.82)))
            .await
            .unwrap();
        assert!(first.valid);
        assert_eq!(first.usage_count, 1);

        let second = service.validate(&token(&monthly), None).await.unwrap();
        assert_eq!(second.usage_count, 2);

        let usages = store.usages().await;
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].location.as_deref(), Some("15.49,73.82"));
    }

    #[tokio::test]
    async fn test_expired_inactive_and_foreign_passes_rejected() {
        let store = Arc::new(MemoryPassStore::default());
        let expired = pass("rider", Duration::days(-1), true);
        let inactive = pass("rider", Duration::days(10), false);
        let owned = pass("rider", Duration::days(10), true);
        for p in [&expired, &inactive, &owned] {
            store.insert(p.clone()).await;
        }
        let service = PassService::new(store.clone());

        assert!(matches!(
            service.validate(&token(&expired), None).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            service.validate(&token(&inactive), None).await,
            Err(AppError::InvalidState(_))
        ));

        let mut stolen = token(&owned);
        stolen.user_id = "someone_else".to_string();
        assert!(matches!(
            service.validate(&stolen, None).await,
            Err(AppError::Forbidden(_))
        ));

        let mut missing = token(&owned);
        missing.pass_id = Uuid::new_v4();
        assert!(matches!(
            service.validate(&missing, None).await,
            Err(AppError::NotFound(_))
        ));

        assert!(store.usages().await.is_empty());
    }

    #[tokio::test]
    async fn test_purchase_issues_month_long_pass() {
        let store = Arc::new(MemoryPassStore::default());
        let service = PassService::new(store.clone());
        let bought_at = "2024-01-31T09:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let purchased = service
            .purchase_at("rider", "route-7", 600.0, bought_at)
            .await
            .unwrap();
        assert_eq!(purchased.pass.purchased_at, bought_at);
        assert_eq!(
            purchased.pass.expires_at,
            "2024-02-29T09:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert!(purchased.pass.active);
        assert_eq!(purchased.pass.usage_count, 0);

        // The QR it hands out is accepted by the scanner decoder
        let decoded = decode_payload(&purchased.qr_code_data, bought_at).unwrap();
        assert_eq!(decoded, ScanSubject::Pass(token(&purchased.pass)));
    }

    #[tokio::test]
    async fn test_purchase_rejects_bad_input() {
        let service = PassService::new(Arc::new(MemoryPassStore::default()));

        assert!(matches!(
            service.purchase(" ", "route-7", 600.0).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.purchase("rider", "", 600.0).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.purchase("rider", "route-7", 0.0).await,
            Err(AppError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_current_pass_is_newest_valid_one() {
        let store = Arc::new(MemoryPassStore::default());
        let service = PassService::new(store.clone());

        assert!(matches!(
            service.current_pass("rider").await,
            Err(AppError::NotFound(_))
        ));

        let now = Utc::now();
        let older = service
            .purchase_at("rider", "route-1", 500.0, now - Duration::days(10))
            .await
            .unwrap();
        let newer = service
            .purchase_at("rider", "route-2", 550.0, now - Duration::days(1))
            .await
            .unwrap();
        store.insert(pass("rider", Duration::days(-2), true)).await;
        store.insert(pass("someone_else", Duration::days(5), true)).await;

        assert_eq!(service.current_pass("rider").await.unwrap(), newer.pass);
        assert_ne!(service.current_pass("rider").await.unwrap(), older.pass);
    }

    #[tokio::test]
    async fn test_usage_history_newest_first() {
        let store = Arc::new(MemoryPassStore::default());
        let monthly = pass("rider", Duration::days(20), true);
        store.insert(monthly.clone()).await;
        let service = PassService::new(store.clone());

        let t0 = Utc::now();
        service.validate_at(&token(&monthly), None, t0).await.unwrap();
        service
            .validate_at(&token(&monthly), None, t0 + Duration::minutes(30))
            .await
            .unwrap();

        let history = service.usage_history("rider").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].scanned_at > history[1].scanned_at);
        assert!(service.usage_history("nobody").await.unwrap().is_empty());
    }
}
