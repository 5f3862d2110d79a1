//! Scan-driven check-in and check-out.
//!
//! A scanner decodes a QR payload into a rider and then starts or ends that
//! rider's trip depending on whether one is already open. Each scanner
//! handles one scan at a time; scans arriving while it is busy are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Trip;
use crate::services::passes::{PassService, PassToken, PassValidation};
use crate::services::trips::{EndTripResult, TripService};
use crate::utils::geo::Coordinates;

/// What a scanned code identifies
#[derive(Debug, Clone, PartialEq)]
pub enum ScanSubject {
    /// A rider QR (`user`, `transit_ticket`, a JSON object with `userId`, or a bare id)
    Rider(String),
    /// A monthly pass, validated instead of starting a trip
    Pass(PassToken),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    user_id: Option<String>,
    pass_id: Option<String>,
    expiry_date: Option<DateTime<Utc>>,
}

fn required_user(user_id: Option<String>, what: &str) -> AppResult<String> {
    user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::InvalidQr(format!("Invalid {} QR code: missing user ID", what)))
}

/// Decode a scanned payload, checked against `now` for pass expiry
pub fn decode_payload(raw: &str, now: DateTime<Utc>) -> AppResult<ScanSubject> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidQr("Invalid QR code format".to_string()));
    }

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        // Not JSON: the code is the rider id itself
        Err(_) => return Ok(ScanSubject::Rider(raw.to_string())),
    };

    if !value.is_object() {
        return Err(AppError::InvalidQr("Unknown QR code type".to_string()));
    }

    let payload: RawPayload = serde_json::from_value(value)
        .map_err(|e| AppError::InvalidQr(format!("Invalid QR code format: {}", e)))?;

    match payload.kind.as_deref() {
        Some("user") => Ok(ScanSubject::Rider(required_user(payload.user_id, "user")?)),
        Some("transit_ticket") => Ok(ScanSubject::Rider(required_user(
            payload.user_id,
            "ticket",
        )?)),
        Some("pass") => {
            let (Some(pass_id), Some(user_id), Some(expiry_date)) =
                (payload.pass_id, payload.user_id, payload.expiry_date)
            else {
                return Err(AppError::InvalidQr(
                    "Invalid pass QR code: missing required fields".to_string(),
                ));
            };

            let pass_id = Uuid::parse_str(&pass_id)
                .map_err(|_| AppError::InvalidQr("Invalid pass ID format".to_string()))?;

            if expiry_date < now {
                return Err(AppError::InvalidQr("Pass has expired".to_string()));
            }

            Ok(ScanSubject::Pass(PassToken {
                pass_id,
                user_id,
                expiry_date,
            }))
        }
        _ => match payload.user_id.filter(|id| !id.trim().is_empty()) {
            Some(user_id) => Ok(ScanSubject::Rider(user_id)),
            None => Err(AppError::InvalidQr("Unknown QR code type".to_string())),
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    CheckedIn { trip: Trip },
    CheckedOut(EndTripResult),
    PassValidated(PassValidation),
    /// The scanner was still busy with an earlier scan
    Ignored,
}

/// Releases a scanner's busy flag when dropped, so a scan that errors,
/// panics or is cancelled mid-flight still frees the scanner.
struct ScanGuard {
    processing: Arc<AtomicBool>,
    reset_delay: Duration,
}

impl ScanGuard {
    /// Release immediately instead of after the display delay
    fn release_now(&mut self) {
        self.reset_delay = Duration::ZERO;
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if self.reset_delay.is_zero() {
            self.processing.store(false, Ordering::Release);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let processing = Arc::clone(&self.processing);
                let delay = self.reset_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    processing.store(false, Ordering::Release);
                });
            }
            // No runtime left to wait on
            Err(_) => self.processing.store(false, Ordering::Release),
        }
    }
}

/// One scanner's dispatcher. Holds a busy flag from the moment a scan is
/// accepted until `reset_delay` after its result is returned.
pub struct CheckInOrchestrator {
    trips: TripService,
    passes: PassService,
    processing: Arc<AtomicBool>,
    reset_delay: Duration,
}

impl CheckInOrchestrator {
    pub fn new(trips: TripService, passes: PassService, reset_delay: Duration) -> Self {
        Self {
            trips,
            passes,
            processing: Arc::new(AtomicBool::new(false)),
            reset_delay,
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.processing.load(Ordering::Acquire)
    }

    pub async fn scan(&self, raw: &str, location: Option<Coordinates>) -> AppResult<ScanOutcome> {
        let Some(mut guard) = self.try_acquire() else {
            tracing::debug!("Scan ignored, scanner busy");
            return Ok(ScanOutcome::Ignored);
        };

        // A code that cannot be read never occupies the scanner
        let subject = match decode_payload(raw, Utc::now()) {
            Ok(subject) => subject,
            Err(e) => {
                guard.release_now();
                return Err(e);
            }
        };

        let result = self.dispatch(subject, location).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Scan failed");
        }

        drop(guard);
        result
    }

    fn try_acquire(&self) -> Option<ScanGuard> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard {
                processing: Arc::clone(&self.processing),
                reset_delay: self.reset_delay,
            })
    }

    async fn dispatch(
        &self,
        subject: ScanSubject,
        location: Option<Coordinates>,
    ) -> AppResult<ScanOutcome> {
        match subject {
            ScanSubject::Pass(token) => {
                let validation = self.passes.validate(&token, location).await?;
                Ok(ScanOutcome::PassValidated(validation))
            }
            ScanSubject::Rider(user_id) => {
                let coords = location.ok_or_else(|| {
                    AppError::Validation(
                        "Unable to get current location. Enable location services and try again"
                            .to_string(),
                    )
                })?;

                match self.trips.active_trip_for_user(&user_id).await? {
                    Some(trip) => {
                        tracing::info!(%user_id, trip_id = %trip.id, "Active trip found, checking out");
                        let ended = self.trips.end_trip(trip.id, coords).await?;
                        Ok(ScanOutcome::CheckedOut(ended))
                    }
                    None => {
                        tracing::info!(%user_id, "No active trip, checking in");
                        let trip = self.trips.start_trip(&user_id, coords).await?;
                        Ok(ScanOutcome::CheckedIn { trip })
                    }
                }
            }
        }
    }
}

/// Upper bound on scanners tracked at once
pub const MAX_SCANNERS: usize = 1024;

/// Scanners unused for this long are dropped from the registry
pub const SCANNER_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct ScannerSlot {
    scanner: Arc<CheckInOrchestrator>,
    last_used: Instant,
}

impl ScannerSlot {
    /// Nobody holds the scanner and its busy window is over
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.scanner) == 1 && self.scanner.is_ready()
    }
}

/// Scanners by id, created on first use. Idle scanners are evicted after
/// `idle_ttl`, and the registry never holds more than `capacity` of them.
pub struct ScannerRegistry {
    trips: TripService,
    passes: PassService,
    reset_delay: Duration,
    capacity: usize,
    idle_ttl: Duration,
    scanners: Mutex<HashMap<String, ScannerSlot>>,
}

impl ScannerRegistry {
    pub fn new(trips: TripService, passes: PassService, reset_delay: Duration) -> Self {
        Self::with_limits(trips, passes, reset_delay, MAX_SCANNERS, SCANNER_IDLE_TTL)
    }

    pub fn with_limits(
        trips: TripService,
        passes: PassService,
        reset_delay: Duration,
        capacity: usize,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            trips,
            passes,
            reset_delay,
            capacity,
            idle_ttl,
            scanners: Mutex::new(HashMap::new()),
        }
    }

    pub async fn scanner(&self, scanner_id: &str) -> AppResult<Arc<CheckInOrchestrator>> {
        let mut scanners = self.scanners.lock().await;
        let now = Instant::now();

        if let Some(slot) = scanners.get_mut(scanner_id) {
            slot.last_used = now;
            return Ok(Arc::clone(&slot.scanner));
        }

        scanners.retain(|_, slot| {
            now.duration_since(slot.last_used) < self.idle_ttl || !slot.is_idle()
        });

        if scanners.len() >= self.capacity {
            let oldest = scanners
                .iter()
                .filter(|(_, slot)| slot.is_idle())
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| id.clone());

            match oldest {
                Some(id) => {
                    scanners.remove(&id);
                    tracing::debug!(scanner_id = %id, "Evicted least recently used scanner");
                }
                None => {
                    tracing::warn!(capacity = self.capacity, "Scanner registry full");
                    return Err(AppError::Conflict(
                        "Too many scanners in use, try again shortly".to_string(),
                    ));
                }
            }
        }

        let scanner = Arc::new(CheckInOrchestrator::new(
            self.trips.clone(),
            self.passes.clone(),
            self.reset_delay,
        ));
        scanners.insert(
            scanner_id.to_string(),
            ScannerSlot {
                scanner: Arc::clone(&scanner),
                last_used: now,
            },
        );
        Ok(scanner)
    }

    pub async fn scanner_count(&self) -> usize {
        self.scanners.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::models::{NewTrip, Pass, TripCompletion};
    use crate::store::memory::{MemoryPassStore, MemoryTripStore, MemoryWalletStore};
    use crate::store::{StoreResult, TripStore, WalletStore};

    const STOP_A: Coordinates = Coordinates {
        latitude: 15.4909,
        longitude: 73.8278,
    };
    const STOP_B: Coordinates = Coordinates {
        latitude: 15.5109,
        longitude: 73.8478,
    };

    /// Delays lookups so a second scan can arrive mid-flight
    struct SlowTrips {
        inner: MemoryTripStore,
    }

    #[async_trait]
    impl TripStore for SlowTrips {
        async fn create(&self, new: NewTrip) -> StoreResult<Trip> {
            self.inner.create(new).await
        }

        async fn find_active_by_user(&self, user_id: &str) -> StoreResult<Option<Trip>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.find_active_by_user(user_id).await
        }

        async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>> {
            self.inner.find_by_id(id).await
        }

        async fn complete(&self, id: Uuid, completion: TripCompletion) -> StoreResult<Trip> {
            self.inner.complete(id, completion).await
        }

        async fn history_for_user(&self, user_id: &str, limit: u64) -> StoreResult<Vec<Trip>> {
            self.inner.history_for_user(user_id, limit).await
        }

        async fn list_active(&self) -> StoreResult<Vec<Trip>> {
            self.inner.list_active().await
        }

        async fn list_completed(&self, page: u64, per_page: u64) -> StoreResult<(Vec<Trip>, u64)> {
            self.inner.list_completed(page, per_page).await
        }
    }

    fn orchestrator_with(
        trips: Arc<dyn TripStore>,
        passes: Arc<MemoryPassStore>,
        delay: Duration,
    ) -> (CheckInOrchestrator, Arc<MemoryWalletStore>) {
        let wallets = Arc::new(MemoryWalletStore::default());
        let service = TripService::new(trips, wallets.clone());
        (
            CheckInOrchestrator::new(service, PassService::new(passes), delay),
            wallets,
        )
    }

    fn orchestrator() -> (CheckInOrchestrator, Arc<MemoryWalletStore>) {
        orchestrator_with(
            Arc::new(MemoryTripStore::default()),
            Arc::new(MemoryPassStore::default()),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_decode_payload_shapes() {
        let now = Utc::now();

        assert_eq!(
            decode_payload(r#"{"type":"user","userId":"user_1"}"#, now).unwrap(),
            ScanSubject::Rider("user_1".to_string())
        );
        assert_eq!(
            decode_payload(
                r#"{"userId":"user_2","type":"transit_ticket","timestamp":1,"version":"1.0"}"#,
                now
            )
            .unwrap(),
            ScanSubject::Rider("user_2".to_string())
        );
        assert_eq!(
            decode_payload(r#"{"userId":"user_3"}"#, now).unwrap(),
            ScanSubject::Rider("user_3".to_string())
        );
        assert_eq!(
            decode_payload("  user_2abcXYZ ", now).unwrap(),
            ScanSubject::Rider("user_2abcXYZ".to_string())
        );
    }

    #[test]
    fn test_decode_payload_rejects() {
        let now = Utc::now();
        for bad in [
            "",
            "   ",
            "42",
            r#"{"type":"user"}"#,
            r#"{"type":"transit_ticket","userId":""}"#,
            r#"{"type":"bus","busId":"b1"}"#,
            r#"{"type":"pass","userId":"u1"}"#,
        ] {
            assert!(
                matches!(decode_payload(bad, now), Err(AppError::InvalidQr(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_decode_pass_payload() {
        let now = Utc::now();
        let pass_id = Uuid::new_v4();
        let expiry = now + ChronoDuration::days(10);
        let payload = serde_json::json!({
            "type": "pass",
            "passId": pass_id,
            "userId": "user_9",
            "expiryDate": expiry,
            "routeId": "r1",
        })
        .to_string();

        match decode_payload(&payload, now).unwrap() {
            ScanSubject::Pass(token) => {
                assert_eq!(token.pass_id, pass_id);
                assert_eq!(token.user_id, "user_9");
            }
            other => panic!("unexpected subject: {:?}", other),
        }

        assert!(decode_payload(&payload, expiry + ChronoDuration::seconds(1)).is_err());
    }

    #[tokio::test]
    async fn test_scan_checks_in_then_out() {
        let (scanner, wallets) = orchestrator();
        wallets.credit("user_1", 100.0, "Wallet top-up").await.unwrap();

        let first = scanner.scan("user_1", Some(STOP_A)).await.unwrap();
        let trip = match first {
            ScanOutcome::CheckedIn { trip } => trip,
            other => panic!("expected check-in, got {:?}", other),
        };
        assert!(scanner.is_ready());

        let second = scanner
            .scan(r#"{"type":"user","userId":"user_1"}"#, Some(STOP_B))
            .await
            .unwrap();
        match second {
            ScanOutcome::CheckedOut(result) => {
                assert_eq!(result.trip.id, trip.id);
                assert!(result.settlement.is_success());
            }
            other => panic!("expected check-out, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scan_while_busy_is_ignored() {
        let slow = Arc::new(SlowTrips {
            inner: MemoryTripStore::default(),
        });
        let (scanner, _) = orchestrator_with(
            slow.clone(),
            Arc::new(MemoryPassStore::default()),
            Duration::ZERO,
        );

        let (first, second) = tokio::join!(
            scanner.scan("user_1", Some(STOP_A)),
            scanner.scan("user_1", Some(STOP_A))
        );

        assert!(matches!(first.unwrap(), ScanOutcome::CheckedIn { .. }));
        assert!(matches!(second.unwrap(), ScanOutcome::Ignored));
        assert_eq!(slow.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scanner_ready_after_display_delay() {
        let (scanner, _) = orchestrator_with(
            Arc::new(MemoryTripStore::default()),
            Arc::new(MemoryPassStore::default()),
            Duration::from_secs(2),
        );

        scanner.scan("user_1", Some(STOP_A)).await.unwrap();
        assert!(!scanner.is_ready());
        assert!(matches!(
            scanner.scan("user_1", Some(STOP_B)).await.unwrap(),
            ScanOutcome::Ignored
        ));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(scanner.is_ready());
    }

    #[tokio::test]
    async fn test_failures_release_scanner() {
        let (scanner, _) = orchestrator();

        assert!(matches!(
            scanner.scan("", Some(STOP_A)).await,
            Err(AppError::InvalidQr(_))
        ));
        assert!(scanner.is_ready());

        assert!(matches!(
            scanner.scan("user_1", None).await,
            Err(AppError::Validation(_))
        ));
        assert!(scanner.is_ready());
    }

    #[tokio::test]
    async fn test_pass_scan_validates_without_trip() {
        let passes = Arc::new(MemoryPassStore::default());
        let now = Utc::now();
        let pass = Pass {
            id: Uuid::new_v4(),
            user_id: "user_5".to_string(),
            route_id: "route-1".to_string(),
            fare: 500.0,
            purchased_at: now,
            expires_at: now + ChronoDuration::days(30),
            active: true,
            usage_count: 0,
        };
        passes.insert(pass.clone()).await;

        let trips = Arc::new(MemoryTripStore::default());
        let (scanner, _) = orchestrator_with(trips.clone(), passes, Duration::ZERO);

        let payload = serde_json::json!({
            "type": "pass",
            "passId": pass.id,
            "userId": "user_5",
            "expiryDate": pass.expires_at,
        })
        .to_string();

        match scanner.scan(&payload, Some(STOP_A)).await.unwrap() {
            ScanOutcome::PassValidated(v) => assert_eq!(v.usage_count, 1),
            other => panic!("expected pass validation, got {:?}", other),
        }
        assert!(trips.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_scan_releases_scanner() {
        let slow = Arc::new(SlowTrips {
            inner: MemoryTripStore::default(),
        });
        let (scanner, _) = orchestrator_with(
            slow.clone(),
            Arc::new(MemoryPassStore::default()),
            Duration::ZERO,
        );
        let scanner = Arc::new(scanner);

        let in_flight = {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move { scanner.scan("user_1", Some(STOP_A)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!scanner.is_ready());

        in_flight.abort();
        assert!(in_flight.await.unwrap_err().is_cancelled());
        assert!(scanner.is_ready());

        assert!(matches!(
            scanner.scan("user_1", Some(STOP_A)).await.unwrap(),
            ScanOutcome::CheckedIn { .. }
        ));
        assert_eq!(slow.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_scan_waits_out_display_delay() {
        let (scanner, _) = orchestrator_with(
            Arc::new(SlowTrips {
                inner: MemoryTripStore::default(),
            }),
            Arc::new(MemoryPassStore::default()),
            Duration::from_secs(2),
        );
        let scanner = Arc::new(scanner);

        let in_flight = {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move { scanner.scan("user_1", Some(STOP_A)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        in_flight.abort();
        assert!(in_flight.await.unwrap_err().is_cancelled());
        assert!(!scanner.is_ready());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(scanner.is_ready());
    }

    fn registry(capacity: usize, idle_ttl: Duration) -> ScannerRegistry {
        let wallets: Arc<dyn WalletStore> = Arc::new(MemoryWalletStore::default());
        let trips = TripService::new(Arc::new(MemoryTripStore::default()), wallets);
        let passes = PassService::new(Arc::new(MemoryPassStore::default()));
        ScannerRegistry::with_limits(trips, passes, Duration::ZERO, capacity, idle_ttl)
    }

    #[tokio::test]
    async fn test_registry_reuses_scanners() {
        let registry = registry(MAX_SCANNERS, SCANNER_IDLE_TTL);

        let a = registry.scanner("gate-1").await.unwrap();
        let b = registry.scanner("gate-1").await.unwrap();
        let c = registry.scanner("gate-2").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.scanner_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_is_bounded() {
        let registry = registry(2, Duration::from_secs(60));

        let gate_1 = registry.scanner("gate-1").await.unwrap();
        let gate_2 = registry.scanner("gate-2").await.unwrap();
        assert!(matches!(
            registry.scanner("gate-3").await,
            Err(AppError::Conflict(_))
        ));

        // gate-1 is no longer held, so it makes room
        drop(gate_1);
        let gate_3 = registry.scanner("gate-3").await.unwrap();
        assert_eq!(registry.scanner_count().await, 2);
        assert!(matches!(
            registry.scanner("gate-1").await,
            Err(AppError::Conflict(_))
        ));

        drop(gate_2);
        drop(gate_3);
        tokio::time::advance(Duration::from_secs(61)).await;

        registry.scanner("gate-4").await.unwrap();
        assert_eq!(registry.scanner_count().await, 1);
    }
}
