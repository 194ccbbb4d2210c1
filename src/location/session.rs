//! Location session — drives one provider through permission, fetch and
//! region resolution.
//!
//! Flow:  permission → (reuse fix younger than max-age | fetch) → resolve → Ready
//!
//! At most one refresh runs at a time; a second call while one is pending is
//! rejected with [`LocationError::InFlight`]. Failures are terminal for the
//! attempt and nothing is retried until the caller refreshes again.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::providers::LocationProvider;
use super::types::{
    render_local_time, Fix, LocationError, LocationReport, LocationStatus, Permission, PositionOptions,
};
use crate::region::RegionTable;

pub struct LocationSession {
    provider: Arc<dyn LocationProvider>,
    options: PositionOptions,
    display_tz: Tz,
    table: RegionTable,
    status: Mutex<LocationStatus>,
    last_fix: Mutex<Option<Fix>>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LocationSession {
    pub fn new(provider: Arc<dyn LocationProvider>, options: PositionOptions) -> Self {
        Self {
            provider,
            options,
            display_tz: chrono_tz::Asia::Tokyo,
            table: RegionTable::builtin(),
            status: Mutex::new(LocationStatus::Idle),
            last_fix: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_display_tz(mut self, tz: Tz) -> Self {
        self.display_tz = tz;
        self
    }

    pub fn with_table(mut self, table: RegionTable) -> Self {
        self.table = table;
        self
    }

    pub fn status(&self) -> LocationStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one permission + fetch + resolve cycle.
    pub fn refresh(&self) -> Result<LocationReport, LocationError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("refresh suppressed, request already in flight");
            return Err(LocationError::InFlight);
        };

        self.set_status(LocationStatus::RequestingPermission);
        if self.provider.request_permission() == Permission::Denied {
            tracing::warn!("location permission denied");
            self.set_status(LocationStatus::PermissionDenied);
            return Err(LocationError::PermissionDenied);
        }

        if let Some(fix) = self.fresh_fix(Utc::now()) {
            tracing::debug!(timestamp = %fix.timestamp, "reusing recent fix");
            let report = self.report(&fix, true);
            self.set_status(LocationStatus::Ready { report: report.clone() });
            return Ok(report);
        }

        self.set_status(LocationStatus::Fetching);
        let fetched = self.provider.current_position(&self.options).and_then(|fix| {
            fix.coordinate()?;
            Ok(fix)
        });
        let fix = match fetched {
            Ok(fix) => fix,
            Err(e) => {
                tracing::warn!(error = %e, "position fetch failed");
                self.set_status(LocationStatus::Failed { reason: e.to_string() });
                return Err(e);
            }
        };

        *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some(fix.clone());
        let report = self.report(&fix, false);
        tracing::info!(
            region = report.region,
            latitude = report.latitude,
            longitude = report.longitude,
            source = %report.source,
            "location updated"
        );
        self.set_status(LocationStatus::Ready { report: report.clone() });
        Ok(report)
    }

    fn fresh_fix(&self, now: DateTime<Utc>) -> Option<Fix> {
        let last = self.last_fix.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref()
            .filter(|fix| fix.age_at(now) < self.options.maximum_age)
            .cloned()
    }

    fn report(&self, fix: &Fix, reused: bool) -> LocationReport {
        let lookup = self.table.lookup(fix.latitude, fix.longitude);
        LocationReport {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            region: lookup.region,
            matched: lookup.matched,
            source: fix.source,
            timestamp: fix.timestamp,
            local_time: render_local_time(fix.timestamp, self.display_tz),
            reused,
        }
    }

    fn set_status(&self, next: LocationStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::providers::StaticProvider;
    use crate::location::types::FixSource;
    use crate::region::{Coordinate, FALLBACK_REGION};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    struct ScriptedProvider {
        permission: Permission,
        result: Result<(f64, f64), LocationError>,
        fetches: AtomicUsize,
        permission_requests: AtomicUsize,
    }

    impl ScriptedProvider {
        fn ok(lat: f64, lon: f64) -> Self {
            Self {
                permission: Permission::Granted,
                result: Ok((lat, lon)),
                fetches: AtomicUsize::new(0),
                permission_requests: AtomicUsize::new(0),
            }
        }

        fn failing(e: LocationError) -> Self {
            Self { result: Err(e), ..Self::ok(0.0, 0.0) }
        }

        fn denied() -> Self {
            Self { permission: Permission::Denied, ..Self::ok(0.0, 0.0) }
        }
    }

    impl LocationProvider for ScriptedProvider {
        fn request_permission(&self) -> Permission {
            self.permission_requests.fetch_add(1, Ordering::SeqCst);
            self.permission
        }

        fn current_position(&self, _opts: &PositionOptions) -> Result<Fix, LocationError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let (latitude, longitude) = self.result.clone()?;
            Ok(Fix {
                latitude,
                longitude,
                accuracy: Some(5.0),
                timestamp: Utc::now(),
                source: FixSource::Static,
            })
        }
    }

    fn no_reuse() -> PositionOptions {
        PositionOptions {
            timeout: Duration::from_secs(1),
            maximum_age: Duration::ZERO,
        }
    }

    #[test]
    fn test_refresh_static_nagoya() {
        let session = LocationSession::new(Arc::new(StaticProvider::default()), no_reuse());
        assert_eq!(session.status(), LocationStatus::Idle);

        let report = session.refresh().unwrap();
        assert_eq!(report.region, "愛知県");
        assert!(report.matched);
        assert!(!report.reused);
        assert!(report.local_time.ends_with("JST"));
        assert_eq!(session.status(), LocationStatus::Ready { report });
        assert!(!session.is_in_flight());
    }

    #[test]
    fn test_refresh_unmatched_uses_fallback() {
        let session = LocationSession::new(Arc::new(ScriptedProvider::ok(-33.87, 151.21)), no_reuse());
        let report = session.refresh().unwrap();
        assert_eq!(report.region, FALLBACK_REGION);
        assert!(!report.matched);
    }

    #[test]
    fn test_permission_denied_is_terminal() {
        let provider = Arc::new(ScriptedProvider::denied());
        let session = LocationSession::new(provider.clone(), no_reuse());

        assert_eq!(session.refresh().unwrap_err(), LocationError::PermissionDenied);
        assert_eq!(session.status(), LocationStatus::PermissionDenied);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::failing(LocationError::Unavailable("no gps".into())));
        let session = LocationSession::new(provider.clone(), no_reuse());

        let err = session.refresh().unwrap_err();
        assert_eq!(err, LocationError::Unavailable("no gps".into()));
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.status(),
            LocationStatus::Failed { reason: "position unavailable: no gps".into() }
        );
        assert!(!session.is_in_flight());

        // An explicit refresh is a new attempt.
        assert!(session.refresh().is_err());
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_finite_fix_rejected() {
        let provider = Arc::new(ScriptedProvider::ok(f64::NAN, 136.9));
        let session = LocationSession::new(provider, no_reuse());
        assert!(matches!(session.refresh(), Err(LocationError::InvalidCoordinate(_))));
        assert!(matches!(session.status(), LocationStatus::Failed { .. }));
    }

    #[test]
    fn test_recent_fix_is_reused() {
        let provider = Arc::new(ScriptedProvider::ok(35.68, 139.76));
        let opts = PositionOptions {
            timeout: Duration::from_secs(1),
            maximum_age: Duration::from_secs(3600),
        };
        let session = LocationSession::new(provider.clone(), opts);

        let first = session.refresh().unwrap();
        let second = session.refresh().unwrap();
        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(second.region, "東京都");
        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
        // Permission is still asked on every refresh.
        assert_eq!(provider.permission_requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_max_age_always_fetches() {
        let provider = Arc::new(ScriptedProvider::ok(35.68, 139.76));
        let session = LocationSession::new(provider.clone(), no_reuse());
        session.refresh().unwrap();
        session.refresh().unwrap();
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    struct GatedProvider {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl LocationProvider for GatedProvider {
        fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        fn current_position(&self, _opts: &PositionOptions) -> Result<Fix, LocationError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(Fix {
                latitude: 33.59,
                longitude: 130.40,
                accuracy: None,
                timestamp: Utc::now(),
                source: FixSource::Static,
            })
        }
    }

    #[test]
    fn test_concurrent_refresh_is_suppressed() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = GatedProvider {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let session = Arc::new(LocationSession::new(Arc::new(provider), no_reuse()));

        let worker = {
            let session = session.clone();
            std::thread::spawn(move || session.refresh())
        };

        entered_rx.recv().unwrap();
        assert!(session.is_in_flight());
        assert_eq!(session.status(), LocationStatus::Fetching);
        assert_eq!(session.refresh().unwrap_err(), LocationError::InFlight);
        assert_eq!(session.status(), LocationStatus::Fetching);

        release_tx.send(()).unwrap();
        let report = worker.join().unwrap().unwrap();
        assert_eq!(report.region, "福岡県");
        assert!(!session.is_in_flight());
    }

    #[test]
    fn test_custom_table() {
        use crate::region::RegionBoundingBox;
        const DEPOT: &[RegionBoundingBox] =
            &[RegionBoundingBox::new("depot", "車庫", 1.0, -1.0, 1.0, -1.0)];
        let provider = StaticProvider::new(Coordinate { latitude: 0.0, longitude: 0.0 }, None);
        let session = LocationSession::new(Arc::new(provider), no_reuse())
            .with_table(RegionTable::new(DEPOT).unwrap())
            .with_display_tz(chrono_tz::UTC);
        let report = session.refresh().unwrap();
        assert_eq!(report.region, "車庫");
        assert!(report.local_time.ends_with("UTC"));
    }
}
