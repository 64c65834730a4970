// ── Per-network scan detail cache ──
//
// BSSID → latest observation for one saved network. Bounded: once the
// capacity is exceeded the oldest-seen entries are evicted. Entries older
// than the maximum age stay stored but are invisible to queries that
// take `now`.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

use crate::clock::millis;
use crate::model::{Bssid, INVALID_RSSI, ScanResult};

/// Per-BSSID bookkeeping that survives refreshes of the same BSSID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BssidStatus {
    pub association_failures: u32,
    pub last_failure_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedScan {
    pub result: ScanResult,
    pub status: BssidStatus,
}

/// Best RSSI per band among fresh entries. `INVALID_RSSI` when unseen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub rssi24: i32,
    pub rssi5: i32,
}

impl Visibility {
    pub const UNSEEN: Self = Self {
        rssi24: INVALID_RSSI,
        rssi5: INVALID_RSSI,
    };

    pub fn best(&self) -> i32 {
        self.rssi24.max(self.rssi5)
    }

    pub fn is_visible(&self) -> bool {
        self.best() > INVALID_RSSI
    }
}

#[derive(Debug, Clone)]
pub struct ScanDetailCache {
    entries: IndexMap<Bssid, CachedScan>,
    capacity: usize,
}

impl ScanDetailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, bssid: &Bssid) -> Option<&CachedScan> {
        self.entries.get(bssid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedScan> {
        self.entries.values()
    }

    pub fn bssids(&self) -> impl Iterator<Item = &Bssid> {
        self.entries.keys()
    }

    /// Record an observation.
    ///
    /// A BSSID seen again within half the max age has its RSSI smoothed
    /// against the previous reading; the per-BSSID status carries over.
    pub fn insert(&mut self, mut result: ScanResult, max_age: Duration) {
        let max_age_ms = millis(max_age);
        let status = match self.entries.shift_remove(&result.bssid) {
            Some(previous) => {
                result.rssi = smoothed_rssi(&previous.result, &result, max_age_ms);
                previous.status
            }
            None => BssidStatus::default(),
        };
        self.entries
            .insert(result.bssid.clone(), CachedScan { result, status });
        self.trim();
    }

    /// Entries observed within `max_age` of `now_ms`.
    pub fn fresh(&self, now_ms: u64, max_age: Duration) -> impl Iterator<Item = &CachedScan> {
        let max_age_ms = millis(max_age);
        self.entries
            .values()
            .filter(move |e| now_ms.saturating_sub(e.result.seen_ms) <= max_age_ms)
    }

    pub fn visibility(&self, now_ms: u64, max_age: Duration) -> Visibility {
        self.fresh(now_ms, max_age)
            .fold(Visibility::UNSEEN, |mut vis, entry| {
                let level = entry.result.level();
                if entry.result.is_5ghz() {
                    vis.rssi5 = vis.rssi5.max(level);
                } else {
                    vis.rssi24 = vis.rssi24.max(level);
                }
                vis
            })
    }

    pub fn record_failure(&mut self, bssid: &Bssid, now_ms: u64) -> bool {
        let Some(entry) = self.entries.get_mut(bssid) else {
            return false;
        };
        entry.status.association_failures = entry.status.association_failures.saturating_add(1);
        entry.status.last_failure_ms = Some(now_ms);
        true
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.result.seen_ms)
                .map(|(bssid, _)| bssid.clone());
            match oldest {
                Some(bssid) => {
                    self.entries.shift_remove(&bssid);
                }
                None => break,
            }
        }
    }
}

fn smoothed_rssi(previous: &ScanResult, current: &ScanResult, max_age_ms: u64) -> Option<i32> {
    let (Some(prev), Some(now)) = (previous.rssi, current.rssi) else {
        return current.rssi;
    };
    let age = current.seen_ms.saturating_sub(previous.seen_ms);
    if max_age_ms == 0 || age >= max_age_ms / 2 {
        return Some(now);
    }
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let alpha = 0.5 - age as f64 / max_age_ms as f64;
    let blended = f64::from(now) * (1.0 - alpha) + f64::from(prev) * alpha;
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    Some(blended.round() as i32)
}
