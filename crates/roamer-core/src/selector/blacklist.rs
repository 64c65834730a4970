// ── Per-BSSID temporary blacklist ──
//
// Counts association rejections per BSSID. Once a BSSID hits the
// threshold it is blacklisted for a fixed window. Expiry is lazy: the
// selector sweeps once per pass, there is no timer.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::millis;
use crate::model::Bssid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BssidBlacklistStatus {
    pub counter: u32,
    pub blacklisted: bool,
    pub blacklisted_at_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BssidBlacklist {
    entries: BTreeMap<Bssid, BssidBlacklistStatus>,
    threshold: u32,
    expiry: Duration,
}

impl BssidBlacklist {
    pub fn new(threshold: u32, expiry: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            threshold: threshold.max(1),
            expiry,
        }
    }

    pub(crate) fn reconfigure(&mut self, threshold: u32, expiry: Duration) {
        self.threshold = threshold.max(1);
        self.expiry = expiry;
    }

    /// Re-enable or count a failure against `bssid`.
    ///
    /// Enabling returns whether the BSSID was tracked at all. Disabling
    /// returns true only on the call that blacklists it.
    pub fn enable_bssid(&mut self, bssid: &Bssid, enable: bool, now_ms: u64) -> bool {
        if enable {
            return self.entries.remove(bssid).is_some();
        }
        let status = self.entries.entry(bssid.clone()).or_default();
        status.counter = status.counter.saturating_add(1);
        if status.blacklisted || status.counter < self.threshold {
            return false;
        }
        status.blacklisted = true;
        status.blacklisted_at_ms = Some(now_ms);
        info!(bssid = %bssid, failures = status.counter, "bssid blacklisted");
        true
    }

    /// Drop blacklist entries whose window has passed and return them.
    pub fn update(&mut self, now_ms: u64) -> Vec<Bssid> {
        let window = millis(self.expiry);
        let mut expired = Vec::new();
        self.entries.retain(|bssid, status| {
            let done = status.blacklisted
                && status
                    .blacklisted_at_ms
                    .is_some_and(|at| now_ms.saturating_sub(at) >= window);
            if done {
                debug!(bssid = %bssid, "bssid blacklist expired");
                expired.push(bssid.clone());
            }
            !done
        });
        expired
    }

    pub fn is_disabled(&self, bssid: &Bssid) -> bool {
        self.entries.get(bssid).is_some_and(|s| s.blacklisted)
    }

    pub fn status(&self, bssid: &Bssid) -> Option<&BssidBlacklistStatus> {
        self.entries.get(bssid)
    }

    /// Currently blacklisted BSSIDs, in address order.
    pub fn blacklisted(&self) -> Vec<Bssid> {
        self.entries
            .iter()
            .filter(|(_, s)| s.blacklisted)
            .map(|(b, _)| b.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
