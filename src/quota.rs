//! Per-identity traffic quotas.
//!
//! Counters roll over lazily: each charge compares the stored day and month
//! against the current local date and zeroes whichever changed. There is no
//! background timer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use parking_lot::{Mutex, RwLock};

use crate::policy::QuotaPolicy;

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Process-local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually advanced clock for tests and replay tooling
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock() = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock()
    }
}

/// Calendar month a monthly counter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl From<NaiveDate> for MonthKey {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Bytes consumed by one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    pub bytes_today: u64,
    pub bytes_this_month: u64,
    /// Day `bytes_today` was last reset against
    pub day: NaiveDate,
    /// Month `bytes_this_month` was last reset against
    pub month: MonthKey,
}

impl QuotaUsage {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            bytes_today: 0,
            bytes_this_month: 0,
            day: today,
            month: today.into(),
        }
    }

    /// Zero the counters whose period has ended. Day and month are
    /// independent: a new day keeps the monthly total.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.day != today {
            self.bytes_today = 0;
            self.day = today;
        }
        let month = MonthKey::from(today);
        if self.month != month {
            self.bytes_this_month = 0;
            self.month = month;
        }
    }

    fn add(&mut self, bytes: u64) {
        self.bytes_today = self.bytes_today.saturating_add(bytes);
        self.bytes_this_month = self.bytes_this_month.saturating_add(bytes);
    }

    /// Whether either counter is over its (non-zero) limit
    pub fn exceeds(&self, policy: &QuotaPolicy) -> bool {
        (policy.daily_limit > 0 && self.bytes_today > policy.daily_limit)
            || (policy.monthly_limit > 0 && self.bytes_this_month > policy.monthly_limit)
    }
}

/// Concurrent per-identity usage counters.
///
/// Records are created on first charge and never removed. Each record has its
/// own lock, so rollover and increment for one identity are serialized while
/// different identities proceed in parallel.
pub struct QuotaTracker {
    usage: RwLock<HashMap<String, Arc<Mutex<QuotaUsage>>>>,
    clock: Arc<dyn Clock>,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaTracker {
    /// Tracker keyed to the local calendar
    pub fn new() -> Self {
        Self::with_clock(Arc::new(LocalClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            usage: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Charge `bytes` to `username` and report whether it is still within
    /// `policy`.
    ///
    /// The charge is recorded even when it pushes usage over the limit.
    /// Inactive policies (disabled, or both limits zero) record nothing.
    pub fn charge_and_check(&self, username: &str, policy: &QuotaPolicy, bytes: u64) -> bool {
        if !policy.is_active() {
            return true;
        }

        let today = self.clock.today();
        let record = self.record(username, today);
        let mut usage = record.lock();
        usage.roll_over(today);
        usage.add(bytes);

        let within = !usage.exceeds(policy);
        if !within {
            tracing::debug!(
                username,
                bytes_today = usage.bytes_today,
                bytes_this_month = usage.bytes_this_month,
                "quota exceeded"
            );
        }
        within
    }

    /// Current usage for `username`, as it would look after rollover today
    pub fn usage(&self, username: &str) -> Option<QuotaUsage> {
        let record = self.usage.read().get(username).cloned()?;
        let mut usage = *record.lock();
        usage.roll_over(self.clock.today());
        Some(usage)
    }

    /// Number of identities with a usage record
    pub fn tracked(&self) -> usize {
        self.usage.read().len()
    }

    fn record(&self, username: &str, today: NaiveDate) -> Arc<Mutex<QuotaUsage>> {
        if let Some(record) = self.usage.read().get(username) {
            return Arc::clone(record);
        }

        let mut map = self.usage.write();
        Arc::clone(
            map.entry(username.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(QuotaUsage::new(today)))),
        )
    }
}
