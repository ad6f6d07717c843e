// Time sources for the control loop and the local-time column

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};

/// Wall-clock source. The control loop reads time only through this trait.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Zone used for the local-time copy of each sample timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// The host's configured time zone.
    Host,
    Fixed(FixedOffset),
}

impl LocalZone {
    /// `None` means the host zone; otherwise a fixed offset in whole hours east of UTC.
    pub fn from_offset_hours(hours: Option<i32>) -> anyhow::Result<Self> {
        match hours {
            None => Ok(LocalZone::Host),
            Some(h) => FixedOffset::east_opt(h * 3600)
                .map(LocalZone::Fixed)
                .ok_or_else(|| anyhow::anyhow!("utc offset out of range: {} hours", h)),
        }
    }

    pub fn shift(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            LocalZone::Host => utc.with_timezone(&Local).naive_local(),
            LocalZone::Fixed(offset) => utc.with_timezone(offset).naive_local(),
        }
    }
}
