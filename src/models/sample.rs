// One acquisition cycle: source, timestamps, and up to 8 channel readings

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CHANNEL_COUNT, Channel, ChannelReading};
use crate::clock::LocalZone;

/// Text format of both timestamp columns in the datastore.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Immutable once built. A channel that failed acquisition is `None` in `channels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub source_id: String,
    pub utc: DateTime<Utc>,
    pub local: NaiveDateTime,
    pub channels: [Option<ChannelReading>; CHANNEL_COUNT],
}

impl Sample {
    /// Builds a sample stamped at `at`, truncated to whole seconds.
    pub fn new(
        source_id: impl Into<String>,
        at: DateTime<Utc>,
        zone: &LocalZone,
        channels: [Option<ChannelReading>; CHANNEL_COUNT],
    ) -> Self {
        let utc = at.trunc_subsecs(0);
        Self {
            source_id: source_id.into(),
            utc,
            local: zone.shift(utc),
            channels,
        }
    }

    pub fn reading(&self, channel: Channel) -> Option<ChannelReading> {
        self.channels[channel.as_usize()]
    }

    /// Number of channels that produced a reading this cycle.
    pub fn channel_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_some()).count()
    }

    pub fn utc_text(&self) -> String {
        self.utc.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn local_text(&self) -> String {
        self.local.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// One-line record: `<source>, utc_<ts>, cst_<ts>,CH0: 1.23mV,...,ADC0: 12,...`.
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, utc_{}, cst_{},",
            self.source_id,
            self.utc_text(),
            self.local_text()
        )?;
        let present = || {
            Channel::ALL
                .into_iter()
                .filter_map(|ch| self.reading(ch).map(|r| (ch, r)))
        };
        let mut fields = present()
            .map(|(ch, r)| format!("CH{ch}: {}mV", MillivoltText(r.millivolts)))
            .chain(present().map(|(ch, r)| format!("ADC{ch}: {}", r.raw)));
        if let Some(first) = fields.next() {
            f.write_str(&first)?;
            for field in fields {
                write!(f, ",{field}")?;
            }
        }
        Ok(())
    }
}

/// Whole values keep one decimal (`3300.0`), others print as-is (`1651.61`).
struct MillivoltText(f64);

impl fmt::Display for MillivoltText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
