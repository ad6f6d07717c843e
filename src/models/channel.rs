// ADC channel index and the per-channel reading stored with each sample

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of single-ended inputs on the converter.
pub const CHANNEL_COUNT: usize = 8;

/// A validated input index in `0..CHANNEL_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    /// All inputs, in acquisition order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel(0),
        Channel(1),
        Channel(2),
        Channel(3),
        Channel(4),
        Channel(5),
        Channel(6),
        Channel(7),
    ];

    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < CHANNEL_COUNT).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw converter code and its calibrated voltage. Always written together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReading {
    pub raw: u16,
    pub millivolts: f64,
}
