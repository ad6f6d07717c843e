// Domain models

mod channel;
mod sample;

pub use channel::{CHANNEL_COUNT, Channel, ChannelReading};
pub use sample::{Sample, TIMESTAMP_FORMAT};
