#![no_std]

use core::fmt;
use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Upper bound on channels any supported receiver protocol delivers in one frame.
pub const MAX_CHANNELS: usize = 16;

pub type Channels = Vec<i32, MAX_CHANNELS>;

//----------------------------------------------------------//
//--------------------- Decoded Frames ---------------------//
//----------------------------------------------------------//

/// One complete set of receiver channel values.
///
/// `timestamp_us` is the low-edge time of the sync pulse that started the
/// frame, in microseconds. Channel values are pulse lengths in microseconds.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub timestamp_us: i64,
    pub channels: Channels,
}

impl Frame {
    /// Creates a frame with `count` zeroed channels. `count` is clamped to `MAX_CHANNELS`.
    pub fn new(timestamp_us: i64, count: usize) -> Self {
        let mut channels = Channels::new();
        channels.resize_default(count.min(MAX_CHANNELS)).ok();

        Self {
            timestamp_us,
            channels,
        }
    }

    /// Creates a frame from existing values, or `None` if there are more than `MAX_CHANNELS`.
    pub fn with_channels(timestamp_us: i64, values: &[i32]) -> Option<Self> {
        Some(Self {
            timestamp_us,
            channels: Channels::from_slice(values).ok()?,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> postcard::Result<&'a mut [u8]> {
        postcard::to_slice(self, buf)
    }

    pub fn decode(bytes: &[u8]) -> postcard::Result<Self> {
        postcard::from_bytes(bytes)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.timestamp_us)?;
        for (index, value) in self.channels.iter().enumerate() {
            write!(f, " {}={}", index + 1, value)?;
        }
        Ok(())
    }
}

//----------------------------------------------------------//
//------------------- Published Snapshot -------------------//
//----------------------------------------------------------//

/// Consistent copy of the most recently published channel values.
///
/// `sequence` increments (wrapping) on each publish and is 0 before the first frame.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub sequence: u32,
    pub timestamp_us: i64,
    pub channels: Channels,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RcStats {
    pub edges_received: u32,
    pub edges_dropped: u32,
    pub cycles_rejected: u32,
    pub sync_count: u32,
    pub frames_decoded: u32,
    pub frames_dropped: u32,
    pub frames_published: u32,
    // moving average of the interval between published frames
    pub frame_interval_us: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum RcMessage {
    Frame(Frame),
    Snapshot(ChannelSnapshot),
    Stats(RcStats),
}

impl RcMessage {
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> postcard::Result<&'a mut [u8]> {
        postcard::to_slice(self, buf)
    }

    pub fn decode(bytes: &[u8]) -> postcard::Result<Self> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn frame_new_is_zeroed_and_clamped() {
        let frame = Frame::new(12, 8);
        assert_eq!(frame.channel_count(), 8);
        assert!(frame.channels.iter().all(|&v| v == 0));

        assert_eq!(Frame::new(0, 40).channel_count(), MAX_CHANNELS);
    }

    #[test]
    fn with_channels_rejects_too_many() {
        assert!(Frame::with_channels(0, &[0; MAX_CHANNELS + 1]).is_none());
        assert!(Frame::with_channels(0, &[1, 2, 3]).is_some());
    }

    #[test]
    fn display_lists_one_based_channels() {
        let frame = Frame::with_channels(1000, &[1500, 1100]).unwrap();
        let mut text = heapless::String::<64>::new();
        write!(text, "{}", frame).unwrap();
        assert_eq!(text.as_str(), "1000: 1=1500 2=1100");
    }

    #[test]
    fn frame_survives_postcard() {
        let frame = Frame::with_channels(-5, &[1500, 988, 2012, 0]).unwrap();
        let mut buf = [0u8; 64];
        let used = frame.encode(&mut buf).unwrap().len();
        assert_eq!(Frame::decode(&buf[..used]).unwrap(), frame);
    }

    #[test]
    fn message_survives_postcard() {
        let message = RcMessage::Snapshot(ChannelSnapshot {
            sequence: 7,
            timestamp_us: 4_200,
            channels: Channels::from_slice(&[1500, 1000, 2000]).unwrap(),
        });

        let mut buf = [0u8; 128];
        let used = message.encode(&mut buf).unwrap().len();
        assert_eq!(RcMessage::decode(&buf[..used]).unwrap(), message);
    }
}
