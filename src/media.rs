//! Local microphone capture and remote audio playback.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::consts::{CAPTURE_CHANNELS, CAPTURE_SAMPLE_RATE};
use crate::peer::{LocalAudioTrack, RemoteStream};

#[cfg(feature = "utils")]
mod microphone;
#[cfg(feature = "utils")]
pub use microphone::NativeMicrophone;

/// Fixed constraints the microphone is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub channel_count: u16,
    pub sample_rate: u32,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            channel_count: CAPTURE_CHANNELS,
            sample_rate: CAPTURE_SAMPLE_RATE,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Fails when permission is denied or no device is available.
    async fn open(&self, constraints: &AudioConstraints) -> anyhow::Result<Box<dyn CaptureStream>>;
}

/// A running capture. Stopping it releases the device.
#[cfg_attr(test, automock)]
pub trait CaptureStream: Send {
    fn take_tracks(&mut self) -> Vec<LocalAudioTrack>;
    fn stop(&mut self);
    fn is_live(&self) -> bool;
}

#[cfg_attr(test, automock)]
pub trait AudioPlayback: Send + Sync {
    fn create_output(&self) -> anyhow::Result<Box<dyn AudioOutput>>;
}

/// Where the remote stream is played. At most one exists per session.
#[cfg_attr(test, automock)]
pub trait AudioOutput: Send {
    fn attach(&mut self, stream: RemoteStream);
    fn remove(&mut self);
}
