use async_trait::async_trait;

use crate::media::{AudioConstraints, CaptureStream, MediaCapture};
use crate::peer::LocalAudioTrack;
use crate::utils::capture::MicrophoneCapture;

const FRAME_CAPACITY: usize = 64;

/// Captures from a local input device through cpal.
///
/// cpal has no echo cancellation, noise suppression or gain control; those
/// constraints are left to the link implementation.
#[derive(Debug, Default, Clone)]
pub struct NativeMicrophone {
    device: Option<String>,
}

impl NativeMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device = Some(device.to_string());
        self
    }

    /// One line per input device, the default one marked.
    pub fn available_devices() -> anyhow::Result<String> {
        crate::utils::device::get_available_inputs()
    }
}

#[async_trait]
impl MediaCapture for NativeMicrophone {
    async fn open(&self, constraints: &AudioConstraints) -> anyhow::Result<Box<dyn CaptureStream>> {
        if constraints.sample_rate != crate::utils::audio::CAPTURE_SAMPLE_RATE
            || constraints.channel_count != 1
        {
            anyhow::bail!(
                "native capture only delivers mono {} Hz",
                crate::utils::audio::CAPTURE_SAMPLE_RATE
            );
        }

        let device = self.device.clone();
        let mut capture = tokio::task::spawn_blocking(move || {
            MicrophoneCapture::open(device.as_deref(), FRAME_CAPACITY)
        })
        .await??;

        let mut track = LocalAudioTrack::new(capture.device_name());
        if let Some(frames) = capture.take_frames() {
            track = track.with_frames(frames);
        }
        Ok(Box::new(NativeCaptureStream {
            capture: Some(capture),
            tracks: vec![track],
        }))
    }
}

struct NativeCaptureStream {
    capture: Option<MicrophoneCapture>,
    tracks: Vec<LocalAudioTrack>,
}

impl CaptureStream for NativeCaptureStream {
    fn take_tracks(&mut self) -> Vec<LocalAudioTrack> {
        std::mem::take(&mut self.tracks)
    }

    fn stop(&mut self) {
        self.tracks.clear();
        let Some(mut capture) = self.capture.take() else {
            return;
        };
        capture.request_stop();
        // Joining the capture thread blocks, so keep it off the runtime workers.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || capture.stop());
            }
            Err(_) => capture.stop(),
        }
    }

    fn is_live(&self) -> bool {
        self.capture.as_ref().is_some_and(MicrophoneCapture::is_live)
    }
}

impl Drop for NativeCaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}
