//! Microphone capture delivering mono 16 kHz PCM16 frames.
//!
//! A `cpal::Stream` is not `Send` on every platform, so the stream lives on a
//! dedicated thread for its whole life. The owner talks to that thread through
//! a stop channel and reads frames from a tokio channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use rubato::Resampler;
use tokio::sync::mpsc;

use crate::audio::{create_resampler, to_mono, to_pcm16, CAPTURE_SAMPLE_RATE};
use crate::device::get_or_default_input;

/// Frames handed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

pub struct MicrophoneCapture {
    device_name: String,
    live: Arc<AtomicBool>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    frames: Option<mpsc::Receiver<Vec<i16>>>,
}

impl MicrophoneCapture {
    /// Opens the named (or default) input device and starts capturing.
    ///
    /// Blocks until the stream is playing or has failed to start.
    pub fn open(device_name: Option<&str>, capacity: usize) -> anyhow::Result<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<String>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (frame_tx, frame_rx) = mpsc::channel(capacity);
        let live = Arc::new(AtomicBool::new(false));

        let requested = device_name.map(str::to_string);
        let thread_live = live.clone();
        let thread = std::thread::Builder::new()
            .name("aproof-microphone".to_string())
            .spawn(move || {
                let (stream, name) = match build_stream(requested.as_deref(), frame_tx) {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                thread_live.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(name));

                // Returns on an explicit stop and when the owner is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                thread_live.store(false, Ordering::SeqCst);
                tracing::debug!("microphone stream released");
            })?;

        let device_name = match ready_rx.recv() {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("microphone thread exited before the stream started"),
        };
        tracing::info!("capturing from input device {:?}", device_name);

        Ok(Self {
            device_name,
            live,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            frames: Some(frame_rx),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The frame receiver. Can be taken once.
    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<i16>>> {
        self.frames.take()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Tells the capture thread to release the device without waiting for it.
    pub fn request_stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        self.live.store(false, Ordering::SeqCst);
    }

    /// Stops the stream and waits for the capture thread to release the device.
    ///
    /// Blocks; call it off the async runtime.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("microphone thread panicked");
            }
        }
        self.live.store(false, Ordering::SeqCst);
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream(
    device_name: Option<&str>,
    frames: mpsc::Sender<Vec<i16>>,
) -> anyhow::Result<(cpal::Stream, String)> {
    let device = get_or_default_input(device_name)?;
    let name = device.name()?;

    // Prefer a native mono 16 kHz config; otherwise mix down and resample.
    let native = device.supported_input_configs()?.find(|range| {
        range.channels() == 1
            && range.min_sample_rate().0 <= CAPTURE_SAMPLE_RATE
            && range.max_sample_rate().0 >= CAPTURE_SAMPLE_RATE
    });
    let supported = match native {
        Some(range) => range.with_sample_rate(cpal::SampleRate(CAPTURE_SAMPLE_RATE)),
        None => device.default_input_config()?,
    };
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    tracing::debug!("input stream config: {:?} ({:?})", config, sample_format);

    let stream = match sample_format {
        SampleFormat::F32 => build_typed::<f32>(&device, &config, frames)?,
        SampleFormat::I16 => build_typed::<i16>(&device, &config, frames)?,
        SampleFormat::U16 => build_typed::<u16>(&device, &config, frames)?,
        other => anyhow::bail!("unsupported input sample format {other:?}"),
    };
    Ok((stream, name))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    frames: mpsc::Sender<Vec<i16>>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let mut resampler = if config.sample_rate.0 == CAPTURE_SAMPLE_RATE {
        None
    } else {
        Some(create_resampler(
            config.sample_rate.0 as f64,
            CAPTURE_SAMPLE_RATE as f64,
            RESAMPLE_CHUNK,
        )?)
    };
    let mut pending: Vec<f32> = Vec::with_capacity(RESAMPLE_CHUNK * 2);

    let on_data = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let samples: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
        let mono = to_mono(&samples, channels);

        let out = match resampler.as_mut() {
            None => mono,
            Some(resampler) => {
                pending.extend(mono);
                let mut out = Vec::new();
                while pending.len() >= RESAMPLE_CHUNK {
                    let chunk: Vec<f32> = pending.drain(..RESAMPLE_CHUNK).collect();
                    match resampler.process(&[chunk.as_slice()], None) {
                        Ok(resampled) => {
                            if let Some(first) = resampled.first() {
                                out.extend_from_slice(first);
                            }
                        }
                        Err(e) => tracing::warn!("failed to resample microphone input: {}", e),
                    }
                }
                out
            }
        };

        if !out.is_empty() {
            if let Err(e) = frames.try_send(to_pcm16(&out)) {
                tracing::warn!("dropping microphone frame: {}", e);
            }
        }
    };

    let stream = device.build_input_stream(
        config,
        on_data,
        |err| tracing::error!("an error occurred on the input stream: {}", err),
        None,
    )?;
    Ok(stream)
}
