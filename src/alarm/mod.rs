// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Audible alarm actuator
//!
//! A dedicated thread pulses a tone for as long as the shared flag is set.
//! The frame loop only flips the flag; it never waits on audio.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::AlarmConfig;

/// Something that can make a noise
pub trait ToneSink {
    /// Sound `freq_hz` for `duration`, blocking the calling thread
    fn play(&mut self, freq_hz: u32, duration: Duration);
}

impl<T: ToneSink + ?Sized> ToneSink for Box<T> {
    fn play(&mut self, freq_hz: u32, duration: Duration) {
        (**self).play(freq_hz, duration)
    }
}

/// Terminal bell. Frequency is ignored.
pub struct BellTone;

impl ToneSink for BellTone {
    fn play(&mut self, freq_hz: u32, duration: Duration) {
        let mut out = std::io::stderr();
        if out.write_all(b"\x07").and_then(|_| out.flush()).is_err() {
            trace!("terminal bell unavailable");
        }
        trace!(freq_hz, ?duration, "beep");
        std::thread::sleep(duration);
    }
}

/// Sine tone on the default output device
#[cfg(feature = "audio")]
pub use cpal_tone::CpalTone;

#[cfg(feature = "audio")]
mod cpal_tone {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tracing::warn;

    use super::ToneSink;

    pub struct CpalTone {
        _stream: cpal::Stream,
        sounding: Arc<AtomicBool>,
        frequency: Arc<AtomicU32>,
    }

    impl CpalTone {
        /// Open the default output device. Must be called on the alarm thread.
        pub fn open() -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| anyhow!("no audio output device"))?;
            let config = device.default_output_config()?;
            let sample_rate = config.sample_rate().0 as f32;
            let channels = config.channels() as usize;

            let sounding = Arc::new(AtomicBool::new(false));
            let frequency = Arc::new(AtomicU32::new(1000));
            let on = sounding.clone();
            let freq = frequency.clone();
            let mut phase = 0.0f32;

            let stream = device.build_output_stream(
                &config.config(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let active = on.load(Ordering::Relaxed);
                    let step = freq.load(Ordering::Relaxed) as f32 / sample_rate;
                    for frame in data.chunks_mut(channels) {
                        let sample = if active {
                            (phase * std::f32::consts::TAU).sin() * 0.2
                        } else {
                            0.0
                        };
                        phase = (phase + step).fract();
                        for s in frame.iter_mut() {
                            *s = sample;
                        }
                    }
                },
                |err| warn!("audio stream error: {}", err),
                None,
            )?;
            stream.play()?;

            Ok(Self {
                _stream: stream,
                sounding,
                frequency,
            })
        }
    }

    impl ToneSink for CpalTone {
        fn play(&mut self, freq_hz: u32, duration: Duration) {
            self.frequency.store(freq_hz, Ordering::Relaxed);
            self.sounding.store(true, Ordering::Relaxed);
            std::thread::sleep(duration);
            self.sounding.store(false, Ordering::Relaxed);
        }
    }
}

/// Alarm level as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Inactive,
    Active,
}

/// Owns the alarm thread and the flag it watches
pub struct AlarmActuator {
    active: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    pulses: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl AlarmActuator {
    /// Spawn the alarm thread. `make_sink` runs on that thread, so sinks that
    /// are not `Send` (audio streams) can be built there.
    pub fn start<S, F>(config: &AlarmConfig, make_sink: F) -> std::io::Result<Self>
    where
        S: ToneSink,
        F: FnOnce() -> S + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let pulses = Arc::new(AtomicU64::new(0));

        let tone_config = config.clone();
        let (a, s, p) = (active.clone(), stop.clone(), pulses.clone());
        let handle = std::thread::Builder::new()
            .name("alarm".into())
            .spawn(move || {
                let mut sink = make_sink();
                debug!("alarm thread running");
                while !s.load(Ordering::Acquire) {
                    if a.load(Ordering::Acquire) {
                        sink.play(tone_config.frequency_hz, tone_config.tone());
                        p.fetch_add(1, Ordering::Relaxed);
                        std::thread::sleep(tone_config.gap());
                    } else {
                        std::thread::sleep(tone_config.idle_poll());
                    }
                }
                debug!("alarm thread exiting");
            })?;

        info!(
            frequency_hz = config.frequency_hz,
            tone_ms = config.tone_ms,
            "Alarm actuator started"
        );

        Ok(Self {
            active,
            stop,
            pulses,
            handle: Some(handle),
        })
    }

    /// Set the alarm level, returns true when it changed
    pub fn set_active(&self, on: bool) -> bool {
        let was = self.active.swap(on, Ordering::AcqRel);
        if was != on {
            info!("Alarm {}", if on { "ON" } else { "OFF" });
        }
        was != on
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn state(&self) -> AlarmState {
        if self.is_active() {
            AlarmState::Active
        } else {
            AlarmState::Inactive
        }
    }

    /// Tones played so far
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }

    /// Silence the alarm and join its thread
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.active.store(false, Ordering::Release);
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("alarm thread panicked");
            }
        }
    }
}

impl Drop for AlarmActuator {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct Recorder {
        played: Arc<AtomicU64>,
        last_freq: Arc<AtomicU64>,
    }

    impl ToneSink for Recorder {
        fn play(&mut self, freq_hz: u32, duration: Duration) {
            self.last_freq.store(freq_hz as u64, Ordering::SeqCst);
            self.played.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(duration);
        }
    }

    fn fast_config() -> AlarmConfig {
        AlarmConfig {
            enabled: true,
            frequency_hz: 880,
            tone_ms: 2,
            gap_ms: 2,
            idle_poll_ms: 2,
        }
    }

    fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_silent_until_activated() {
        let played = Arc::new(AtomicU64::new(0));
        let last_freq = Arc::new(AtomicU64::new(0));
        let (p, f) = (played.clone(), last_freq.clone());
        let alarm = AlarmActuator::start(&fast_config(), move || Recorder { played: p, last_freq: f }).unwrap();

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(played.load(Ordering::SeqCst), 0);
        assert_eq!(alarm.state(), AlarmState::Inactive);

        assert!(alarm.set_active(true));
        assert!(!alarm.set_active(true));
        assert!(wait_until(Duration::from_secs(2), || played.load(Ordering::SeqCst) >= 2));
        assert_eq!(last_freq.load(Ordering::SeqCst), 880);
        assert!(alarm.pulses() >= 1);

        alarm.stop();
    }

    #[test]
    fn test_deactivate_stops_pulses() {
        let played = Arc::new(AtomicU64::new(0));
        let last_freq = Arc::new(AtomicU64::new(0));
        let (p, f) = (played.clone(), last_freq.clone());
        let alarm = AlarmActuator::start(&fast_config(), move || Recorder { played: p, last_freq: f }).unwrap();

        alarm.set_active(true);
        assert!(wait_until(Duration::from_secs(2), || played.load(Ordering::SeqCst) >= 1));
        assert!(alarm.set_active(false));
        assert!(!alarm.is_active());

        // Let an in-flight pulse finish
        std::thread::sleep(Duration::from_millis(20));
        let settled = played.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(played.load(Ordering::SeqCst), settled);

        alarm.stop();
    }

    #[test]
    fn test_drop_joins_thread() {
        let played = Arc::new(AtomicU64::new(0));
        let last_freq = Arc::new(AtomicU64::new(0));
        let (p, f) = (played.clone(), last_freq.clone());
        let alarm = AlarmActuator::start(&fast_config(), move || Recorder { played: p, last_freq: f }).unwrap();
        alarm.set_active(true);
        drop(alarm);

        let after = played.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(played.load(Ordering::SeqCst), after);
    }
}
