use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ringbuffer::{AllocRingBuffer, RingBuffer};
use rodio::Source;

pub const TAP_CAPACITY: usize = 4096;

struct TapBuffer {
    samples: AllocRingBuffer<f32>,
    sample_rate: u32,
    enabled: bool,
}

/// The most recent mono samples heard at the output, for analysis.
#[derive(Clone)]
pub struct SampleTap {
    inner: Arc<Mutex<TapBuffer>>,
}

impl SampleTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TapBuffer {
                samples: AllocRingBuffer::new(capacity),
                sample_rate: 44100,
                enabled: false,
            })),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Copies the newest `out.len()` samples into `out`, oldest first.
    /// Returns `None` until that many have been captured.
    pub fn latest(&self, out: &mut [f32]) -> Option<u32> {
        let buffer = self.lock();
        let len = buffer.samples.len();
        if len < out.len() {
            return None;
        }
        let skip = len - out.len();
        for (dst, src) in out.iter_mut().zip(buffer.samples.iter().skip(skip)) {
            *dst = *src;
        }
        Some(buffer.sample_rate)
    }

    /// Drops every captured sample. Nothing is analysed until a full window arrives again.
    pub fn clear(&self) {
        self.lock().samples.clear();
    }

    fn push_frame(&self, value: f32, sample_rate: u32) {
        // never block the audio thread
        if let Ok(mut buffer) = self.inner.try_lock() {
            if buffer.enabled {
                buffer.sample_rate = sample_rate;
                buffer.samples.extend(std::iter::once(value));
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, TapBuffer> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pass-through source: yields exactly what `inner` yields, feeding a mono mix of
/// each frame to the tap on the way.
pub struct Tapped<S> {
    inner: S,
    tap: Option<SampleTap>,
    frame_sum: f32,
    frame_fill: u16,
}

impl<S: Source> Tapped<S> {
    pub fn new(inner: S, tap: Option<SampleTap>) -> Self {
        Self {
            inner,
            tap,
            frame_sum: 0.0,
            frame_fill: 0,
        }
    }
}

impl<S: Source> Iterator for Tapped<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;
        if let Some(tap) = &self.tap {
            let channels = self.inner.channels().max(1);
            self.frame_sum += sample;
            self.frame_fill += 1;
            if self.frame_fill >= channels {
                tap.push_frame(self.frame_sum / f32::from(channels), self.inner.sample_rate());
                self.frame_sum = 0.0;
                self.frame_fill = 0;
            }
        }
        Some(sample)
    }
}

impl<S: Source> Source for Tapped<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
