use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use eyre::{Result, eyre};
use rodio::Source;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::store::Blob;

// Samples of the whole file, interleaved
pub type Samples = Arc<Vec<f32>>;

/// A fully decoded track. Clones share the samples and the play cursor, so the
/// copy inside the sink and the copy the player keeps always agree on position.
#[derive(Clone)]
pub struct AudioFile {
    samples: Samples,
    sample_rate: u32,
    channels: u16,
    // index into `samples`
    cursor: Arc<AtomicUsize>,
    looping: Arc<AtomicBool>,
}

impl Iterator for AudioFile {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.samples.len();
        let mut pos = self.cursor.fetch_add(1, Ordering::Relaxed);
        if pos >= len {
            if len == 0 || !self.looping.load(Ordering::Relaxed) {
                self.cursor.store(len, Ordering::Relaxed);
                return None;
            }
            // gapless repeat
            pos = 0;
            self.cursor.store(1, Ordering::Relaxed);
        }
        Some(self.samples[pos])
    }
}

impl Source for AudioFile {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.channels
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.duration()))
    }
}

impl AudioFile {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16, looping: Arc<AtomicBool>) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            cursor: Arc::new(AtomicUsize::new(0)),
            looping,
        }
    }

    /// Decodes a whole in-memory file. `name` only serves as a format hint.
    pub fn decode(bytes: Blob, name: &str, looping: Arc<AtomicBool>) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let mut format = probed.format;

        // first audio track with a known codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| eyre!("no supported audio tracks found"))?;
        let track_id = track.id;
        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;

        let mut all_samples = Vec::<f32>::new();
        let mut sample_buf = None;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let mut channels = track
            .codec_params
            .channels
            .map_or(2, |c| c.count() as u16);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // end of stream
                Err(Error::IoError(_)) => break,
                Err(Error::ResetRequired) => break,
                Err(err) => return Err(err.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(audio_buf) => {
                    if sample_buf.is_none() {
                        let spec = *audio_buf.spec();
                        sample_rate = spec.rate;
                        channels = spec.channels.count() as u16;
                        // capacity, not length
                        let duration = audio_buf.capacity() as u64;
                        sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                    }
                    if let Some(buf) = &mut sample_buf {
                        buf.copy_interleaved_ref(audio_buf);
                        all_samples.extend_from_slice(buf.samples());
                    }
                }
                // skip corrupt packets
                Err(Error::DecodeError(_)) => (),
                Err(err) => return Err(err.into()),
            }
        }

        if all_samples.is_empty() {
            return Err(eyre!("track decoded to no samples"));
        }
        Ok(Self::from_samples(all_samples, sample_rate, channels, looping))
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.channels) / f64::from(self.sample_rate)
    }

    pub fn position(&self) -> f64 {
        let pos = self.cursor.load(Ordering::Relaxed).min(self.samples.len());
        pos as f64 / f64::from(self.channels) / f64::from(self.sample_rate)
    }

    /// Moves the cursor to the frame at `seconds`, clamped into the track.
    pub fn seek(&self, seconds: f64) {
        let frames = self.samples.len() / usize::from(self.channels);
        let frame = ((seconds.max(0.0) * f64::from(self.sample_rate)) as usize).min(frames);
        self.cursor
            .store(frame * usize::from(self.channels), Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) >= self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_ramp(frames: usize, looping: bool) -> AudioFile {
        let samples = (0..frames * 2).map(|i| i as f32).collect();
        AudioFile::from_samples(samples, 4, 2, Arc::new(AtomicBool::new(looping)))
    }

    #[test]
    fn clones_share_the_cursor() {
        let file = stereo_ramp(8, false);
        let mut playing = file.clone();
        for _ in 0..4 {
            playing.next();
        }
        // 4 samples = 2 stereo frames at 4 Hz
        assert_eq!(file.position(), 0.5);
        assert_eq!(file.duration(), 2.0);
    }

    #[test]
    fn seek_lands_on_a_frame_boundary_and_clamps() {
        let mut file = stereo_ramp(8, false);
        file.seek(1.0);
        assert_eq!(file.next(), Some(8.0));
        file.seek(99.0);
        assert!(file.is_finished());
        assert_eq!(file.next(), None);
    }

    #[test]
    fn looping_wraps_without_a_gap() {
        let mut file = stereo_ramp(2, true);
        let played: Vec<f32> = file.by_ref().take(6).collect();
        assert_eq!(played, vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        let bytes = Blob::from(&b"definitely not audio"[..]);
        assert!(AudioFile::decode(bytes, "noise.mp3", Arc::default()).is_err());
    }
}
