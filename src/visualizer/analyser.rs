use std::collections::HashSet;

use log::{debug, info};
use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{FrequencyLimit, samples_fft_to_spectrum};

use crate::error::GraphError;
use crate::media::{ElementId, MediaElement, SampleTap, TAP_CAPACITY};

pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

// byte mapping range, as browsers default it
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

/// One tick's worth of bin magnitudes, 0..=255.
pub type AnalyserFrame = [u8; BIN_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
}

/// Routes media elements through analysers. The audible path is never touched:
/// taps only copy what goes by.
pub struct AudioGraph {
    connected: HashSet<ElementId>,
    taps: Vec<SampleTap>,
    state: ContextState,
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph {
    pub fn new() -> Self {
        Self {
            connected: HashSet::new(),
            taps: Vec::new(),
            state: ContextState::Suspended,
        }
    }

    /// Wires `element` into a new analyser. An element can only be wired once.
    pub fn connect<M: MediaElement>(&mut self, element: &mut M) -> Result<Analyser, GraphError> {
        let id = element.element_id();
        if !self.connected.insert(id) {
            return Err(GraphError::AlreadyConnected(id));
        }
        let tap = SampleTap::new(TAP_CAPACITY);
        tap.set_enabled(self.state == ContextState::Running);
        element.attach_tap(tap.clone());
        self.taps.push(tap.clone());
        debug!("{id} connected to analyser");
        Ok(Analyser::new(tap))
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            info!("audio graph resumed");
            self.state = ContextState::Running;
            for tap in &self.taps {
                tap.set_enabled(true);
            }
        }
    }
}

pub struct Analyser {
    tap: SampleTap,
    window: Vec<f32>,
    smoothed: [f32; BIN_COUNT],
}

impl Analyser {
    fn new(tap: SampleTap) -> Self {
        Self {
            tap,
            window: vec![0.0; FFT_SIZE],
            smoothed: [0.0; BIN_COUNT],
        }
    }

    #[cfg(test)]
    pub const fn frequency_bin_count(&self) -> usize {
        BIN_COUNT
    }

    /// Forgets everything heard so far: the captured samples and the smoothing history.
    pub fn reset(&mut self) {
        self.tap.clear();
        self.smoothed = [0.0; BIN_COUNT];
    }

    /// Fills `frame` with the current spectrum. Silence until enough audio has been heard.
    pub fn byte_frequency_data(&mut self, frame: &mut AnalyserFrame) {
        let Some(sample_rate) = self.tap.latest(&mut self.window) else {
            frame.fill(0);
            return;
        };
        let windowed = hann_window(&self.window);
        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(spectrum) => spectrum,
            Err(err) => {
                debug!("spectrum unavailable: {err:?}");
                frame.fill(0);
                return;
            }
        };

        let magnitudes = spectrum.data().iter().map(|(_, v)| v.val());
        for (bin, magnitude) in self.smoothed.iter_mut().zip(magnitudes.chain(std::iter::repeat(0.0))) {
            *bin = SMOOTHING * *bin + (1.0 - SMOOTHING) * magnitude.abs();
        }
        for (byte, magnitude) in frame.iter_mut().zip(self.smoothed) {
            *byte = to_byte(magnitude);
        }
    }
}

fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::media::tests::FakeMedia;
    use crate::media::{AudioFile, Tapped};

    pub(crate) fn feed(tap: &SampleTap, samples: Vec<f32>) {
        let file = AudioFile::from_samples(samples, 8000, 1, Arc::new(AtomicBool::new(false)));
        Tapped::new(file, Some(tap.clone())).for_each(drop);
    }

    #[test]
    fn an_element_connects_once() {
        let mut graph = AudioGraph::new();
        let mut media = FakeMedia::new();
        let analyser = graph.connect(&mut media).unwrap();
        assert_eq!(analyser.frequency_bin_count(), 128);

        let again = graph.connect(&mut media);
        assert!(matches!(again, Err(GraphError::AlreadyConnected(id)) if id == media.id));
        assert_eq!(media.taps.borrow().len(), 1);
    }

    #[test]
    fn taps_stay_off_until_the_context_resumes() {
        let mut graph = AudioGraph::new();
        let mut media = FakeMedia::new();
        graph.connect(&mut media).unwrap();
        let tap = media.taps.borrow()[0].clone();
        assert_eq!(graph.state(), ContextState::Suspended);
        assert!(!tap.is_enabled());

        graph.resume();
        assert_eq!(graph.state(), ContextState::Running);
        assert!(tap.is_enabled());
    }

    #[test]
    fn silence_reads_as_zero() {
        let mut graph = AudioGraph::new();
        let mut media = FakeMedia::new();
        let mut analyser = graph.connect(&mut media).unwrap();
        let mut frame = [7u8; BIN_COUNT];
        analyser.byte_frequency_data(&mut frame);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn a_tone_lights_up_its_bin() {
        let mut graph = AudioGraph::new();
        graph.resume();
        let mut media = FakeMedia::new();
        let mut analyser = graph.connect(&mut media).unwrap();
        let tap = media.taps.borrow()[0].clone();

        // 1 kHz at 8 kHz lands on bin 1000 / (8000 / 256) = 32
        let tone = (0..1024)
            .map(|i| (std::f32::consts::TAU * 1000.0 * i as f32 / 8000.0).sin())
            .collect();
        feed(&tap, tone);

        let mut frame = [0u8; BIN_COUNT];
        for _ in 0..20 {
            analyser.byte_frequency_data(&mut frame);
        }
        assert!(frame.iter().all(|&b| b <= frame[32]));
        assert!(frame[32] > 200);
        assert!(frame[100] < 64);
    }

    #[test]
    fn reset_forgets_the_previous_track() {
        let mut graph = AudioGraph::new();
        graph.resume();
        let mut media = FakeMedia::new();
        let mut analyser = graph.connect(&mut media).unwrap();
        let tap = media.taps.borrow()[0].clone();
        let tone = (0..1024)
            .map(|i| (std::f32::consts::TAU * 1000.0 * i as f32 / 8000.0).sin())
            .collect();
        feed(&tap, tone);
        let mut frame = [0u8; BIN_COUNT];
        for _ in 0..20 {
            analyser.byte_frequency_data(&mut frame);
        }
        assert!(frame[32] > 200);

        analyser.reset();
        analyser.byte_frequency_data(&mut frame);
        assert!(frame.iter().all(|&b| b == 0));

        // new silence starts from a clean history instead of the decaying tone
        feed(&tap, vec![0.0; 512]);
        analyser.byte_frequency_data(&mut frame);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn byte_mapping_covers_the_decibel_window() {
        assert_eq!(to_byte(0.0), 0);
        assert_eq!(to_byte(1e-6), 0);
        assert_eq!(to_byte(1.0), 255);
        let mid = to_byte(10f32.powf(-65.0 / 20.0));
        assert!((126..=129).contains(&mid));
    }
}
