//! Playback state machine. Commands go out to the media element; the element's events
//! come back through [`PlaybackMachine::handle_event`], each mapped to one transition.
use log::{debug, info, warn};

use crate::{
    error::{PlaybackRejected, SeekRejected},
    handles::HandleId,
    media::{MediaElement, MediaEvent, MediaSignal, MediaSource},
    position::{KeyValueStore, PlaybackPosition},
};

pub const DEFAULT_UNMUTE_VOLUME: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Paused,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub is_muted: bool,
    pub is_repeating: bool,
}

impl PlayerState {
    /// Played fraction in `[0, 1]`, zero while the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// What the composition root has to do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    None,
    Loaded,
    Restored(f64),
    Started,
    Stopped,
    Ended,
    Looped,
}

pub struct PlaybackMachine<M: MediaElement, S: KeyValueStore> {
    media: M,
    position: PlaybackPosition<S>,
    source: Option<HandleId>,
    phase: Phase,
    current_time: f64,
    duration: Option<f64>,
    volume: f32,
    last_audible_volume: f32,
    muted: bool,
    repeating: bool,
}

impl<M: MediaElement, S: KeyValueStore> PlaybackMachine<M, S> {
    pub fn new(mut media: M, position: PlaybackPosition<S>, volume: f32) -> Self {
        let volume = clamp_volume(volume);
        media.set_volume(volume);
        Self {
            media,
            position,
            source: None,
            phase: Phase::Empty,
            current_time: 0.0,
            duration: None,
            volume,
            last_audible_volume: if volume > 0.0 { volume } else { DEFAULT_UNMUTE_VOLUME },
            muted: false,
            repeating: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn source(&self) -> Option<HandleId> {
        self.source
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            is_playing: self.phase == Phase::Playing,
            current_time: self.current_time,
            duration: self.duration.unwrap_or(0.0),
            volume: self.volume,
            is_muted: self.muted,
            is_repeating: self.repeating,
        }
    }

    /// Only for wiring the analyser onto the element.
    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    /// Hands a new source to the element. The saved position is left alone so that
    /// it can be restored once the duration is known.
    pub fn load(&mut self, source: MediaSource) -> Transition {
        self.source = Some(source.handle);
        self.phase = Phase::Paused;
        self.current_time = 0.0;
        self.duration = None;
        self.media.load(Some(&source));
        self.media.set_looping(self.repeating);
        self.media.set_volume(self.effective_volume());
        Transition::Loaded
    }

    #[cfg(test)]
    pub fn saved_position(&self) -> Option<f64> {
        self.position.load()
    }

    pub fn clear_saved_position(&mut self) {
        self.position.clear();
    }

    /// Back to `Empty`: unloads the element and forgets the saved position.
    pub fn reset(&mut self) {
        if self.phase == Phase::Playing {
            self.media.pause();
        }
        self.media.load(None);
        self.source = None;
        self.phase = Phase::Empty;
        self.current_time = 0.0;
        self.duration = None;
        self.position.clear();
    }

    pub fn play(&mut self) -> Result<(), PlaybackRejected> {
        if self.phase == Phase::Empty {
            return Err(PlaybackRejected::NoSource);
        }
        self.media.play()
    }

    pub fn pause(&mut self) {
        if self.phase == Phase::Playing {
            self.media.pause();
        }
    }

    pub fn toggle_play(&mut self) -> Result<(), PlaybackRejected> {
        if self.phase == Phase::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn seek(&mut self, seconds: f64) -> Result<(), SeekRejected> {
        if self.source.is_none() {
            return Err(SeekRejected::NoSource);
        }
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(SeekRejected::Invalid(seconds));
        }
        let duration = self.duration.unwrap_or(0.0);
        if seconds >= duration {
            return Err(SeekRejected::OutOfRange {
                requested: seconds,
                duration,
            });
        }
        self.current_time = seconds;
        self.media.seek(seconds);
        self.position.save(seconds);
        if self.phase == Phase::Ended {
            self.phase = Phase::Paused;
        }
        Ok(())
    }

    /// Relative seek, clamped to the track, for keyboard scrubbing.
    pub fn seek_by(&mut self, delta: f64) -> Result<(), SeekRejected> {
        let Some(duration) = self.duration else {
            return Err(SeekRejected::NoSource);
        };
        let target = (self.current_time + delta).clamp(0.0, (duration - 0.001).max(0.0));
        self.seek(target)
    }

    /// Clamps to `[0, 1]` and unmutes.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        if self.volume > 0.0 {
            self.last_audible_volume = self.volume;
        }
        self.muted = false;
        self.media.set_volume(self.volume);
    }

    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.muted = false;
            if self.volume <= 0.0 {
                self.volume = self.last_audible_volume;
            }
        } else {
            self.muted = true;
        }
        self.media.set_volume(self.effective_volume());
    }

    pub fn toggle_repeat(&mut self) {
        self.repeating = !self.repeating;
        self.media.set_looping(self.repeating);
    }

    pub fn handle_event(&mut self, signal: MediaSignal) -> Transition {
        if signal.source != self.source {
            debug!("dropping {:?} from a previous source", signal.event);
            return Transition::None;
        }
        match signal.event {
            MediaEvent::LoadedMetadata { duration } => {
                self.duration = Some(duration);
                self.restore_position(duration)
            }
            MediaEvent::Play => {
                self.phase = Phase::Playing;
                Transition::Started
            }
            MediaEvent::Pause => {
                if self.phase == Phase::Playing {
                    self.phase = Phase::Paused;
                }
                Transition::Stopped
            }
            MediaEvent::TimeUpdate(seconds) => {
                if self.phase != Phase::Empty {
                    self.current_time = seconds;
                    self.position.save(seconds);
                }
                Transition::None
            }
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::PlaybackRejected(reason) => {
                warn!("playback rejected: {reason}");
                Transition::None
            }
        }
    }

    fn restore_position(&mut self, duration: f64) -> Transition {
        match self.position.load() {
            Some(saved) if (0.0..duration).contains(&saved) => {
                info!("resuming at {saved:.1}s");
                self.current_time = saved;
                self.media.seek(saved);
                Transition::Restored(saved)
            }
            Some(stale) => {
                debug!("ignoring saved position {stale}s beyond {duration}s");
                Transition::None
            }
            None => Transition::None,
        }
    }

    fn on_ended(&mut self) -> Transition {
        // the flag as it is now, not as it was when the track started
        if self.repeating {
            self.current_time = 0.0;
            self.media.seek(0.0);
            if let Err(err) = self.media.play() {
                debug!("restart after repeat refused: {err}");
            }
            self.phase = Phase::Playing;
            return Transition::Looped;
        }
        self.phase = Phase::Ended;
        self.current_time = 0.0;
        self.position.clear();
        Transition::Ended
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{HandleHost, MediaRegistry};
    use crate::media::tests::FakeMedia;
    use crate::position::MemoryKeyValue;
    use crate::store::Blob;

    type Machine = PlaybackMachine<FakeMedia, MemoryKeyValue>;

    fn machine_with_saved(saved: Option<&str>) -> (Machine, FakeMedia) {
        let media = FakeMedia::new();
        let mut store = MemoryKeyValue::default();
        if let Some(saved) = saved {
            store.set_item("audioCurrentTime", saved.into());
        }
        let machine = PlaybackMachine::new(media.clone(), PlaybackPosition::new(store), 0.7);
        (machine, media)
    }

    fn source() -> MediaSource {
        let mut registry = MediaRegistry::new();
        MediaSource {
            handle: registry.create(Blob::from(&b"x"[..])),
            name: "track.mp3".into(),
        }
    }

    fn signal(machine: &Machine, event: MediaEvent) -> MediaSignal {
        MediaSignal {
            source: machine.source(),
            event,
        }
    }

    /// Loads a 10 second track and lets the metadata arrive.
    fn loaded(saved: Option<&str>) -> (Machine, FakeMedia) {
        let (mut machine, media) = machine_with_saved(saved);
        machine.load(source());
        let ev = signal(&machine, MediaEvent::LoadedMetadata { duration: 10.0 });
        machine.handle_event(ev);
        (machine, media)
    }

    fn saved(machine: &Machine) -> Option<f64> {
        machine.position.load()
    }

    #[test]
    fn starts_empty_and_refuses_to_play() {
        let (mut machine, _) = machine_with_saved(None);
        assert_eq!(machine.phase(), Phase::Empty);
        assert_eq!(machine.play(), Err(PlaybackRejected::NoSource));
        assert_eq!(machine.seek(1.0), Err(SeekRejected::NoSource));
    }

    #[test]
    fn play_waits_for_the_engine() {
        let (mut machine, media) = loaded(None);
        assert_eq!(machine.phase(), Phase::Paused);
        machine.play().unwrap();
        assert_eq!(machine.phase(), Phase::Paused);
        assert!(media.calls().contains(&"play".to_string()));

        let ev = signal(&machine, MediaEvent::Play);
        assert_eq!(machine.handle_event(ev), Transition::Started);
        assert!(machine.state().is_playing);
    }

    #[test]
    fn rejected_play_changes_nothing() {
        let (mut machine, _) = machine_with_saved(None);
        let mut media = FakeMedia::new();
        media.reject_play = true;
        machine.media = media;
        machine.load(source());

        assert!(machine.toggle_play().is_err());
        assert_eq!(machine.phase(), Phase::Paused);

        let ev = signal(&machine, MediaEvent::PlaybackRejected(PlaybackRejected::NoSource));
        assert_eq!(machine.handle_event(ev), Transition::None);
        assert_eq!(machine.phase(), Phase::Paused);
    }

    #[test]
    fn external_pause_stops_playing() {
        let (mut machine, _) = loaded(None);
        machine.handle_event(signal(&machine, MediaEvent::Play));
        let ev = signal(&machine, MediaEvent::Pause);
        assert_eq!(machine.handle_event(ev), Transition::Stopped);
        assert_eq!(machine.phase(), Phase::Paused);
    }

    #[test]
    fn seek_within_range_is_applied_and_saved() {
        let (mut machine, media) = loaded(None);
        machine.seek(4.25).unwrap();
        assert_eq!(machine.state().current_time, 4.25);
        assert_eq!(saved(&machine), Some(4.25));
        assert!(media.calls().contains(&"seek 4.25".to_string()));
    }

    #[test]
    fn seek_at_or_past_the_end_is_rejected() {
        let (mut machine, _) = loaded(None);
        machine.seek(2.0).unwrap();
        assert!(matches!(machine.seek(10.0), Err(SeekRejected::OutOfRange { .. })));
        assert!(matches!(machine.seek(12.5), Err(SeekRejected::OutOfRange { .. })));
        assert!(matches!(machine.seek(-1.0), Err(SeekRejected::Invalid(_))));
        assert!(machine.seek(f64::NAN).is_err());
        assert_eq!(machine.state().current_time, 2.0);
        assert_eq!(saved(&machine), Some(2.0));
    }

    #[test]
    fn seek_before_metadata_is_rejected() {
        let (mut machine, _) = machine_with_saved(None);
        machine.load(source());
        assert!(matches!(machine.seek(1.0), Err(SeekRejected::OutOfRange { .. })));
    }

    #[test]
    fn seek_by_clamps_into_the_track() {
        let (mut machine, _) = loaded(None);
        machine.seek_by(-5.0).unwrap();
        assert_eq!(machine.state().current_time, 0.0);
        machine.seek_by(60.0).unwrap();
        assert!(machine.state().current_time < 10.0);
    }

    #[test]
    fn saved_position_is_restored_when_metadata_arrives() {
        let (machine, media) = loaded(Some("3.2"));
        assert_eq!(machine.state().current_time, 3.2);
        assert_eq!(machine.state().duration, 10.0);
        assert_eq!(machine.phase(), Phase::Paused);
        assert!(media.calls().contains(&"seek 3.2".to_string()));
        assert!(!media.calls().contains(&"play".to_string()));
    }

    #[test]
    fn stale_saved_position_is_ignored() {
        let (machine, media) = loaded(Some("42"));
        assert_eq!(machine.state().current_time, 0.0);
        assert!(!media.calls().iter().any(|c| c.starts_with("seek")));

        let (machine, _) = loaded(Some("10"));
        assert_eq!(machine.state().current_time, 0.0);
    }

    #[test]
    fn time_updates_are_saved() {
        let (mut machine, _) = loaded(None);
        machine.handle_event(signal(&machine, MediaEvent::TimeUpdate(1.5)));
        assert_eq!(machine.state().current_time, 1.5);
        assert_eq!(saved(&machine), Some(1.5));
    }

    #[test]
    fn events_from_an_old_source_are_dropped() {
        let (mut machine, _) = loaded(None);
        let old = machine.source();
        machine.load(source());
        let late = MediaSignal {
            source: old,
            event: MediaEvent::TimeUpdate(7.0),
        };
        assert_eq!(machine.handle_event(late), Transition::None);
        assert_eq!(machine.state().current_time, 0.0);
        assert_eq!(saved(&machine), None);
    }

    #[test]
    fn ending_without_repeat_rewinds_and_forgets_the_position() {
        let (mut machine, _) = loaded(None);
        machine.handle_event(signal(&machine, MediaEvent::Play));
        machine.handle_event(signal(&machine, MediaEvent::TimeUpdate(9.9)));

        let ev = signal(&machine, MediaEvent::Ended);
        assert_eq!(machine.handle_event(ev), Transition::Ended);
        assert_eq!(machine.phase(), Phase::Ended);
        assert_eq!(machine.state().current_time, 0.0);
        assert!(!machine.state().is_playing);
        assert_eq!(saved(&machine), None);
    }

    #[test]
    fn ending_with_repeat_keeps_playing_and_keeps_the_position() {
        let (mut machine, media) = loaded(None);
        machine.handle_event(signal(&machine, MediaEvent::Play));
        machine.handle_event(signal(&machine, MediaEvent::TimeUpdate(9.9)));
        // flipped after the track started; the current value must win
        machine.toggle_repeat();
        assert!(media.calls().contains(&"looping true".to_string()));

        let ev = signal(&machine, MediaEvent::Ended);
        assert_eq!(machine.handle_event(ev), Transition::Looped);
        assert_eq!(machine.phase(), Phase::Playing);
        assert_eq!(saved(&machine), Some(9.9));
    }

    #[test]
    fn play_after_end_starts_again() {
        let (mut machine, _) = loaded(None);
        machine.handle_event(signal(&machine, MediaEvent::Ended));
        machine.play().unwrap();
        assert_eq!(machine.handle_event(signal(&machine, MediaEvent::Play)), Transition::Started);
    }

    #[test]
    fn volume_is_clamped_and_unmutes() {
        let (mut machine, media) = loaded(None);
        machine.set_volume(1.7);
        assert_eq!(machine.state().volume, 1.0);
        machine.set_volume(-0.2);
        assert_eq!(machine.state().volume, 0.0);

        machine.set_volume(0.4);
        machine.toggle_mute();
        assert!(machine.state().is_muted);
        machine.set_volume(0.6);
        assert!(!machine.state().is_muted);
        assert_eq!(media.calls().last().unwrap(), "volume 0.6");
    }

    #[test]
    fn muting_twice_restores_the_volume() {
        let (mut machine, media) = loaded(None);
        machine.set_volume(0.35);
        machine.toggle_mute();
        assert_eq!(media.calls().last().unwrap(), "volume 0");
        machine.toggle_mute();
        assert_eq!(machine.state().volume, 0.35);
        assert!(!machine.state().is_muted);
        assert_eq!(media.calls().last().unwrap(), "volume 0.35");
    }

    #[test]
    fn unmuting_from_zero_uses_the_last_audible_volume() {
        let (mut machine, _) = machine_with_saved(None);
        machine.set_volume(0.0);
        machine.toggle_mute();
        machine.toggle_mute();
        assert_eq!(machine.state().volume, DEFAULT_UNMUTE_VOLUME);
    }

    #[test]
    fn reset_empties_everything() {
        let (mut machine, media) = loaded(Some("3.0"));
        machine.reset();
        assert_eq!(machine.phase(), Phase::Empty);
        assert_eq!(machine.source(), None);
        assert_eq!(machine.state().current_time, 0.0);
        assert_eq!(saved(&machine), None);
        assert_eq!(media.calls().last().unwrap(), "unload");
    }
}
