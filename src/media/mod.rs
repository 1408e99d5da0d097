//! The media element: one playback engine, driven by commands, reporting back with events.
mod audio_file;
mod player;
mod tap;

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{error::PlaybackRejected, handles::HandleId};

pub use audio_file::AudioFile;
pub use player::PlayerRemote;
pub use tap::{SampleTap, TAP_CAPACITY, Tapped};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl ElementId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ElementId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media element #{}", self.0)
    }
}

/// What to load: the handle plus the display name, whose extension hints the container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub handle: HandleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    Play,
    Pause,
    TimeUpdate(f64),
    Ended,
    PlaybackRejected(PlaybackRejected),
}

/// An event tagged with the handle that was loaded when it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSignal {
    pub source: Option<HandleId>,
    pub event: MediaEvent,
}

pub trait MediaElement {
    fn element_id(&self) -> ElementId;
    fn load(&mut self, source: Option<&MediaSource>);
    /// Asks the engine to start. `Play` arrives as an event once it actually has.
    fn play(&mut self) -> Result<(), PlaybackRejected>;
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: f32);
    fn set_looping(&mut self, looping: bool);
    fn attach_tap(&mut self, tap: SampleTap);
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    /// Records every call so tests can assert on what the engine was told.
    #[derive(Clone)]
    pub(crate) struct FakeMedia {
        pub id: ElementId,
        pub calls: Rc<RefCell<Vec<String>>>,
        pub reject_play: bool,
        pub taps: Rc<RefCell<Vec<SampleTap>>>,
    }

    impl FakeMedia {
        pub fn new() -> Self {
            Self {
                id: ElementId::next(),
                calls: Rc::default(),
                reject_play: false,
                taps: Rc::default(),
            }
        }

        pub fn sharing_journal(journal: Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                calls: journal,
                ..Self::new()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl MediaElement for FakeMedia {
        fn element_id(&self) -> ElementId {
            self.id
        }

        fn load(&mut self, source: Option<&MediaSource>) {
            match source {
                Some(source) => self.record(format!("load {}", source.handle)),
                None => self.record("unload".into()),
            }
        }

        fn play(&mut self) -> Result<(), PlaybackRejected> {
            if self.reject_play {
                return Err(PlaybackRejected::NoOutput("muted by policy".into()));
            }
            self.record("play".into());
            Ok(())
        }

        fn pause(&mut self) {
            self.record("pause".into());
        }

        fn seek(&mut self, seconds: f64) {
            self.record(format!("seek {seconds}"));
        }

        fn set_volume(&mut self, volume: f32) {
            self.record(format!("volume {volume}"));
        }

        fn set_looping(&mut self, looping: bool) {
            self.record(format!("looping {looping}"));
        }

        fn attach_tap(&mut self, tap: SampleTap) {
            self.record("tap".into());
            self.taps.borrow_mut().push(tap);
        }
    }
}
