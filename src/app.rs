//! Wires playback, handles, persistence and the visualizer together, and owns the
//! cross-cutting flows: restoring the last session, taking in new files, reset and replace.
use log::{debug, info, warn};

use crate::{
    background::Background,
    builtin_themes::Theme,
    config::Config,
    error::{PlaybackRejected, SeekRejected},
    handles::{HandleHost, HandleManager},
    intake::{IntakeFile, MediaKind},
    media::{MediaElement, MediaSignal, MediaSource},
    playback::{Phase, PlaybackMachine, PlayerState, Transition},
    position::{KeyValueStore, PlaybackPosition},
    store::{Blob, PersistenceWorker, StorageKey, StoreCompletion, StoreOp, StoreOutcome, Ticket},
    visualizer::{AudioGraph, Canvas, FrameClock, Rgba, SpectrumRenderer, SpectrumStyle, Visualizer},
};

pub const EMPTY_LABEL: &str = "Drop an audio file or press o to open";
pub const UNTITLED_LABEL: &str = "Untitled track";

pub struct App<M: MediaElement, H: HandleHost, S: KeyValueStore> {
    visualizer: Visualizer<FrameClock>,
    graph: AudioGraph,
    playback: PlaybackMachine<M, S>,
    handles: HandleManager<H>,
    store: PersistenceWorker,
    background: Background,
    theme: Theme,
    file_name: Option<String>,
    // restored name waiting for its blob
    restored_name: Option<String>,
    restoring: [bool; 2],
    replace_open: bool,
}

impl<M: MediaElement, H: HandleHost, S: KeyValueStore> App<M, H, S> {
    pub fn new(media: M, host: H, positions: S, store: PersistenceWorker, config: &Config) -> Self {
        let theme = config.theme();
        let mut playback = PlaybackMachine::new(media, PlaybackPosition::new(positions), config.initial_volume);
        let mut graph = AudioGraph::new();
        let renderer = SpectrumRenderer::new(SpectrumStyle {
            accent: Rgba::from_color(theme.bar_base),
            peak: Rgba::from_color(theme.bar_peak),
            fade: config.fade,
            bar_gap: config.bar_gap,
            bar_radius: config.bar_radius,
        });
        let mut visualizer = Visualizer::new(
            FrameClock::new(),
            Canvas::new(config.canvas_width, config.canvas_height),
            renderer,
        );
        match graph.connect(playback.media_mut()) {
            Ok(analyser) => visualizer.set_analyser(analyser),
            Err(err) => warn!("spectrum disabled: {err}"),
        }
        Self {
            visualizer,
            graph,
            playback,
            handles: HandleManager::new(host),
            store,
            background: Background::new(),
            theme,
            file_name: None,
            restored_name: None,
            restoring: [false; 2],
            replace_open: false,
        }
    }

    /// Asks the store for the last session. The name is requested before the blob so
    /// it is at hand when the blob arrives.
    pub fn restore(&mut self) {
        let audio = self.ticket(MediaKind::Audio);
        self.store.submit(audio, StoreOp::Get(StorageKey::SavedFileName));
        self.store.submit(audio, StoreOp::Get(StorageKey::SavedAudioBlob));
        self.store
            .submit(self.ticket(MediaKind::Image), StoreOp::Get(StorageKey::SavedBgBlob));
        self.restoring = [true; 2];
    }

    /// True while either saved asset is still on its way.
    pub fn loading(&self) -> bool {
        self.restoring.iter().any(|pending| *pending)
    }

    pub fn state(&self) -> PlayerState {
        self.playback.state()
    }

    pub fn is_loaded(&self) -> bool {
        self.playback.phase() != Phase::Empty
    }

    pub fn label(&self) -> &str {
        self.file_name.as_deref().unwrap_or(EMPTY_LABEL)
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn visualizer(&self) -> &Visualizer<FrameClock> {
        &self.visualizer
    }

    pub fn background_mut(&mut self) -> &mut Background {
        &mut self.background
    }

    pub fn is_replace_open(&self) -> bool {
        self.replace_open
    }

    /// Takes a new track. Files that are not audio are ignored.
    pub fn intake_audio(&mut self, file: &IntakeFile) -> bool {
        if !file.accepts(MediaKind::Audio) {
            debug!("ignoring {} ({}): not audio", file.name, file.type_label());
            return false;
        }
        let asset = match file.read() {
            Ok(asset) => asset,
            Err(err) => {
                warn!("could not read {}: {err}", file.path.display());
                return false;
            }
        };
        info!("loading {} ({})", asset.display_name, file.type_label());
        self.restoring[MediaKind::Audio.index()] = false;
        self.restored_name = None;
        self.playback.clear_saved_position();
        self.show_audio(asset.blob.clone(), asset.display_name.clone());

        let ticket = self.ticket(MediaKind::Audio);
        self.store
            .submit(ticket, StoreOp::Set(StorageKey::SavedAudioBlob, asset.blob));
        self.store.submit(
            ticket,
            StoreOp::Set(StorageKey::SavedFileName, Blob::from(asset.display_name.as_bytes())),
        );
        true
    }

    /// Takes a new background picture. It is only persisted if it decodes.
    pub fn intake_image(&mut self, file: &IntakeFile) -> bool {
        if !file.accepts(MediaKind::Image) {
            debug!("ignoring {} ({}): not an image", file.name, file.type_label());
            return false;
        }
        let asset = match file.read() {
            Ok(asset) => asset,
            Err(err) => {
                warn!("could not read {}: {err}", file.path.display());
                return false;
            }
        };
        self.restoring[MediaKind::Image.index()] = false;
        if !self.show_image(asset.blob.clone()) {
            return false;
        }
        self.store.submit(
            self.ticket(MediaKind::Image),
            StoreOp::Set(StorageKey::SavedBgBlob, asset.blob),
        );
        true
    }

    /// Forgets the track: handle revoked, saved blob, name and position removed.
    /// The background stays.
    pub fn reset(&mut self) {
        info!("reset");
        self.visualizer.stop();
        self.visualizer.clear();
        self.playback.reset();
        self.handles.release(MediaKind::Audio);
        self.file_name = None;
        self.restored_name = None;
        self.restoring[MediaKind::Audio.index()] = false;
        self.replace_open = false;

        let ticket = self.ticket(MediaKind::Audio);
        self.store.submit(ticket, StoreOp::Delete(StorageKey::SavedAudioBlob));
        self.store.submit(ticket, StoreOp::Delete(StorageKey::SavedFileName));
    }

    pub fn open_replace(&mut self) {
        self.replace_open = true;
    }

    pub fn cancel_replace(&mut self) {
        self.replace_open = false;
    }

    /// Reset, then take `file`. A file that is not audio leaves everything as it was.
    pub fn replace(&mut self, file: &IntakeFile) -> bool {
        if !file.accepts(MediaKind::Audio) {
            debug!("replace ignored {}: not audio", file.name);
            return false;
        }
        self.reset();
        self.intake_audio(file)
    }

    /// A dropped file: goes through the replace flow when its modal is open.
    pub fn drop_file(&mut self, file: &IntakeFile) -> bool {
        if self.replace_open {
            self.replace(file)
        } else {
            self.intake_audio(file)
        }
    }

    pub fn toggle_play(&mut self) {
        if let Err(err) = self.playback.toggle_play() {
            match err {
                PlaybackRejected::NoSource => debug!("nothing to play"),
                err => warn!("play refused: {err}"),
            }
        }
    }

    pub fn seek_by(&mut self, delta: f64) {
        if let Err(err) = self.playback.seek_by(delta) {
            match err {
                SeekRejected::NoSource => debug!("seek ignored: {err}"),
                err => warn!("seek ignored: {err}"),
            }
        }
    }

    pub fn nudge_volume(&mut self, delta: f32) {
        let volume = self.playback.state().volume;
        self.playback.set_volume(volume + delta);
    }

    pub fn toggle_mute(&mut self) {
        self.playback.toggle_mute();
    }

    pub fn toggle_repeat(&mut self) {
        self.playback.toggle_repeat();
    }

    /// Feeds one engine event through the state machine and starts or stops the
    /// spectrum to match.
    pub fn handle_media_event(&mut self, signal: MediaSignal) -> Transition {
        let transition = self.playback.handle_event(signal);
        match transition {
            Transition::Started => self.visualizer.start(&mut self.graph),
            Transition::Stopped | Transition::Ended => self.visualizer.stop(),
            Transition::Looped | Transition::Loaded | Transition::Restored(_) | Transition::None => {}
        }
        transition
    }

    /// Applies every finished store request.
    pub fn pump_store(&mut self) {
        while let Some(completion) = self.store.try_completion() {
            self.handle_store_completion(completion);
        }
    }

    pub fn handle_store_completion(&mut self, completion: StoreCompletion) {
        let StoreCompletion { ticket, op, outcome } = completion;
        let key = op.key();
        if ticket.generation != self.handles.generation(ticket.kind) {
            debug!("discarding stale {} completion", key.as_str());
            return;
        }
        match outcome {
            Ok(StoreOutcome::Fetched(value)) => self.on_fetched(key, value),
            Ok(StoreOutcome::Written) => debug!("saved {}", key.as_str()),
            Ok(StoreOutcome::Deleted) => debug!("deleted {}", key.as_str()),
            Err(err) => {
                warn!("storage failed for {}: {err}", key.as_str());
                match op {
                    StoreOp::Get(StorageKey::SavedAudioBlob) => self.restoring[MediaKind::Audio.index()] = false,
                    StoreOp::Get(StorageKey::SavedBgBlob) => self.restoring[MediaKind::Image.index()] = false,
                    // an older blob must never be restored under this name
                    StoreOp::Set(StorageKey::SavedAudioBlob, _) => {
                        self.store.submit(ticket, StoreOp::Delete(StorageKey::SavedAudioBlob));
                        self.store.submit(ticket, StoreOp::Delete(StorageKey::SavedFileName));
                    }
                    _ => {}
                }
            }
        }
    }

    /// Serves due animation frames.
    pub fn tick_frames(&mut self) {
        self.visualizer.tick();
    }

    fn on_fetched(&mut self, key: StorageKey, value: Option<Blob>) {
        let kind = match key {
            StorageKey::SavedAudioBlob | StorageKey::SavedFileName => MediaKind::Audio,
            StorageKey::SavedBgBlob => MediaKind::Image,
        };
        if !self.restoring[kind.index()] {
            debug!("{} arrived after its restore was abandoned", key.as_str());
            return;
        }
        match key {
            StorageKey::SavedFileName => {
                self.restored_name = value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            }
            StorageKey::SavedAudioBlob => {
                self.restoring[kind.index()] = false;
                let name = self.restored_name.take();
                if let Some(blob) = value {
                    let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| UNTITLED_LABEL.to_string());
                    info!("restoring {name}");
                    self.show_audio(blob, name);
                }
            }
            StorageKey::SavedBgBlob => {
                self.restoring[kind.index()] = false;
                if let Some(blob) = value {
                    self.show_image(blob);
                }
            }
        }
    }

    fn show_audio(&mut self, blob: Blob, name: String) {
        self.visualizer.stop();
        self.visualizer.clear();
        let handle = self.handles.activate(MediaKind::Audio, blob);
        self.playback.load(MediaSource {
            handle,
            name: name.clone(),
        });
        self.file_name = Some(name);
    }

    fn show_image(&mut self, blob: Blob) -> bool {
        let handle = self.handles.activate(MediaKind::Image, blob);
        match self.background.set_from_blob(self.handles.resolve(handle)) {
            Ok(()) => true,
            Err(err) => {
                warn!("background not changed: {err}");
                self.handles.release(MediaKind::Image);
                false
            }
        }
    }

    fn ticket(&self, kind: MediaKind) -> Ticket {
        Ticket {
            kind,
            generation: self.handles.generation(kind),
        }
    }
}

/// `m:ss`, as shown next to the progress bar.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}
