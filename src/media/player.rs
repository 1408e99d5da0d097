use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use eyre::{Result, WrapErr};
use log::{debug, info, warn};

use super::{AudioFile, ElementId, MediaElement, MediaEvent, MediaSignal, MediaSource, SampleTap, Tapped};
use crate::error::PlaybackRejected;
use crate::handles::{HandleHost, HandleId, MediaRegistry};

const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

pub enum PlayerCommand {
    Load(Option<MediaSource>),
    Play,
    Pause,
    Seek(f64),
    SetVolume(f32),
    SetLooping(bool),
    AttachTap(SampleTap),
}

#[derive(Debug, PartialEq)]
enum PlaybackState {
    Playing,
    Paused,
}

/// The engine. Lives on its own thread and owns the output stream, so nothing
/// else ever touches the sink.
pub struct AudioPlayer {
    registry: MediaRegistry,
    events: Sender<MediaSignal>,
    output: Option<(rodio::OutputStream, rodio::Sink)>,
    output_error: Option<String>,
    audio_file: Option<AudioFile>,
    source: Option<HandleId>,
    state: PlaybackState,
    looping: Arc<AtomicBool>,
    volume: f32,
    tap: Option<SampleTap>,
    last_update: Instant,
}

impl AudioPlayer {
    fn new(registry: MediaRegistry, events: Sender<MediaSignal>) -> Self {
        let (output, output_error) = match rodio::OutputStreamBuilder::open_default_stream() {
            Ok(mut stream) => {
                stream.log_on_drop(false);
                let sink = rodio::Sink::connect_new(stream.mixer());
                sink.pause();
                (Some((stream, sink)), None)
            }
            Err(err) => {
                warn!("no audio output: {err}");
                (None, Some(err.to_string()))
            }
        };
        Self {
            registry,
            events,
            output,
            output_error,
            audio_file: None,
            source: None,
            state: PlaybackState::Paused,
            looping: Arc::default(),
            volume: 1.0,
            tap: None,
            last_update: Instant::now(),
        }
    }

    pub fn run(mut self, commands: Receiver<PlayerCommand>) {
        loop {
            match commands.recv_timeout(Duration::from_millis(10)) {
                Ok(cmd) => self.apply(cmd),
                Err(RecvTimeoutError::Timeout) => (),
                // the remote is gone, so is the session
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.poll_progress();
        }
        debug!("player thread stopping");
    }

    fn apply(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::Load(source) => self.load(source),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => {
                if self.state == PlaybackState::Playing {
                    if let Some((_, sink)) = &self.output {
                        sink.pause();
                    }
                    self.state = PlaybackState::Paused;
                    self.emit(MediaEvent::Pause);
                }
            }
            PlayerCommand::Seek(seconds) => {
                if let Some(file) = &self.audio_file {
                    file.seek(seconds);
                    self.emit(MediaEvent::TimeUpdate(file.position()));
                }
            }
            PlayerCommand::SetVolume(volume) => {
                self.volume = volume;
                if let Some((_, sink)) = &self.output {
                    sink.set_volume(volume);
                }
            }
            PlayerCommand::SetLooping(looping) => self.looping.store(looping, Ordering::Relaxed),
            PlayerCommand::AttachTap(tap) => {
                self.tap = Some(tap);
                // re-queue so the current track flows through the tap too
                self.requeue();
            }
        }
    }

    fn load(&mut self, source: Option<MediaSource>) {
        if let Some((_, sink)) = &self.output {
            sink.clear();
        }
        self.audio_file = None;
        self.state = PlaybackState::Paused;
        self.source = source.as_ref().map(|s| s.handle);
        let Some(source) = source else {
            return;
        };

        let Some(bytes) = self.registry.resolve(source.handle) else {
            self.emit(MediaEvent::PlaybackRejected(PlaybackRejected::Decode(format!(
                "{} was revoked before it loaded",
                source.handle
            ))));
            return;
        };
        match AudioFile::decode(bytes, &source.name, Arc::clone(&self.looping)) {
            Ok(file) => {
                let duration = file.duration();
                info!("loaded {} ({duration:.1}s)", source.name);
                self.audio_file = Some(file);
                self.requeue();
                self.emit(MediaEvent::LoadedMetadata { duration });
            }
            Err(err) => {
                warn!("could not decode {}: {err:#}", source.name);
                self.emit(MediaEvent::PlaybackRejected(PlaybackRejected::Decode(err.to_string())));
            }
        }
    }

    fn play(&mut self) {
        if self.audio_file.is_none() {
            self.emit(MediaEvent::PlaybackRejected(PlaybackRejected::NoSource));
            return;
        }
        let Some((_, sink)) = &self.output else {
            let reason = self.output_error.clone().unwrap_or_default();
            self.emit(MediaEvent::PlaybackRejected(PlaybackRejected::NoOutput(reason)));
            return;
        };
        if self.state == PlaybackState::Playing {
            return;
        }
        sink.play();
        self.state = PlaybackState::Playing;
        self.last_update = Instant::now();
        self.emit(MediaEvent::Play);
    }

    /// Puts the loaded track back into an empty sink at its current cursor.
    fn requeue(&mut self) {
        let (Some((_, sink)), Some(file)) = (&self.output, &self.audio_file) else {
            return;
        };
        sink.clear();
        sink.set_volume(self.volume);
        sink.append(Tapped::new(file.clone(), self.tap.clone()));
        if self.state == PlaybackState::Playing {
            sink.play();
        }
    }

    fn poll_progress(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(file) = &self.audio_file else {
            return;
        };
        let drained = self.output.as_ref().is_some_and(|(_, sink)| sink.empty());
        if drained || (file.is_finished() && !self.looping.load(Ordering::Relaxed)) {
            // park at the start, paused, still loaded
            file.seek(0.0);
            self.state = PlaybackState::Paused;
            self.requeue();
            self.emit(MediaEvent::Ended);
        } else if self.last_update.elapsed() >= TIME_UPDATE_INTERVAL {
            self.last_update = Instant::now();
            let position = file.position();
            self.emit(MediaEvent::TimeUpdate(position));
        }
    }

    fn emit(&self, event: MediaEvent) {
        if self
            .events
            .send(MediaSignal {
                source: self.source,
                event,
            })
            .is_err()
        {
            debug!("media event dropped, ui is gone");
        }
    }
}

/// UI-side handle on the player thread.
pub struct PlayerRemote {
    id: ElementId,
    commands: Sender<PlayerCommand>,
}

impl PlayerRemote {
    pub fn spawn(registry: MediaRegistry, events: Sender<MediaSignal>) -> Result<Self> {
        let (commands, command_rx) = unbounded::<PlayerCommand>();
        thread::Builder::new()
            .name("player".into())
            .spawn(move || AudioPlayer::new(registry, events).run(command_rx))
            .wrap_err("failed to spawn player thread")?;
        Ok(Self {
            id: ElementId::next(),
            commands,
        })
    }

    fn send(&self, cmd: PlayerCommand) -> Result<(), PlaybackRejected> {
        self.commands.send(cmd).map_err(|_| PlaybackRejected::EngineGone)
    }

    fn send_or_log(&self, cmd: PlayerCommand) {
        if let Err(err) = self.send(cmd) {
            warn!("{err}");
        }
    }
}

impl MediaElement for PlayerRemote {
    fn element_id(&self) -> ElementId {
        self.id
    }

    fn load(&mut self, source: Option<&MediaSource>) {
        self.send_or_log(PlayerCommand::Load(source.cloned()));
    }

    fn play(&mut self) -> Result<(), PlaybackRejected> {
        self.send(PlayerCommand::Play)
    }

    fn pause(&mut self) {
        self.send_or_log(PlayerCommand::Pause);
    }

    fn seek(&mut self, seconds: f64) {
        self.send_or_log(PlayerCommand::Seek(seconds));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send_or_log(PlayerCommand::SetVolume(volume));
    }

    fn set_looping(&mut self, looping: bool) {
        self.send_or_log(PlayerCommand::SetLooping(looping));
    }

    fn attach_tap(&mut self, tap: SampleTap) {
        self.send_or_log(PlayerCommand::AttachTap(tap));
    }
}
