//! Live spectrum of whatever is playing.
//!
//! The frame loop runs only while the track plays: [`Visualizer::start`] schedules a
//! frame, every frame schedules its successor before drawing, and [`Visualizer::stop`]
//! (or dropping the visualizer) cancels the one frame that is pending.
mod analyser;
mod canvas;
mod frame_clock;
mod spectrum;
mod view;

use log::debug;

use analyser::{Analyser, AnalyserFrame, BIN_COUNT, ContextState};
pub use analyser::AudioGraph;
pub use canvas::{Canvas, Rgba};
use frame_clock::{FrameId, FrameScheduler};
pub use frame_clock::FrameClock;
pub use spectrum::{SpectrumRenderer, SpectrumStyle};
pub use view::CanvasView;
pub(crate) use view::UPPER_HALF;

pub struct Visualizer<F: FrameScheduler = FrameClock> {
    scheduler: F,
    analyser: Option<Analyser>,
    canvas: Canvas,
    renderer: SpectrumRenderer,
    frame: AnalyserFrame,
    pending: Option<FrameId>,
}

impl<F: FrameScheduler> Visualizer<F> {
    pub fn new(scheduler: F, canvas: Canvas, renderer: SpectrumRenderer) -> Self {
        Self {
            scheduler,
            analyser: None,
            canvas,
            renderer,
            frame: [0; BIN_COUNT],
            pending: None,
        }
    }

    pub fn set_analyser(&mut self, analyser: Analyser) {
        self.analyser = Some(analyser);
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    /// Playback started: wake the graph if needed and begin drawing.
    pub fn start(&mut self, graph: &mut AudioGraph) {
        if graph.state() == ContextState::Suspended {
            graph.resume();
        }
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
            debug!("spectrum loop started");
        }
    }

    pub fn stop(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel_frame(id);
            debug!("spectrum loop stopped");
        }
    }

    /// Serves every frame the scheduler says is due.
    pub fn tick(&mut self) {
        for id in self.scheduler.take_due() {
            self.on_frame(id);
        }
    }

    /// Returns false for frames that are not the pending one.
    pub fn on_frame(&mut self, id: FrameId) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = Some(self.scheduler.request_frame());
        match &mut self.analyser {
            Some(analyser) => analyser.byte_frequency_data(&mut self.frame),
            None => self.frame.fill(0),
        }
        self.renderer.draw(&mut self.canvas, &self.frame);
        true
    }

    /// Wipes the trail and the analyser history, for when the track changes.
    pub fn clear(&mut self) {
        self.canvas.clear();
        self.frame.fill(0);
        if let Some(analyser) = &mut self.analyser {
            analyser.reset();
        }
    }
}

impl<F: FrameScheduler> Drop for Visualizer<F> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::canvas::Paint;
    use super::*;
    use crate::media::tests::FakeMedia;

    /// Clock whose pending set outlives the visualizer, to check teardown.
    #[derive(Clone, Default)]
    struct SharedClock(Rc<RefCell<FrameClock>>);

    impl FrameScheduler for SharedClock {
        fn request_frame(&mut self) -> FrameId {
            self.0.borrow_mut().request_frame()
        }
        fn cancel_frame(&mut self, id: FrameId) {
            self.0.borrow_mut().cancel_frame(id);
        }
        fn take_due(&mut self) -> Vec<FrameId> {
            self.0.borrow_mut().take_due()
        }
    }

    fn style() -> SpectrumStyle {
        SpectrumStyle {
            accent: Rgba::opaque(128, 0, 128),
            peak: Rgba::opaque(255, 255, 255),
            fade: 0.3,
            bar_gap: 1.0,
            bar_radius: 1.0,
        }
    }

    fn visualizer<F: FrameScheduler>(clock: F) -> Visualizer<F> {
        Visualizer::new(clock, Canvas::new(64, 32), SpectrumRenderer::new(style()))
    }

    fn canvas_snapshot<F: FrameScheduler>(v: &Visualizer<F>) -> Vec<Rgba> {
        let c = v.canvas();
        (0..c.height())
            .flat_map(|y| (0..c.width()).map(move |x| (x, y)))
            .map(|(x, y)| c.pixel(x, y))
            .collect()
    }

    #[test]
    fn start_resumes_the_graph_and_keeps_one_frame_pending() {
        let mut graph = AudioGraph::new();
        let mut v = visualizer(FrameClock::new());
        v.start(&mut graph);
        v.start(&mut graph);
        assert_eq!(graph.state(), ContextState::Running);
        assert_eq!(v.scheduler().outstanding(), 1);

        for _ in 0..5 {
            v.tick();
            assert_eq!(v.scheduler().outstanding(), 1);
        }
    }

    #[test]
    fn stop_cancels_within_one_tick_and_the_canvas_freezes() {
        let mut graph = AudioGraph::new();
        let mut media = FakeMedia::new();
        let mut v = visualizer(FrameClock::new());
        v.set_analyser(graph.connect(&mut media).unwrap());
        v.start(&mut graph);
        v.tick();

        v.stop();
        assert!(!v.is_running());
        assert_eq!(v.scheduler().outstanding(), 0);

        let frozen = canvas_snapshot(&v);
        for _ in 0..3 {
            v.tick();
        }
        assert_eq!(canvas_snapshot(&v), frozen);
    }

    #[test]
    fn stale_frame_ids_are_ignored() {
        let mut graph = AudioGraph::new();
        let mut v = visualizer(FrameClock::new());
        v.start(&mut graph);
        let due = v.scheduler.take_due();
        assert!(v.on_frame(due[0]));
        assert!(!v.on_frame(due[0]));
    }

    #[test]
    fn dropping_cancels_the_pending_frame() {
        let clock = SharedClock::default();
        let mut graph = AudioGraph::new();
        {
            let mut v = visualizer(clock.clone());
            v.start(&mut graph);
            assert_eq!(clock.0.borrow().outstanding(), 1);
        }
        assert_eq!(clock.0.borrow().outstanding(), 0);
    }

    #[test]
    fn clear_wipes_the_trail_and_the_heard_samples() {
        let mut graph = AudioGraph::new();
        graph.resume();
        let mut media = FakeMedia::new();
        let mut v = visualizer(FrameClock::new());
        v.set_analyser(graph.connect(&mut media).unwrap());
        let tap = media.taps.borrow()[0].clone();
        crate::visualizer::analyser::tests::feed(&tap, vec![0.5; 512]);
        v.canvas.fill_rect(0.0, 0.0, 64.0, 32.0, &Paint::Solid(Rgba::opaque(1, 2, 3)));

        v.clear();
        assert!(canvas_snapshot(&v).iter().all(|p| p.a == 0.0));
        assert_eq!(tap.latest(&mut [0.0; 1]), None);
    }
}
