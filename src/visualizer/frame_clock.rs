use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameId(u64);

/// Something that calls back once per display refresh.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
    /// Hands out every request made before this tick. Requests made while those
    /// are being served wait for the next tick.
    fn take_due(&mut self) -> Vec<FrameId>;
}

/// The terminal's refresh: the ui loop calls [`FrameScheduler::take_due`] at the configured fps.
#[derive(Debug, Default)]
pub struct FrameClock {
    next: u64,
    pending: BTreeSet<FrameId>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for FrameClock {
    fn request_frame(&mut self) -> FrameId {
        self.next += 1;
        let id = FrameId(self.next);
        self.pending.insert(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        self.pending.remove(&id);
    }

    fn take_due(&mut self) -> Vec<FrameId> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}
