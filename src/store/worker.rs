use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, SendError, Sender, TryRecvError, unbounded};
use eyre::{Result, WrapErr};
use log::{debug, warn};

use super::{Blob, BlobStore, StorageKey};
use crate::{error::StorageError, handles::Generation, intake::MediaKind};

/// Identifies which asset a request was made for, and which activation of it was current at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: MediaKind,
    pub generation: Generation,
}

#[derive(Debug, Clone)]
pub enum StoreOp {
    Get(StorageKey),
    Set(StorageKey, Blob),
    Delete(StorageKey),
}

impl StoreOp {
    pub fn key(&self) -> StorageKey {
        match self {
            StoreOp::Get(key) | StoreOp::Set(key, _) | StoreOp::Delete(key) => *key,
        }
    }
}

#[derive(Debug)]
pub enum StoreOutcome {
    Fetched(Option<Blob>),
    Written,
    Deleted,
}

#[derive(Debug)]
pub struct StoreCompletion {
    pub ticket: Ticket,
    pub op: StoreOp,
    pub outcome: Result<StoreOutcome, StorageError>,
}

impl StoreCompletion {
    pub fn key(&self) -> StorageKey {
        self.op.key()
    }
}

struct Request {
    ticket: Ticket,
    op: StoreOp,
}

/// Runs a [`BlobStore`] on its own thread. Submissions return at once; results come
/// back through [`PersistenceWorker::try_completion`] in submission order.
pub struct PersistenceWorker {
    requests: Option<Sender<Request>>,
    completions_tx: Sender<StoreCompletion>,
    completions: Receiver<StoreCompletion>,
    thread: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    pub fn spawn<B: BlobStore>(mut store: B) -> Result<Self> {
        let (requests, request_rx) = unbounded::<Request>();
        let (completions_tx, completions) = unbounded::<StoreCompletion>();
        let tx = completions_tx.clone();
        let thread = thread::Builder::new()
            .name("persistence".into())
            .spawn(move || {
                for Request { ticket, op } in request_rx {
                    let key = op.key();
                    let outcome = match &op {
                        StoreOp::Get(key) => store.get(*key).map(StoreOutcome::Fetched),
                        StoreOp::Set(key, value) => store.set(*key, value.clone()).map(|()| StoreOutcome::Written),
                        StoreOp::Delete(key) => store.delete(*key).map(|()| StoreOutcome::Deleted),
                    };
                    if tx.send(StoreCompletion { ticket, op, outcome }).is_err() {
                        debug!("completion for {} dropped, nobody is listening", key.as_str());
                    }
                }
            })
            .wrap_err("failed to spawn persistence thread")?;
        Ok(Self {
            requests: Some(requests),
            completions_tx,
            completions,
            thread: Some(thread),
        })
    }

    pub fn submit(&self, ticket: Ticket, op: StoreOp) {
        let Some(requests) = &self.requests else {
            return self.refuse(ticket, op);
        };
        if let Err(SendError(Request { ticket, op })) = requests.send(Request { ticket, op }) {
            self.refuse(ticket, op);
        }
    }

    fn refuse(&self, ticket: Ticket, op: StoreOp) {
        warn!("persistence worker gone, {} not processed", op.key().as_str());
        let _ = self.completions_tx.send(StoreCompletion {
            ticket,
            op,
            outcome: Err(StorageError::WorkerGone),
        });
    }

    pub fn try_completion(&self) -> Option<StoreCompletion> {
        match self.completions.try_recv() {
            Ok(completion) => Some(completion),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    #[cfg(test)]
    pub fn completions(&self) -> &Receiver<StoreCompletion> {
        &self.completions
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        // closing the queue lets the thread finish pending writes and exit
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("persistence thread panicked");
            }
        }
    }
}
