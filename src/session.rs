//! Session reconstruction.
//!
//! The log is a flat stream of history lines and session boundaries keyed by
//! pid. Pids get reused, so one pid can own several sessions over time. The
//! reconstructor walks the stream newest first, buffering history per pid
//! and closing the buffer whenever a boundary for that pid shows up.

use std::collections::{BTreeMap, HashMap};

use crate::db::{Db, Event, EventKind, Order, MAX_TIMESTAMP};
use crate::error::StoreError;

/// A session: a pid plus which of that pid's sessions it is, counting back
/// from the most recent (occurrence 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId {
    pub pid: i64,
    pub occurrence: usize,
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.occurrence == 0 {
            write!(f, "{}", self.pid)
        } else {
            write!(f, "{}_{}", self.pid, self.occurrence)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub timestamp: i64,
    pub command: String,
}

impl Entry {
    pub fn new(timestamp: i64, command: impl Into<String>) -> Self {
        Self {
            timestamp,
            command: command.into(),
        }
    }
}

/// Entries of one session in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub entries: Vec<Entry>,
}

impl Transcript {
    pub fn last_timestamp(&self) -> Option<i64> {
        self.entries.last().map(|e| e.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type Sessions = BTreeMap<SessionId, Transcript>;

#[derive(Default)]
struct Reconstructor {
    open: HashMap<i64, Vec<Entry>>,
    completed: HashMap<i64, Vec<Transcript>>,
}

impl Reconstructor {
    fn push(&mut self, event: Event) {
        match event.kind {
            EventKind::History => {
                self.open.entry(event.pid).or_default().push(Entry {
                    timestamp: event.timestamp,
                    command: event.command.unwrap_or_default(),
                });
            }
            EventKind::SessionStart | EventKind::SessionStop => self.close(event.pid),
        }
    }

    /// Boundaries with nothing buffered close nothing.
    fn close(&mut self, pid: i64) {
        if let Some(mut entries) = self.open.remove(&pid) {
            entries.reverse();
            self.completed
                .entry(pid)
                .or_default()
                .push(Transcript { entries });
        }
    }

    fn finish(mut self) -> Sessions {
        let pending: Vec<i64> = self.open.keys().copied().collect();
        for pid in pending {
            self.close(pid);
        }

        let mut sessions = Sessions::new();
        for (pid, transcripts) in self.completed {
            for (occurrence, transcript) in transcripts.into_iter().enumerate() {
                sessions.insert(SessionId { pid, occurrence }, transcript);
            }
        }
        sessions
    }
}

/// Groups a newest-first event stream into sessions.
///
/// Each history line lands in exactly one transcript. History with no
/// boundary after it in the stream (an ongoing session, or one whose marker
/// fell outside the window read) is still emitted as its own session.
pub fn reconstruct<I>(events: I) -> Sessions
where
    I: IntoIterator<Item = Event>,
{
    let mut reconstructor = Reconstructor::default();
    for event in events {
        reconstructor.push(event);
    }
    reconstructor.finish()
}

/// Same as [`reconstruct`] for a stream that is oldest first.
pub fn reconstruct_chronological<I>(events: I) -> Sessions
where
    I: IntoIterator<Item = Event>,
    I::IntoIter: DoubleEndedIterator,
{
    reconstruct(events.into_iter().rev())
}

/// Reads the newest `limit` events (all of them when `None`) and rebuilds
/// their sessions.
/// Reads the store newest first and rebuilds its sessions. `since` drops
/// older events; `limit` keeps only the newest N of what remains.
pub fn load(db: &Db, since: Option<i64>, limit: Option<usize>) -> Result<Sessions, StoreError> {
    let events = match since {
        None => db.query_all(Order::NewestFirst, limit)?,
        Some(since) => {
            let mut events = db.events_between(since, MAX_TIMESTAMP)?;
            if let Some(limit) = limit {
                events.drain(..events.len().saturating_sub(limit));
            }
            events.reverse();
            events
        }
    };
    tracing::debug!(events = events.len(), "reconstructing sessions");
    Ok(reconstruct(events))
}
