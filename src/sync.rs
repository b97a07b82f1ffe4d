//! Peer synchronization of the orbit model
//!
//! Controllers share what they have learned over a message bus. Three tags are
//! understood: a data request, an unsolicited override broadcast after a local
//! discovery, and the unicast reply to a request. Override and reply payloads
//! are wire snapshots (`X:Y:Z|direction|speed`) merged through
//! [`OrbitModel::merge`]. Anything else is dropped with a warning.

use core::fmt;
use core::str::FromStr;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::error::ParseError;
use crate::orbit::{MergeOutcome, OrbitModel, OrbitSnapshot};

/// Address of a controller on the bus
pub type NodeId = u64;

/// Message kinds understood by [`SyncChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Ask peers for their model; carries no payload
    RequestData,
    /// Broadcast of a freshly updated model
    OverrideData,
    /// Unicast answer to a request
    Reply,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::RequestData, Topic::OverrideData, Topic::Reply];

    pub fn tag(self) -> &'static str {
        match self {
            Topic::RequestData => "helio.request",
            Topic::OverrideData => "helio.override",
            Topic::Reply => "helio.reply",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Topic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.tag() == s)
            .ok_or_else(|| ParseError::Topic(s.to_string()))
    }
}

/// A message as delivered by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub source: NodeId,
    pub tag: String,
    pub payload: String,
}

/// Message bus collaborator
pub trait Messenger {
    fn node_id(&self) -> NodeId;
    /// Send to every other node
    fn broadcast(&mut self, tag: &str, payload: String);
    fn unicast(&mut self, destination: NodeId, tag: &str, payload: String);
    /// Take every envelope delivered since the last poll
    fn poll_pending(&mut self) -> Vec<Envelope>;
}

/// Counters for one [`SyncChannel::drain`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub accepted: usize,
    pub rejected: usize,
    pub replied: usize,
    pub dropped: usize,
}

impl SyncReport {
    /// True when at least one remote snapshot was merged
    pub fn changed(&self) -> bool {
        self.accepted > 0
    }
}

/// Request, reply and merge policy on top of a [`Messenger`]
#[derive(Debug, Clone, PartialEq)]
pub struct SyncChannel {
    request_interval: u32,
    countdown: u32,
}

impl SyncChannel {
    /// Channel that re-requests data every `request_interval` ticks while the model is incomplete
    pub fn new(request_interval: u32) -> Self {
        Self {
            request_interval: request_interval.max(1),
            countdown: 0,
        }
    }

    /// Process every pending message
    ///
    /// Requests get a reply only when the local plane normal is mapped; a model
    /// without a normal has nothing worth sharing.
    pub fn drain<B: Messenger + ?Sized>(&mut self, bus: &mut B, model: &mut OrbitModel) -> SyncReport {
        let mut report = SyncReport::default();
        let own = bus.node_id();

        for envelope in bus.poll_pending() {
            if envelope.source == own {
                continue;
            }
            let topic = match envelope.tag.parse::<Topic>() {
                Ok(topic) => topic,
                Err(err) => {
                    warn!("dropping message from node {}: {err}", envelope.source);
                    report.dropped += 1;
                    continue;
                }
            };

            match topic {
                Topic::RequestData => {
                    if model.plane_normal().is_some() {
                        debug!("replying to data request from node {}", envelope.source);
                        bus.unicast(envelope.source, Topic::Reply.tag(), model.snapshot().to_string());
                        report.replied += 1;
                    }
                }
                Topic::OverrideData | Topic::Reply => {
                    let snapshot = match envelope.payload.parse::<OrbitSnapshot>() {
                        Ok(snapshot) => snapshot,
                        Err(err) => {
                            warn!("dropping {topic} from node {}: {err}", envelope.source);
                            report.dropped += 1;
                            continue;
                        }
                    };
                    match model.merge(&snapshot) {
                        MergeOutcome::Accepted => {
                            info!("merged {topic} from node {}: {snapshot}", envelope.source);
                            report.accepted += 1;
                        }
                        MergeOutcome::Rejected => report.rejected += 1,
                    }
                }
            }
        }
        report
    }

    /// Broadcast the local model after a discovery
    pub fn announce<B: Messenger + ?Sized>(&self, bus: &mut B, model: &OrbitModel) {
        debug!("announcing {}", model.snapshot());
        bus.broadcast(Topic::OverrideData.tag(), model.snapshot().to_string());
    }

    /// Periodic data request while the model is incomplete
    ///
    /// Returns true when a request went out this tick.
    pub fn request_if_due<B: Messenger + ?Sized>(&mut self, bus: &mut B, model: &OrbitModel) -> bool {
        if model.is_fully_mapped() {
            self.countdown = 0;
            return false;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return false;
        }
        bus.broadcast(Topic::RequestData.tag(), String::new());
        self.countdown = self.request_interval - 1;
        true
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new(100)
    }
}

type Queues = BTreeMap<NodeId, VecDeque<Envelope>>;

/// In-process bus connecting any number of [`Endpoint`]s
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    queues: Rc<RefCell<Queues>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node; an existing queue for `id` is reused
    pub fn endpoint(&self, id: NodeId) -> Endpoint {
        self.queues.borrow_mut().entry(id).or_default();
        Endpoint {
            id,
            queues: Rc::clone(&self.queues),
        }
    }

    /// Messages waiting for `id`
    pub fn pending(&self, id: NodeId) -> usize {
        self.queues.borrow().get(&id).map_or(0, VecDeque::len)
    }

    /// Deliver a raw envelope, bypassing any endpoint
    pub fn inject(&self, destination: NodeId, envelope: Envelope) {
        self.queues
            .borrow_mut()
            .entry(destination)
            .or_default()
            .push_back(envelope);
    }
}

/// One node's view of a [`LocalNetwork`]
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: NodeId,
    queues: Rc<RefCell<Queues>>,
}

impl Messenger for Endpoint {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn broadcast(&mut self, tag: &str, payload: String) {
        let mut queues = self.queues.borrow_mut();
        for (id, queue) in queues.iter_mut() {
            if *id != self.id {
                queue.push_back(Envelope {
                    source: self.id,
                    tag: tag.to_string(),
                    payload: payload.clone(),
                });
            }
        }
    }

    fn unicast(&mut self, destination: NodeId, tag: &str, payload: String) {
        let mut queues = self.queues.borrow_mut();
        match queues.get_mut(&destination) {
            Some(queue) => queue.push_back(Envelope {
                source: self.id,
                tag: tag.to_string(),
                payload,
            }),
            None => warn!("no node {destination} on the network"),
        }
    }

    fn poll_pending(&mut self) -> Vec<Envelope> {
        self.queues
            .borrow_mut()
            .get_mut(&self.id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}
