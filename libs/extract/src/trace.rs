//! Structured records of what each stage did.

use geometry::prelude::*;
use serde::{Deserialize, Serialize};
use tech::LayerId;

/// A pipeline stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Collect,
    Vias,
    Transistors,
    Wires,
    Bridges,
    PureLayer,
    Exports,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Collect => "collect",
            Stage::Vias => "vias",
            Stage::Transistors => "transistors",
            Stage::Wires => "wires",
            Stage::Bridges => "bridges",
            Stage::PureLayer => "pure-layer",
            Stage::Exports => "exports",
            Stage::Cleanup => "cleanup",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceAction {
    /// The shape was explained by a new instance.
    Realized,
    /// A candidate was considered and rejected.
    Discarded,
    /// The shape was left unexplained.
    Leftover,
}

/// One traced shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub stage: Stage,
    pub action: TraceAction,
    pub layer: Option<LayerId>,
    pub shape: Polygon,
    pub note: String,
}

/// A consumer of trace events.
pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

/// Discards every event.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Records every event in order.
#[derive(Debug, Default, Clone)]
pub struct VecTrace {
    events: Vec<TraceEvent>,
}

impl VecTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// The events recorded by one stage.
    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.stage == stage)
    }
}

impl TraceSink for VecTrace {
    fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}
