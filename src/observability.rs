//! # Composition Observability Module
//!
//! Structured events for composition and apply runs.
//!
//! ## Event Flow
//!
//! ```text
//! gamestack → JSON stdout (GAMESTACK_EVENT: prefix) → log collector
//! ```
//!
//! Every event carries the run id shared by all compositions of one
//! invocation, so a collector can group the servers of a single deployment.
//! Set `GAMESTACK_EVENTS=off` to silence the event stream.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::composition::{Step, StepResult, StepStatus};

/// Event prefix for collectors to identify structured events
const EVENT_PREFIX: &str = "GAMESTACK_EVENT:";

/// Composition event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type")]
pub enum CompositionEvent {
    CompositionStarted(CompositionStartedEvent),
    StepCompleted(StepCompletedEvent),
    CompositionCompleted(CompositionCompletedEvent),
    CompositionFailed(CompositionFailedEvent),
    /// The provisioning platform accepted a resource graph
    ApplyCompleted(ApplyCompletedEvent),
}

/// Common fields for all events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Timestamp in RFC3339 format
    pub timestamp: String,
    pub run_id: Uuid,
    pub stack: String,
    /// Server being composed, absent for stack-level events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub account: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl EventMetadata {
    pub fn new(
        run_id: Uuid,
        stack: impl Into<String>,
        account: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            run_id,
            stack: stack.into(),
            server: None,
            account: account.into(),
            region: region.into(),
            hostname: std::env::var("HOSTNAME").ok(),
        }
    }

    /// Same run, scoped to one server
    pub fn for_server(&self, server: impl Into<String>) -> Self {
        Self {
            server: Some(server.into()),
            ..self.clone()
        }
    }

    /// Copy with a fresh timestamp
    fn stamped(&self) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositionStartedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepCompletedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub step: Step,
    pub status: StepStatus,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositionCompletedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub duration_secs: f64,
    pub step_durations: Vec<StepDuration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositionFailedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<Step>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyCompletedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub resources: usize,
    pub status: String,
    pub digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepDuration {
    pub step: Step,
    pub duration_secs: f64,
    pub status: StepStatus,
}

impl From<&StepResult> for StepDuration {
    fn from(result: &StepResult) -> Self {
        Self {
            step: result.step,
            duration_secs: result.duration.as_secs_f64(),
            status: result.status,
        }
    }
}

fn events_enabled() -> bool {
    !matches!(
        std::env::var("GAMESTACK_EVENTS").as_deref(),
        Ok("off") | Ok("0") | Ok("false")
    )
}

/// Emits a structured event as JSON to stdout
///
/// Events are prefixed with `GAMESTACK_EVENT:` for collectors to parse.
pub fn emit_event(event: CompositionEvent) {
    if !events_enabled() {
        return;
    }
    match serde_json::to_string(&event) {
        Ok(json) => {
            println!("{}{}", EVENT_PREFIX, json);
        }
        Err(e) => {
            tracing::error!("Failed to serialize event: {}", e);
        }
    }
}

/// Helper to track step timing
pub struct StepTimer {
    step: Step,
    start: Instant,
}

impl StepTimer {
    pub fn start(step: Step) -> Self {
        Self {
            step,
            start: Instant::now(),
        }
    }

    pub fn finish(self) -> StepResult {
        StepResult::success(self.step, self.start.elapsed())
    }

    pub fn finish_skipped(self, reason: impl Into<String>) -> StepResult {
        StepResult::skipped(self.step, self.start.elapsed(), reason)
    }

    pub fn finish_failed(self, error: impl Into<String>) -> StepResult {
        StepResult::failure(self.step, self.start.elapsed(), error)
    }
}

/// Composition run tracker
pub struct CompositionTracker {
    metadata: EventMetadata,
    start: Instant,
    steps: Vec<StepDuration>,
    emitting: bool,
}

impl CompositionTracker {
    pub fn new(metadata: EventMetadata) -> Self {
        Self {
            metadata,
            start: Instant::now(),
            steps: Vec::new(),
            emitting: true,
        }
    }

    /// Keep recording step durations without writing events
    pub fn silenced(mut self) -> Self {
        self.emitting = false;
        self
    }

    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    fn emit(&self, event: CompositionEvent) {
        if self.emitting {
            emit_event(event);
        }
    }

    /// Record a finished step and emit its event
    pub fn record(&mut self, result: &StepResult) {
        self.steps.push(StepDuration::from(result));
        self.emit(CompositionEvent::StepCompleted(StepCompletedEvent {
            metadata: self.metadata.stamped(),
            step: result.step,
            status: result.status,
            duration_secs: result.duration.as_secs_f64(),
            message: result.message.clone(),
        }));
    }

    pub fn emit_started(&self, steps: &[Step]) {
        self.emit(CompositionEvent::CompositionStarted(CompositionStartedEvent {
            metadata: self.metadata.stamped(),
            steps: steps.iter().map(|s| s.name().to_string()).collect(),
        }));
    }

    pub fn emit_completed(self) {
        let event = CompositionEvent::CompositionCompleted(CompositionCompletedEvent {
            metadata: self.metadata.stamped(),
            duration_secs: self.start.elapsed().as_secs_f64(),
            step_durations: self.steps.clone(),
        });
        self.emit(event);
    }

    pub fn emit_failed(self, failed_step: Option<Step>, error: String) {
        self.emit(CompositionEvent::CompositionFailed(CompositionFailedEvent {
            metadata: self.metadata.stamped(),
            duration_secs: self.start.elapsed().as_secs_f64(),
            failed_step,
            error,
        }));
    }

    pub fn step_durations(&self) -> &[StepDuration] {
        &self.steps
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
