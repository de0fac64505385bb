//! Job state machine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::media::MediaKind;

/// State of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Job exists, nothing has happened yet.
    Created,
    /// Attachment bytes are being fetched into the source file.
    Downloading,
    /// The converter is running.
    Converting,
    /// The reply is being delivered.
    Replying,
    /// Converted artifact or text delivered.
    Succeeded,
    /// The job ended with an apology, or the reply could not be delivered.
    Failed,
}

impl JobState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: JobState) -> bool {
        use JobState::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, target),
            (Created, Downloading) |
            // Download problems and timeouts skip straight to the apology
            (Created, Replying) | (Downloading, Replying) |
            (Downloading, Converting) |
            (Converting, Replying) |
            (Replying, Succeeded)
        ) || target == Failed
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Downloading => "downloading",
            Self::Converting => "converting",
            Self::Replying => "replying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A state transition event.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: JobState,
    pub to: JobState,
    pub timestamp: DateTime<Utc>,
}

/// One conversion job: a single media event from receipt to reply.
#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    kind: MediaKind,
    state: JobState,
    /// Failure reported to the user, if any.
    failure: Option<ErrorKind>,
    created_at: DateTime<Utc>,
    transitions: Vec<StateTransition>,
}

impl Job {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state: JobState::Created,
            failure: None,
            created_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn failure(&self) -> Option<ErrorKind> {
        self.failure
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Sequence of states visited, starting with `Created`.
    pub fn path(&self) -> Vec<JobState> {
        std::iter::once(JobState::Created)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    /// Transition to a new state.
    pub fn transition_to(&mut self, new_state: JobState) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.state, new_state
            ));
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
        });
        self.state = new_state;
        Ok(())
    }

    /// Transition, logging instead of failing on an illegal move.
    pub fn advance(&mut self, new_state: JobState) {
        if let Err(e) = self.transition_to(new_state) {
            tracing::warn!(job_id = %self.id, "{}", e);
        }
    }

    /// Remember the failure the user is being told about.
    pub fn record_failure(&mut self, kind: ErrorKind) {
        self.failure.get_or_insert(kind);
    }

    /// Move to the terminal state implied by what happened so far.
    pub fn finish(&mut self) {
        let terminal = if self.failure.is_some() {
            JobState::Failed
        } else {
            JobState::Succeeded
        };
        self.advance(terminal);
    }
}
