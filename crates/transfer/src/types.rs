use serde::Serialize;

/// Lifecycle state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "aborted")]
    Aborted,
    #[serde(rename = "failed")]
    Failed,
}

impl TransferState {
    /// Returns `true` for states that are never left once entered.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

/// Snapshot of a transfer's progress.
///
/// `current_offset` counts chunks, not bytes: it is the ordinal of the next
/// chunk to process and never exceeds `max_position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub current_offset: u32,
    pub max_position: u32,
    pub bytes_transferred: u64,
    pub state: TransferState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferStatus {
    /// Initial status of a transfer resuming at `resume_position`.
    pub fn new(resume_position: u32, max_position: u32) -> Self {
        Self {
            current_offset: resume_position,
            max_position,
            bytes_transferred: 0,
            state: TransferState::Pending,
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == TransferState::Completed
    }

    pub fn is_aborted(&self) -> bool {
        self.state == TransferState::Aborted
    }

    pub fn is_failed(&self) -> bool {
        self.state == TransferState::Failed
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Progress as a percentage of chunks (0-100).
    pub fn percentage(&self) -> f64 {
        if self.max_position == 0 {
            return if self.is_completed() { 100.0 } else { 0.0 };
        }
        f64::from(self.current_offset) / f64::from(self.max_position) * 100.0
    }
}
