use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Setup,
    MainProof,
    EncodeForRecursion,
    RecursiveProof,
    FinalVerification,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Setup,
        Stage::MainProof,
        Stage::EncodeForRecursion,
        Stage::RecursiveProof,
        Stage::FinalVerification,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Setup => "pipeline setup",
            Stage::MainProof => "proof generation",
            Stage::EncodeForRecursion => "proof generation (recursive encoding)",
            Stage::RecursiveProof => "recursive proof generation",
            Stage::FinalVerification => "recursive proof verification",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Succeeded,
    /// Finished, but the produced proof did not verify.
    Rejected,
    Failed(String),
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageEvent {
    pub stage: Stage,
    pub status: StageStatus,
}

/// Sending half of the progress channel. A reporter without a receiver, or
/// whose receiver was dropped, discards events.
#[derive(Clone, Debug, Default)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<StageEvent>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, UnboundedReceiver<StageEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn report(&self, stage: Stage, status: StageStatus) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(StageEvent { stage, status });
        }
    }

    pub fn pending(&self, stage: Stage) {
        self.report(stage, StageStatus::Pending);
    }

    pub fn succeeded(&self, stage: Stage) {
        self.report(stage, StageStatus::Succeeded);
    }

    pub fn rejected(&self, stage: Stage) {
        self.report(stage, StageStatus::Rejected);
    }

    pub fn failed(&self, stage: Stage, reason: impl fmt::Display) {
        self.report(stage, StageStatus::Failed(reason.to_string()));
    }
}
