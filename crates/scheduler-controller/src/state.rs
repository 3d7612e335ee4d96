// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-pipeline lifecycle state machine.
//!
//! Modeled on the same "enum + `valid_transitions`" shape used for run
//! lifecycles elsewhere in this stack, adapted to the pipeline controller's
//! five states and the two events (config change, knowledge change) that
//! drive them.

use serde::{Deserialize, Serialize};

/// A pipeline's reconciliation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No config has been seen for this pipeline name, or it was deleted.
    None,
    /// A build is in progress (construction is synchronous in this
    /// implementation, so this state is transient but still observable by
    /// a concurrent status read).
    Initializing,
    /// Built successfully; every filter and weigher initialized.
    Ready,
    /// Built, serving requests, but one or more non-critical weighers (or
    /// detectors) were dropped because their `Init` failed.
    ReadyButSomeStepsUnready,
    /// A critical filter's `Init` failed; the pipeline is not serving.
    Failed,
}

impl PipelineState {
    /// Returns the states reachable directly from `self`.
    #[must_use]
    pub fn valid_transitions(&self) -> &'static [PipelineState] {
        match self {
            Self::None => &[Self::Initializing],
            Self::Initializing => &[Self::Ready, Self::ReadyButSomeStepsUnready, Self::Failed],
            Self::Ready | Self::ReadyButSomeStepsUnready | Self::Failed => {
                &[Self::Initializing, Self::None]
            }
        }
    }

    /// `true` if transitioning from `self` to `next` is valid.
    #[must_use]
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// `true` if the pipeline is currently able to serve requests.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Ready | Self::ReadyButSomeStepsUnready)
    }
}
