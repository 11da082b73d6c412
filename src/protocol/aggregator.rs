//! Result Aggregation.
//!
//! Collects the final-result notifications of one round. The aggregator is
//! owned by the round's context and fed from the single receiving end of the
//! session channel, so counters and the retained result are mutated under one
//! owner.

use alloc::collections::BTreeSet;

use super::events::FinalResultEvent;
use super::messaging::{FinalResult, PeerId, SessionMessage};
use super::ProtocolError;

/// Signalled exactly once per round, when the last session has reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundCompletion {
    pub time_slot: u32,
    /// First non-empty result any session delivered.
    pub result: Option<FinalResult>,
    /// Session whose report completed the round.
    pub last_sender: PeerId,
}

impl RoundCompletion {
    /// The retained result, or an empty placeholder.
    pub fn payload(&self) -> FinalResult {
        self.result.clone().unwrap_or_default()
    }

    pub fn to_event(&self) -> FinalResultEvent {
        FinalResultEvent {
            time_slot: self.time_slot,
            sender: self.last_sender.clone(),
            payload: self.payload(),
            has_result: self.result.is_some(),
            verification_successful: true,
        }
    }
}

#[derive(Debug)]
pub struct ResultAggregator {
    time_slot: u32,
    pending: usize,
    result: Option<FinalResult>,
    reported: BTreeSet<PeerId>,
    completed: bool,
}

impl ResultAggregator {
    /// Expects one final result from each of `peers` sessions.
    pub fn new(time_slot: u32, peers: usize) -> Self {
        Self {
            time_slot,
            pending: peers,
            result: None,
            reported: BTreeSet::new(),
            completed: peers == 0,
        }
    }

    pub fn time_slot(&self) -> u32 {
        self.time_slot
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn result(&self) -> Option<&FinalResult> {
        self.result.as_ref()
    }

    /// Handles one session message.
    ///
    /// Returns `Ok(Some(_))` for the message that brings the pending count to
    /// zero and `Ok(None)` for every other accepted message. Violations leave
    /// the counters untouched.
    pub fn on_notification(
        &mut self,
        msg: SessionMessage,
    ) -> Result<Option<RoundCompletion>, ProtocolError> {
        let SessionMessage {
            sender,
            time_slot,
            message,
            ..
        } = msg;

        if self.completed {
            return Err(ProtocolError::RoundAlreadyComplete { sender });
        }
        if time_slot != self.time_slot {
            return Err(ProtocolError::StaleMessage { sender, time_slot });
        }

        let kind = message.kind();
        let payload = match message.into_final_result() {
            Some(payload) => payload,
            None => return Err(ProtocolError::UnexpectedMessage { sender, kind }),
        };

        if self.reported.contains(&sender) {
            return Err(ProtocolError::DuplicateFinalResult { sender });
        }
        self.reported.insert(sender.clone());

        if self.result.is_none() {
            if let Some(result) = payload.filter(|r| !r.is_empty()) {
                log::debug!("Retaining final result from {}", sender);
                self.result = Some(result);
            }
        }

        self.pending -= 1;
        log::debug!(
            "Final result from {} (slot {}), {} still pending",
            sender,
            self.time_slot,
            self.pending
        );

        if self.pending > 0 {
            return Ok(None);
        }

        self.completed = true;
        log::info!("All final results received for time slot {}", self.time_slot);
        Ok(Some(RoundCompletion {
            time_slot: self.time_slot,
            result: self.result.clone(),
            last_sender: sender,
        }))
    }
}
