use super::domain::{Candidate, CandidateStage, EmailWorkflow};

/// Reasons a stage transition request is refused. Messages are shown to
/// the requesting user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionRejection {
    #[error("candidate must upload a CV to leave the new stage")]
    CvRequired,
    #[error("candidates cannot be moved back into the new stage")]
    IntakeIsCreationOnly,
    #[error("no enabled workflow configured for stage {}", .0.label())]
    NoWorkflowForStage(CandidateStage),
    #[error("no active offer linked to candidate")]
    NoActiveOffer,
}

/// Decide whether `candidate` may move to `to_stage`.
///
/// Rules are evaluated in order and the first failure wins:
/// 1. nothing leaves `new` through this path (CV upload is the only exit);
/// 2. nothing re-enters `new`;
/// 3. `interview` is exempt from the workflow precondition (interviews are
///    scheduled manually);
/// 4. every other target stage must have an enabled workflow so the
///    candidate is never left mid-pipeline without an outbound message;
/// 5. `offer` additionally requires an active offer linked to the
///    candidate.
///
/// `enabled_workflows` must already be scoped to the owning user; only the
/// owner's workflows participate in the decision. Pure function; the
/// caller applies the stage mutation after an `Ok`.
pub fn authorize_transition(
    candidate: &Candidate,
    to_stage: CandidateStage,
    enabled_workflows: &[EmailWorkflow],
    has_active_offer: bool,
) -> Result<(), TransitionRejection> {
    if candidate.stage == CandidateStage::New {
        return Err(TransitionRejection::CvRequired);
    }

    if to_stage == CandidateStage::New {
        return Err(TransitionRejection::IntakeIsCreationOnly);
    }

    if to_stage != CandidateStage::Interview {
        let configured = enabled_workflows
            .iter()
            .any(|workflow| workflow.enabled && workflow.trigger_stage == to_stage);
        if !configured {
            return Err(TransitionRejection::NoWorkflowForStage(to_stage));
        }
    }

    if to_stage == CandidateStage::Offer && !has_active_offer {
        return Err(TransitionRejection::NoActiveOffer);
    }

    Ok(())
}
