use super::domain::{Candidate, EmailWorkflow};

/// Return every enabled workflow applicable to `candidate`, ordered by
/// creation time. Pure function; the caller decides what to do with the
/// matches (workflow creation enforces at most one enabled workflow per
/// stage, so in practice the list holds zero or one entries).
pub fn find_matching_workflows<'a>(
    candidate: &Candidate,
    workflows: &'a [EmailWorkflow],
) -> Vec<&'a EmailWorkflow> {
    let mut matches: Vec<&EmailWorkflow> = workflows
        .iter()
        .filter(|workflow| workflow_matches(candidate, workflow))
        .collect();
    matches.sort_by_key(|workflow| workflow.created_at);
    matches
}

fn workflow_matches(candidate: &Candidate, workflow: &EmailWorkflow) -> bool {
    if !workflow.enabled || workflow.trigger_stage != candidate.stage {
        return false;
    }

    if let Some(minimum) = workflow.min_match_score {
        // A candidate with no score on file fails any configured minimum.
        match candidate.match_score {
            Some(score) if score >= minimum => {}
            _ => return false,
        }
    }

    if !workflow.source_filter.is_empty() {
        match &candidate.source {
            Some(source) if workflow.source_filter.iter().any(|allowed| allowed == source) => {}
            _ => return false,
        }
    }

    true
}
