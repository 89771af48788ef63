use serde::Serialize;

use super::domain::{CandidateStage, EmailTemplate, TemplateId};

/// Templates usable for a given trigger stage, plus a flag warning the
/// caller that a previously selected template is no longer valid there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSelection {
    pub candidates: Vec<EmailTemplate>,
    pub invalid_selection: bool,
}

/// Filter `templates` down to the ones semantically valid for `stage`.
///
/// Offer-driven template types are never returned for any stage; they are
/// fired by the offer negotiation machine, not by stage workflows. A
/// `selected` template that would otherwise be excluded is still included
/// in the result so the caller can display it, but the selection is
/// flagged as invalid. Pure function of its inputs.
pub fn valid_templates_for_stage(
    stage: CandidateStage,
    templates: &[EmailTemplate],
    selected: Option<&TemplateId>,
) -> TemplateSelection {
    let allowed = stage.allowed_template_types();

    let mut candidates: Vec<EmailTemplate> = templates
        .iter()
        .filter(|template| {
            !template.template_type.offer_driven() && allowed.contains(&template.template_type)
        })
        .cloned()
        .collect();

    let mut invalid_selection = false;
    if let Some(selected_id) = selected {
        let already_valid = candidates
            .iter()
            .any(|template| &template.id == selected_id);
        if !already_valid {
            invalid_selection = true;
            if let Some(current) = templates.iter().find(|template| &template.id == selected_id)
            {
                candidates.push(current.clone());
            }
        }
    }

    TemplateSelection {
        candidates,
        invalid_selection,
    }
}
