use std::collections::BTreeMap;

use crate::config::CompanyConfig;

use super::domain::{Candidate, InterviewDetails};

/// Values available for `{placeholder}` substitution at send time.
///
/// The vocabulary is fixed; a token is substituted only when its value is
/// present here. Anything else, known token or not, is left verbatim in
/// the rendered text so an operator can spot the gap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    pub candidate_name: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub your_name: Option<String>,
    pub salary: Option<String>,
    pub salary_amount: Option<String>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub start_date: Option<String>,
    pub expires_at: Option<String>,
    pub benefits: Option<String>,
    pub interview_date: Option<String>,
    pub interview_time: Option<String>,
    pub interview_duration: Option<String>,
    pub interview_type: Option<String>,
    pub meeting_link: Option<String>,
    pub address: Option<String>,
    pub old_interview_date: Option<String>,
    pub old_interview_time: Option<String>,
    pub previous_interview_time: Option<String>,
    pub new_interview_time: Option<String>,
    pub offer_response_link: Option<String>,
    pub notes: Option<String>,
}

impl MessageContext {
    /// Baseline context for any candidate-facing message.
    pub fn for_candidate(candidate: &Candidate, company: &CompanyConfig) -> Self {
        Self {
            candidate_name: Some(candidate.full_name.clone()),
            job_title: Some(candidate.position_title.clone()),
            company_name: Some(company.company_name.clone()),
            your_name: Some(company.sender_name.clone()),
            ..Self::default()
        }
    }

    pub fn with_interview(mut self, interview: &InterviewDetails) -> Self {
        self.interview_date = interview.date.map(|date| date.format("%Y-%m-%d").to_string());
        self.interview_time = interview.time.clone();
        self.interview_duration = interview.duration.clone();
        self.interview_type = interview.kind.clone();
        self.meeting_link = interview.meeting_link.clone();
        self.address = interview.address.clone();
        self
    }

    fn vocabulary(&self) -> BTreeMap<&'static str, &str> {
        let pairs = [
            ("candidate_name", &self.candidate_name),
            ("job_title", &self.job_title),
            ("company_name", &self.company_name),
            ("your_name", &self.your_name),
            ("salary", &self.salary),
            ("salary_amount", &self.salary_amount),
            ("salary_currency", &self.salary_currency),
            ("salary_period", &self.salary_period),
            ("start_date", &self.start_date),
            ("expires_at", &self.expires_at),
            ("benefits", &self.benefits),
            ("benefits_list", &self.benefits),
            ("interview_date", &self.interview_date),
            ("interview_time", &self.interview_time),
            ("interview_duration", &self.interview_duration),
            ("interview_type", &self.interview_type),
            ("meeting_link", &self.meeting_link),
            ("address", &self.address),
            ("old_interview_date", &self.old_interview_date),
            ("old_interview_time", &self.old_interview_time),
            ("previous_interview_time", &self.previous_interview_time),
            ("new_interview_time", &self.new_interview_time),
            ("offer_response_link", &self.offer_response_link),
            ("notes", &self.notes),
        ];

        let mut entries = BTreeMap::new();
        for (key, value) in pairs {
            if let Some(value) = value {
                entries.insert(key, value.as_str());
            }
        }
        entries
    }
}

/// Substitute every resolvable `{placeholder}` occurrence in `text`.
pub fn render(text: &str, context: &MessageContext) -> String {
    let mut rendered = text.to_string();
    for (key, value) in context.vocabulary() {
        let token = format!("{{{key}}}");
        if rendered.contains(&token) {
            rendered = rendered.replace(&token, value);
        }
    }
    rendered
}
