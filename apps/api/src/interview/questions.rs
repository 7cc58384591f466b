//! Picks the next planned question for a session.
//!
//! Policy, first hit wins:
//! 1. `custom_questions`: first admin-authored question not yet asked.
//! 2. `resume_based` / `technical_deep_dive` with a résumé: first unasked
//!    question from the deterministic résumé-derived list.
//!
//! Selection records the question in the asked-set immediately, so calling
//! `select_next` twice never returns the same text.

use serde::Serialize;

use crate::context::loader::LoadedContext;
use crate::interview::phase::Phase;
use crate::models::resume::ResumeContext;
use crate::session::state::Session;

/// Skills are grouped into clusters of this size for cluster questions.
const SKILL_CLUSTER_SIZE: usize = 3;
/// Experience above which leadership questions are added.
const LEADERSHIP_MIN_YEARS: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedQuestion {
    pub text: String,
    pub question_type: String,
}

/// Chooses and records the next question, or `None` when no tier applies.
pub fn select_next(session: &mut Session, context: &LoadedContext) -> Option<SelectedQuestion> {
    let phase = session.phase();
    let selected = match phase {
        Phase::CustomQuestions => context.interview.as_ref().and_then(|interview| {
            first_unasked(session, interview.questions.iter().cloned(), "custom")
        }),
        Phase::ResumeBased | Phase::TechnicalDeepDive => {
            context.resume.as_ref().and_then(|resume| {
                let question_type = match phase {
                    Phase::ResumeBased => "resume",
                    _ => "technical",
                };
                first_unasked(session, resume_questions(resume).into_iter(), question_type)
            })
        }
        _ => None,
    }?;

    session.mark_asked(&selected.text);
    Some(selected)
}

fn first_unasked(
    session: &Session,
    candidates: impl Iterator<Item = String>,
    question_type: &str,
) -> Option<SelectedQuestion> {
    candidates
        .filter(|q| !q.trim().is_empty())
        .find(|q| !session.was_asked(q))
        .map(|text| SelectedQuestion {
            text: text.trim().to_string(),
            question_type: question_type.to_string(),
        })
}

/// Deterministic question list derived from résumé data, in asking order:
/// projects, skill clusters, past roles, then leadership.
pub fn resume_questions(resume: &ResumeContext) -> Vec<String> {
    let mut questions = Vec::new();

    for project in resume.projects.iter().filter(|p| !p.name.trim().is_empty()) {
        let name = project.name.trim();
        let tech = join_natural(&project.technologies);

        questions.push(format!(
            "In your {name} project, what was your specific role and what was the biggest challenge you faced?"
        ));
        if tech.is_empty() {
            questions.push(format!(
                "How did you approach the architecture of {name}, and which technology choices mattered most?"
            ));
        } else {
            questions.push(format!(
                "Why did you choose {tech} for {name}, and how did those choices shape its architecture?"
            ));
        }
        questions.push(format!(
            "What was the hardest technical problem you solved while building {name}, and how did you solve it?"
        ));
        questions.push(format!(
            "How did you measure the impact or success of {name}?"
        ));
    }

    for cluster in skill_clusters(&resume.skills) {
        let skills = join_natural(&cluster);
        questions.push(format!(
            "Describe a real problem you solved using {skills}."
        ));
        if cluster.len() > 1 {
            questions.push(format!(
                "Among {skills}, which are you strongest in, and what makes you say so?"
            ));
        } else {
            questions.push(format!(
                "How would you rate your depth in {skills}, and where are you still growing?"
            ));
        }
    }

    for job in resume
        .work_history
        .iter()
        .filter(|w| !w.company.trim().is_empty() && !w.role.trim().is_empty())
    {
        let (company, role) = (job.company.trim(), job.role.trim());
        questions.push(format!(
            "As {role} at {company}, what was your most significant contribution?"
        ));
        questions.push(format!(
            "Tell me about a difficult decision you had to make as {role} at {company}. How did you handle it?"
        ));
    }

    if resume.experience_years > LEADERSHIP_MIN_YEARS {
        questions.push(
            "With your years of experience, how have you mentored or grown less experienced engineers?"
                .to_string(),
        );
        questions.push(
            "Tell me about a time you led a team or initiative through a difficult period.".to_string(),
        );
    }

    questions
}

/// Case-insensitively de-duplicated skills, chunked into fixed-size clusters.
fn skill_clusters(skills: &[String]) -> Vec<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<String> = skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .map(String::from)
        .collect();

    unique
        .chunks(SKILL_CLUSTER_SIZE)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// "a", "a and b", "a, b and c".
fn join_natural(items: &[String]) -> String {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    match items.as_slice() {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
