use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkEntry {
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub year: Option<String>,
}

/// Candidate résumé data matched to a session. Immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeContext {
    pub candidate_name: String,
    pub candidate_email: String,
    pub experience_years: f32,
    pub skills: Vec<String>,
    pub projects: Vec<ProjectEntry>,
    pub work_history: Vec<WorkEntry>,
    pub education: Vec<EducationEntry>,
    pub certifications: Vec<String>,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub candidate_name: String,
    pub candidate_email: String,
    pub experience_years: Option<f32>,
    pub skills: Option<Vec<String>>,
    pub projects: Option<Json<Vec<ProjectEntry>>>,
    pub work_history: Option<Json<Vec<WorkEntry>>>,
    pub education: Option<Json<Vec<EducationEntry>>>,
    pub certifications: Option<Vec<String>>,
    pub achievements: Option<Vec<String>>,
}

impl From<ResumeRow> for ResumeContext {
    fn from(row: ResumeRow) -> Self {
        Self {
            candidate_name: row.candidate_name,
            candidate_email: row.candidate_email,
            experience_years: row.experience_years.unwrap_or(0.0).max(0.0),
            skills: row.skills.unwrap_or_default(),
            projects: row.projects.map(|p| p.0).unwrap_or_default(),
            work_history: row.work_history.map(|w| w.0).unwrap_or_default(),
            education: row.education.map(|e| e.0).unwrap_or_default(),
            certifications: row.certifications.unwrap_or_default(),
            achievements: row.achievements.unwrap_or_default(),
        }
    }
}
