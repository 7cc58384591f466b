use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Score on the 1–10 scale, or 0 when the dimension was not scored.
pub type Rating = u8;

/// Clamps an arbitrary model-supplied number onto the rating scale.
/// Anything below 1 (including negatives and non-numbers) is "unscored".
pub fn clamp_rating(raw: f64) -> Rating {
    if !raw.is_finite() || raw < 1.0 {
        0
    } else {
        raw.round().min(10.0) as Rating
    }
}

/// Accepts integers, floats or numeric strings; everything else becomes 0.
fn lenient_rating<'de, D>(deserializer: D) -> Result<Rating, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(clamp_rating(raw))
}

/// Per-answer rating vector produced by the answer analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingVector {
    #[serde(default, deserialize_with = "lenient_rating")]
    pub technical: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub communication: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub problem_solving: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub experience_relevance: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub overall: Rating,
}

/// The structured part of an answer analysis, as the model is asked to return it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAssessment {
    #[serde(default)]
    pub ratings: RatingVector,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub insights: Vec<String>,
}

/// A single transcript entry handed to the analysis store.
/// `assessment` is `None` when scoring failed and only the raw Q/A survives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub interview_id: String,
    pub feedback_id: Uuid,
    pub sequence_number: u32,
    pub question_type: String,
    pub question: String,
    pub answer: String,
    pub assessment: Option<AnswerAssessment>,
}

/// Whole-interview ratings. Not an average of the per-answer vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallRatings {
    #[serde(default, deserialize_with = "lenient_rating")]
    pub technical: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub communication: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub problem_solving: Rating,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub experience: Rating,
}

impl OverallRatings {
    pub const MIDPOINT: Self = Self {
        technical: 5,
        communication: 5,
        problem_solving: 5,
        experience: 5,
    };
}

/// Result of the end-of-interview synthesis. Always well-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewFeedback {
    pub ratings: OverallRatings,
    pub summary: String,
    pub recommended: bool,
    pub recommendation_message: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub interview_id: String,
    pub candidate_email: String,
    pub candidate_name: Option<String>,
    pub technical_rating: Option<i16>,
    pub communication_rating: Option<i16>,
    pub problem_solving_rating: Option<i16>,
    pub experience_rating: Option<i16>,
    pub summary: Option<String>,
    pub recommended: Option<bool>,
    pub recommendation_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_rating_bounds() {
        assert_eq!(clamp_rating(0.0), 0);
        assert_eq!(clamp_rating(-3.0), 0);
        assert_eq!(clamp_rating(1.0), 1);
        assert_eq!(clamp_rating(7.4), 7);
        assert_eq!(clamp_rating(42.0), 10);
        assert_eq!(clamp_rating(f64::NAN), 0);
    }

    #[test]
    fn test_rating_vector_accepts_loose_numbers() {
        let json = r#"{
            "technical": "8",
            "communication": 7.6,
            "problemSolving": null,
            "experienceRelevance": 11,
            "overall": 6
        }"#;
        let ratings: RatingVector = serde_json::from_str(json).unwrap();
        assert_eq!(ratings.technical, 8);
        assert_eq!(ratings.communication, 8);
        assert_eq!(ratings.problem_solving, 0);
        assert_eq!(ratings.experience_relevance, 10);
        assert_eq!(ratings.overall, 6);
    }

    #[test]
    fn test_missing_ratings_default_to_unscored() {
        let assessment: AnswerAssessment =
            serde_json::from_str(r#"{"feedback": "Solid answer"}"#).unwrap();
        assert_eq!(assessment.ratings, RatingVector::default());
        assert_eq!(assessment.feedback, "Solid answer");
        assert!(assessment.insights.is_empty());
    }
}
