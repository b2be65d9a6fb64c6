use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A status transition sent to the vendor. The status is forwarded as-is; the vendor decides what
/// is acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackUpdate {
    pub status: String,
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Any other fields the caller sent ride along untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedbackUpdate {
    pub fn new(status: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            feedback: Some(feedback.into()),
            score: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn score_is_omitted_when_absent() {
        let update = FeedbackUpdate::new("approved", "Good work");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "status": "approved", "feedback": "Good work" })
        );
    }

    #[test]
    fn unknown_fields_pass_through() {
        let update: FeedbackUpdate = serde_json::from_value(json!({
            "status": "rejected",
            "feedback": null,
            "score": 40,
            "notify_user": true,
        }))
        .unwrap();

        assert_eq!(update.score, Some(40.0));
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "status": "rejected", "feedback": null, "score": 40.0, "notify_user": true })
        );
    }
}
