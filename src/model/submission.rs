use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ParseError;

/// Status values the vendor uses for a submission that is still waiting on a reviewer.
const PENDING_STATUSES: [&str; 3] = ["to_approve", "pending review", "pending_review"];

/// A submission in the canonical shape handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: String,
    pub user: Party,
    pub course: Party,
    /// Vendor vocabulary, verbatim.
    pub status: String,
    pub pending_review: bool,
    pub submitted_at: DateTime<Utc>,
    pub file: Option<FileRef>,
    pub description: Option<String>,
    pub feedback: Option<String>,
    pub score: Option<f64>,
}

/// A user or course reference. The vendor sends either an embedded object or a bare id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub download_url: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionList {
    pub items: Vec<Submission>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Text(String),
    Number(i64),
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        match id {
            RemoteId::Text(s) => s,
            RemoteId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RemoteParty {
    id: Option<RemoteId>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct RemoteSubmission {
    id: RemoteId,
    user: Option<RemoteParty>,
    user_id: Option<RemoteId>,
    course: Option<RemoteParty>,
    course_id: Option<RemoteId>,
    status: String,
    submitted_at: String,
    file: Option<FileRef>,
    description: Option<String>,
    feedback: Option<String>,
    score: Option<f64>,
}

fn party(
    embedded: Option<RemoteParty>,
    bare_id: Option<RemoteId>,
    kind: &'static str,
) -> Result<Party, ParseError> {
    match (embedded, bare_id) {
        (Some(p), bare_id) => Ok(Party {
            id: p.id.or(bare_id).map(String::from),
            name: p.name,
        }),
        (None, Some(id)) => Ok(Party {
            id: Some(id.into()),
            name: None,
        }),
        (None, None) => Err(ParseError::MissingReference(kind)),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| ParseError::Timestamp(raw.to_owned()))
}

pub fn is_pending_review(status: &str) -> bool {
    PENDING_STATUSES
        .iter()
        .any(|pending| pending.eq_ignore_ascii_case(status.trim()))
}

impl TryFrom<RemoteSubmission> for Submission {
    type Error = ParseError;

    fn try_from(remote: RemoteSubmission) -> Result<Self, Self::Error> {
        Ok(Self {
            id: remote.id.into(),
            user: party(remote.user, remote.user_id, "user")?,
            course: party(remote.course, remote.course_id, "course")?,
            pending_review: is_pending_review(&remote.status),
            status: remote.status,
            submitted_at: parse_timestamp(&remote.submitted_at)?,
            file: remote.file,
            description: remote.description,
            feedback: remote.feedback,
            score: remote.score,
        })
    }
}

impl Submission {
    /// Normalizes a single-submission response: either the bare object or one wrapped in `data`.
    pub fn from_remote(value: Value) -> Result<Self, ParseError> {
        let value = match value {
            Value::Object(mut map) if !map.contains_key("id") => match map.remove("data") {
                Some(inner @ Value::Object(_)) => inner,
                Some(_) => return Err(ParseError::SubmissionShape("`data` is not an object")),
                None => return Err(ParseError::SubmissionShape("object has no `id` or `data`")),
            },
            obj @ Value::Object(_) => obj,
            _ => return Err(ParseError::SubmissionShape("expected a JSON object")),
        };

        let remote: RemoteSubmission = serde_json::from_value(value)?;
        remote.try_into()
    }
}

/// The relayed result of an update the vendor accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpdateOutcome {
    /// The vendor echoed the updated submission.
    Updated(Submission),
    /// Any other 2xx body, relayed as-is. An empty body becomes `{"ok": true}`.
    Acknowledged(Value),
}

impl UpdateOutcome {
    /// The write has already happened by the time this runs, so nothing here is an error.
    pub fn from_remote(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::acknowledged();
        }
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Submission::from_remote(value.clone())
                .map(Self::Updated)
                .unwrap_or(Self::Acknowledged(value)),
            Err(_) => Self::acknowledged(),
        }
    }

    fn acknowledged() -> Self {
        Self::Acknowledged(serde_json::json!({ "ok": true }))
    }
}

impl SubmissionList {
    /// Normalizes a list response. Accepts a bare array, `{items}`, `{data: {items}}` or `{data: [..]}`.
    pub fn from_remote(value: Value) -> Result<Self, ParseError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match (map.remove("items"), map.remove("data")) {
                (Some(Value::Array(items)), _) => items,
                (Some(_), _) => return Err(ParseError::ListShape("`items` is not an array")),
                (None, Some(Value::Array(items))) => items,
                (None, Some(Value::Object(mut data))) => match data.remove("items") {
                    Some(Value::Array(items)) => items,
                    _ => return Err(ParseError::ListShape("`data` has no `items` array")),
                },
                (None, _) => return Err(ParseError::ListShape("object has no `items` or `data`")),
            },
            _ => return Err(ParseError::ListShape("expected an array or object")),
        };

        let items = items
            .into_iter()
            .map(|item| {
                let remote: RemoteSubmission = serde_json::from_value(item)?;
                Submission::try_from(remote)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "id": "1",
            "status": "pending review",
            "user": { "name": "A" },
            "course": { "name": "C" },
            "submitted_at": "2024-01-01T00:00:00Z",
        })
    }

    #[test]
    fn list_shapes_normalize_to_the_same_rows() {
        let bare = SubmissionList::from_remote(json!([sample()])).unwrap();
        let items = SubmissionList::from_remote(json!({ "items": [sample()] })).unwrap();
        let nested = SubmissionList::from_remote(json!({ "data": { "items": [sample()] } })).unwrap();

        assert_eq!(bare, items);
        assert_eq!(bare, nested);
        assert_eq!(bare.items.len(), 1);

        let row = &bare.items[0];
        assert_eq!(row.id, "1");
        assert_eq!(row.status, "pending review");
        assert!(row.pending_review);
        assert_eq!(row.user.name.as_deref(), Some("A"));
        assert_eq!(row.course.name.as_deref(), Some("C"));
    }

    #[test]
    fn unexpected_list_shape_is_rejected() {
        assert!(matches!(
            SubmissionList::from_remote(json!({ "results": [] })),
            Err(ParseError::ListShape(_))
        ));
        assert!(matches!(
            SubmissionList::from_remote(json!("nope")),
            Err(ParseError::ListShape(_))
        ));
    }

    #[test]
    fn numeric_ids_and_bare_references() {
        let submission = Submission::from_remote(json!({
            "data": {
                "id": 42,
                "user_id": 7,
                "course_id": "c-9",
                "status": "approved",
                "submitted_at": "2024-03-05 10:15:00",
                "file": { "download_url": "https://files.example/42.pdf" },
                "description": "Essay",
            }
        }))
        .unwrap();

        assert_eq!(submission.id, "42");
        assert_eq!(submission.user.id.as_deref(), Some("7"));
        assert_eq!(submission.course.id.as_deref(), Some("c-9"));
        assert!(!submission.pending_review);
        assert_eq!(submission.submitted_at.to_rfc3339(), "2024-03-05T10:15:00+00:00");
        assert_eq!(
            submission.file.map(|f| f.download_url),
            Some("https://files.example/42.pdf".to_owned())
        );
    }

    #[test]
    fn missing_user_reference_fails() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("user");
        assert!(matches!(
            Submission::from_remote(raw),
            Err(ParseError::MissingReference("user"))
        ));
    }

    #[test]
    fn garbled_timestamp_fails() {
        let mut raw = sample();
        raw["submitted_at"] = json!("yesterday");
        assert!(matches!(
            Submission::from_remote(raw),
            Err(ParseError::Timestamp(_))
        ));
    }

    #[test]
    fn pending_status_vocabulary() {
        assert!(is_pending_review("to_approve"));
        assert!(is_pending_review("Pending Review"));
        assert!(!is_pending_review("rejected"));
    }

    #[test]
    fn update_outcome_keeps_whatever_the_vendor_acknowledged() {
        let echoed = UpdateOutcome::from_remote(&sample().to_string());
        assert!(matches!(echoed, UpdateOutcome::Updated(ref s) if s.id == "1"));

        assert_eq!(
            UpdateOutcome::from_remote(r#"{"data":{"success":true}}"#),
            UpdateOutcome::Acknowledged(json!({ "data": { "success": true } }))
        );
        assert_eq!(
            UpdateOutcome::from_remote(""),
            UpdateOutcome::Acknowledged(json!({ "ok": true }))
        );
        assert_eq!(
            UpdateOutcome::from_remote("OK"),
            UpdateOutcome::Acknowledged(json!({ "ok": true }))
        );
    }
}
