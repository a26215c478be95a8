use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Candidate,
    Recruiter,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "candidate" => Some(UserRole::Candidate),
            "recruiter" => Some(UserRole::Recruiter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Candidate => "candidate",
            UserRole::Recruiter => "recruiter",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSummary {
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

/// A conversation between exactly one candidate and one recruiter. Threads
/// are never deleted client-side; a closed thread has `is_active = false`.
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
    pub candidate_id: String,
    pub recruiter_id: String,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub candidate_profile: Option<ProfileSummary>,
    #[serde(default)]
    pub recruiter_profile: Option<ProfileSummary>,
}

impl Thread {
    /// The profile shown for this thread: each participant sees the other.
    pub fn counterpart(&self, viewer: UserRole) -> Option<&ProfileSummary> {
        match viewer {
            UserRole::Recruiter => self.candidate_profile.as_ref(),
            UserRole::Candidate => self.recruiter_profile.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}

/// Send payload. The id and timestamp are assigned by the store; the sent
/// message reaches the UI through the change-feed echo.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub thread_id: String,
    pub sender_id: String,
    pub content: String,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_rows_default_optional_fields_and_ignore_unknown() {
        let thread: Thread = serde_json::from_str(
            r#"{
                "id": "t1",
                "candidate_id": "c1",
                "recruiter_id": "r1",
                "trust_score": 99
            }"#,
        )
        .expect("minimal thread row");
        assert!(thread.is_active);
        assert!(thread.last_message_at.is_none());
        assert!(thread.candidate_profile.is_none());
    }

    #[test]
    fn message_rows_require_all_fields() {
        let row = r#"{"id": "m1", "thread_id": "t1", "sender_id": "c1"}"#;
        assert!(serde_json::from_str::<Message>(row).is_err());
    }

    #[test]
    fn roles_round_trip_as_lowercase() {
        assert_eq!(UserRole::parse("recruiter"), Some(UserRole::Recruiter));
        assert_eq!(UserRole::parse("Recruiter"), None);
        assert_eq!(
            serde_json::to_string(&UserRole::Candidate).expect("serialize role"),
            "\"candidate\""
        );
    }

    #[test]
    fn counterpart_follows_the_viewer_role() {
        let thread: Thread = serde_json::from_str(
            r#"{
                "id": "t1",
                "candidate_id": "c1",
                "recruiter_id": "r1",
                "candidate_profile": {"full_name": "Jane Doe"},
                "recruiter_profile": {"full_name": "Sam Recruiter", "company_name": "Acme"}
            }"#,
        )
        .expect("thread row with profiles");
        assert_eq!(
            thread
                .counterpart(UserRole::Recruiter)
                .map(|p| p.full_name.as_str()),
            Some("Jane Doe")
        );
        assert_eq!(
            thread
                .counterpart(UserRole::Candidate)
                .map(|p| p.full_name.as_str()),
            Some("Sam Recruiter")
        );
    }
}
