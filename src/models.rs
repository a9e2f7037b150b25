// Data types shared between the API client and the state store
//
// Everything here mirrors a JSON body on the wire, so every type derives
// Serialize + Deserialize. The backend is tolerant about extra fields and so
// are we: unknown fields are ignored on deserialization.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// An authenticated user as returned by `/auth/login` and `/auth/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Whether the user finished the post-registration profile form
    #[serde(default)]
    pub profile_completed: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// True when the user still has to complete their profile
    pub fn needs_profile_completion(&self) -> bool {
        !self.profile_completed
    }
}

/// Login form payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration form payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// Successful response from `/auth/login` and `/auth/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Partial profile update for `PUT /auth/me` - absent fields are untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_completed: Option<bool>,
}

/// Weights for the three RFM dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmWeights {
    pub recency_weight: f64,
    pub frequency_weight: f64,
    pub monetary_weight: f64,
}

/// Request body for `POST /rfm/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmAnalysisRequest {
    pub parameters: RfmWeights,
}

/// Aggregate metrics across the analyzed customer base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmMetrics {
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub avg_monetary: f64,
}

/// Result of a single RFM analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmAnalysis {
    /// Segment name -> customer count
    pub segments: HashMap<String, u64>,
    pub metrics: RfmMetrics,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Human-readable description of a customer segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDescription {
    pub segment: String,
    pub description: String,
}

/// Request body for `POST /marketplace/generate-message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub segment: String,
    pub tone: String,
    pub length: String,
}

/// A marketing message produced by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub id: String,
    pub title: String,
    pub content: String,
    pub segment: String,
    #[serde(default)]
    pub tone: Option<String>,
}

/// Request body for `POST /marketplace/generate-insight`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRequest {
    pub segment: String,
    pub metric: String,
    pub timeframe: String,
}

/// A business insight produced by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub title: String,
    pub content: String,
    pub segment: String,
    #[serde(default)]
    pub metric: Option<String>,
}

/// Headline numbers for the dashboard view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_analyses: u64,
    pub total_messages: u64,
}

/// Severity of a transient UI notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

/// A transient notification shown by the UI collaborator
///
/// Created by the state store; self-expires after its duration (default 5s)
/// via a deferred removal task. The id is the creation timestamp in
/// milliseconds plus a process-wide sequence suffix, so notifications
/// created within the same millisecond still get distinct ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

static NOTIFICATION_SEQ: AtomicI64 = AtomicI64::new(0);

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        let seq = NOTIFICATION_SEQ.fetch_add(1, Ordering::Relaxed).rem_euclid(1000);
        Self {
            id: Utc::now().timestamp_millis() * 1000 + seq,
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_and_permission_checks() {
        let user = User {
            id: "u1".into(),
            email: "a@b.c".into(),
            full_name: None,
            company: None,
            profile_completed: false,
            roles: vec!["admin".into()],
            permissions: vec!["rfm:analyze".into()],
        };
        assert!(user.has_role("admin"));
        assert!(!user.has_role("viewer"));
        assert!(user.has_permission("rfm:analyze"));
        assert!(user.needs_profile_completion());
    }

    #[test]
    fn test_user_deserializes_with_missing_optional_fields() {
        let user: User = serde_json::from_str(r#"{"id":"u1","email":"a@b.c"}"#).unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.roles.is_empty());
        assert!(!user.profile_completed);
    }

    #[test]
    fn test_notification_kind_serializes_lowercase() {
        let json = serde_json::to_string(&NotificationKind::Warning).unwrap();
        assert_eq!(json, r#""warning""#);
    }

    #[test]
    fn test_notification_ids_distinct_within_one_millisecond() {
        let a = Notification::new(NotificationKind::Info, "t", "m");
        let b = Notification::new(NotificationKind::Info, "t", "m");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_profile_update_skips_absent_fields() {
        let update = ProfileUpdate {
            full_name: Some("New Name".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"full_name":"New Name"}"#);
    }
}
