//! Domain types shared by the voice pipeline and its collaborators.

use serde::{Deserialize, Serialize};

/// Phase of a conversation. Exactly one phase is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Speaking,
}

impl SessionState {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    /// Label shown next to the orb.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Tap to talk",
            Self::Listening => "Listening...",
            Self::Thinking => "Thinking...",
            Self::Speaking => "Speaking...",
        }
    }
}

/// Which assistant a session runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Public marketing-site receptionist: pricing answers and service requests.
    #[default]
    Receptionist,
    /// Authenticated dashboard manager: confirmable mutations.
    Manager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation history sent with every dialogue request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A mutation proposed by the dashboard assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Target entity kind, e.g. "guard", "branch", "place".
    pub entity: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub requires_confirmation: bool,
}

/// An active service package offered on the public site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Price per guard for one billing unit.
    pub price: f64,
    /// "shift", "hour", "day" or "month".
    #[serde(default = "default_billing_unit")]
    pub billing_unit: String,
    #[serde(default)]
    pub shift_hours: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
}

fn default_billing_unit() -> String {
    "shift".into()
}

/// Service-request slots extracted from the conversation so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_guards: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ServiceDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEstimate {
    pub total: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<String>,
}

fn default_currency() -> String {
    "PKR".into()
}

/// Contact details captured before a service request is filed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl CustomerInfo {
    /// A record can only be filed when there is a name and some way to reach the customer.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && (self.email.is_some() || self.phone.is_some())
    }
}

/// Reference to a service request created in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequestRef {
    pub id: String,
    pub request_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_wire_shape() {
        let msg = ChatMessage::user("I need two guards");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "I need two guards");
    }

    #[test]
    fn test_proposed_action_deser() {
        let action: ProposedAction = serde_json::from_str(
            r#"{"type": "update", "entity": "guard", "data": {"name": "Aslam", "status": "inactive"}, "requiresConfirmation": true}"#,
        )
        .unwrap();
        assert_eq!(action.action_type, ActionType::Update);
        assert_eq!(action.entity, "guard");
        assert!(action.requires_confirmation);
        assert_eq!(action.data["name"], "Aslam");
    }

    #[test]
    fn test_customer_info_completeness() {
        let mut info = CustomerInfo {
            name: "Sara".into(),
            ..Default::default()
        };
        assert!(!info.is_complete());
        info.phone = Some("0300-1234567".into());
        assert!(info.is_complete());
    }

    #[test]
    fn test_state_default_idle() {
        assert!(SessionState::default().is_idle());
        assert_eq!(SessionState::Thinking.label(), "Thinking...");
    }
}
