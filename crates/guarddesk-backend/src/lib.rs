//! Business backend collaborators.
//!
//! The voice session never talks to the backend directly; it goes through
//! these traits so tests can substitute scripted implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{
    CustomerInfo, Offering, PriceEstimate, ProposedAction, ServiceDetails, ServiceRequestRef,
};

pub mod http;
pub mod lookup;

pub use http::HttpBackend;

/// Source of the currently active offerings. Queried fresh on every turn.
#[async_trait]
pub trait OfferingsSource: Send + Sync {
    async fn active_offerings(&self) -> Result<Vec<Offering>, BridgeError>;
}

/// Payload of a new service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServiceRequest {
    pub customer: CustomerInfo,
    #[serde(default)]
    pub service_details: ServiceDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_estimate: Option<PriceEstimate>,
}

/// Files service requests and sends their confirmation email.
#[async_trait]
pub trait ServiceRequestDesk: Send + Sync {
    async fn create(&self, request: &NewServiceRequest) -> Result<ServiceRequestRef, BridgeError>;

    /// Send the confirmation for a request created by [`create`](Self::create).
    async fn notify(
        &self,
        reference: &ServiceRequestRef,
        customer: &CustomerInfo,
    ) -> Result<(), BridgeError>;
}

/// Result of a successfully executed dashboard action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub message: Option<String>,
}

/// Runs confirmed dashboard mutations.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &ProposedAction) -> Result<ActionOutcome, BridgeError>;
}

/// Wire body of an action execution request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActionRequest<'a> {
    pub action_type: &'static str,
    pub entity: &'a str,
    pub data: &'a serde_json::Value,
}

impl<'a> From<&'a ProposedAction> for ActionRequest<'a> {
    fn from(action: &'a ProposedAction) -> Self {
        Self {
            action_type: action.action_type.as_str(),
            entity: &action.entity,
            data: &action.data,
        }
    }
}

/// `{success, message?}` or `{error}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ActionResponse {
    pub(crate) fn into_outcome(self) -> Result<ActionOutcome, BridgeError> {
        if let Some(error) = self.error {
            return Err(BridgeError::Rejected(error));
        }
        if !self.success {
            return Err(BridgeError::Rejected(
                self.message.unwrap_or_else(|| "action was not applied".into()),
            ));
        }
        Ok(ActionOutcome {
            message: self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guarddesk_core::types::ActionType;
    use serde_json::json;

    #[test]
    fn test_action_request_wire_shape() {
        let action = ProposedAction {
            action_type: ActionType::Update,
            entity: "guard".into(),
            data: json!({"name": "Aslam", "status": "inactive"}),
            requires_confirmation: true,
        };
        let body = serde_json::to_value(ActionRequest::from(&action)).unwrap();
        assert_eq!(
            body,
            json!({"actionType": "update", "entity": "guard", "data": {"name": "Aslam", "status": "inactive"}})
        );
    }

    #[test]
    fn test_action_response_outcomes() {
        let ok: ActionResponse =
            serde_json::from_str(r#"{"success": true, "message": "Guard updated"}"#).unwrap();
        assert_eq!(ok.into_outcome().unwrap().message.as_deref(), Some("Guard updated"));

        let err: ActionResponse = serde_json::from_str(r#"{"error": "Guard not found"}"#).unwrap();
        assert_eq!(
            err.into_outcome(),
            Err(BridgeError::Rejected("Guard not found".into()))
        );

        let silent: ActionResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(matches!(silent.into_outcome(), Err(BridgeError::Rejected(_))));
    }

    #[test]
    fn test_new_request_wire_shape() {
        let request = NewServiceRequest {
            customer: CustomerInfo {
                name: "Sara".into(),
                phone: Some("0300-1234567".into()),
                ..Default::default()
            },
            service_details: ServiceDetails {
                num_guards: Some(2),
                ..Default::default()
            },
            price_estimate: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["customer"]["name"], "Sara");
        assert_eq!(json["serviceDetails"]["numGuards"], 2);
        assert!(json.get("priceEstimate").is_none());
    }
}
