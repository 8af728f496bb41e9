//! Structured replies.
//!
//! The model answers with one loosely-typed JSON object whose fields depend
//! on the variant and on which flags it set. [`parse_reply`] turns that
//! object into a [`DialogueReply`] whose [`ReplyKind`] only carries the
//! fields relevant to what the assistant asked for.

use serde::Deserialize;

use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{
    CustomerInfo, PriceEstimate, ProposedAction, ServiceDetails, Variant,
};

/// What the assistant wants beyond speaking its message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    /// Plain answer.
    Informational,
    /// Show the offering cards.
    PackagesShown,
    /// Ask the visitor for contact details.
    InfoRequested,
    /// File a service request for this customer.
    RecordCreated { customer: CustomerInfo },
    /// A mutation that must be confirmed before it runs.
    ConfirmationRequested { action: ProposedAction },
    /// The user confirmed; the mutation may run.
    ActionConfirmed { action: ProposedAction },
}

impl ReplyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::PackagesShown => "packages_shown",
            Self::InfoRequested => "info_requested",
            Self::RecordCreated { .. } => "record_created",
            Self::ConfirmationRequested { .. } => "confirmation_requested",
            Self::ActionConfirmed { .. } => "action_confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueReply {
    /// Text to speak and show. May be empty, in which case nothing is spoken.
    pub message: String,
    /// Service-request slots extracted so far.
    pub service_details: Option<ServiceDetails>,
    /// Latest quote, whatever kind of reply it came with.
    pub price_estimate: Option<PriceEstimate>,
    pub kind: ReplyKind,
}

impl DialogueReply {
    pub fn informational(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            service_details: None,
            price_estimate: None,
            kind: ReplyKind::Informational,
        }
    }

    pub fn has_speech(&self) -> bool {
        !self.message.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    message: String,
    #[serde(default)]
    service_details: Option<ServiceDetails>,
    #[serde(default)]
    should_show_packages: bool,
    #[serde(default)]
    price_estimate: Option<PriceEstimate>,
    #[serde(default)]
    should_capture_info: bool,
    #[serde(default)]
    customer_info: Option<CustomerInfo>,
    #[serde(default)]
    create_service_request: bool,
    #[serde(default)]
    action: Option<ProposedAction>,
    #[serde(default)]
    confirmed: bool,
}

impl RawReply {
    fn into_reply(self, variant: Variant) -> DialogueReply {
        let kind = match variant {
            Variant::Manager => match self.action {
                Some(action) if self.confirmed => ReplyKind::ActionConfirmed { action },
                Some(action) if action.requires_confirmation => {
                    ReplyKind::ConfirmationRequested { action }
                }
                _ => ReplyKind::Informational,
            },
            Variant::Receptionist => {
                let customer = self.customer_info.filter(CustomerInfo::is_complete);
                match customer {
                    Some(customer) if self.create_service_request => {
                        ReplyKind::RecordCreated { customer }
                    }
                    _ if self.create_service_request || self.should_capture_info => {
                        ReplyKind::InfoRequested
                    }
                    _ if self.should_show_packages => ReplyKind::PackagesShown,
                    _ => ReplyKind::Informational,
                }
            }
        };

        DialogueReply {
            message: self.message,
            service_details: self.service_details.filter(|d| !d.is_empty()),
            price_estimate: self.price_estimate,
            kind,
        }
    }
}

/// Parse the model's JSON output for the given variant.
pub fn parse_reply(raw: &str, variant: Variant) -> Result<DialogueReply, BridgeError> {
    let raw: RawReply = serde_json::from_str(raw.trim()).map_err(BridgeError::malformed)?;
    Ok(raw.into_reply(variant))
}

/// Parse an already-decoded JSON value for the given variant.
pub fn reply_from_value(
    value: serde_json::Value,
    variant: Variant,
) -> Result<DialogueReply, BridgeError> {
    let raw: RawReply = serde_json::from_value(value).map_err(BridgeError::malformed)?;
    Ok(raw.into_reply(variant))
}
