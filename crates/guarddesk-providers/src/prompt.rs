//! System prompts for the two assistants.

use std::fmt::Write as _;

use chrono::NaiveDate;

use guarddesk_core::types::{Offering, Variant};

const RECEPTIONIST_ROLE: &str = "\
You are the voice receptionist of a security guard company. You answer questions \
about our guarding services and pricing, help visitors describe what they need \
(number of guards, dates, shift type, location) and, once they want to proceed, \
collect their name plus an email address or phone number so a service request can \
be filed. Keep answers short; they are read aloud.";

const RECEPTIONIST_FIELDS: &str = r#"Respond ONLY with a JSON object:
{
  "message": string,                  // what you say to the visitor
  "serviceDetails": {                 // slots gathered so far, omit unknown ones
    "serviceType"?: string, "numGuards"?: number, "startDate"?: "YYYY-MM-DD",
    "endDate"?: "YYYY-MM-DD", "shiftType"?: string, "location"?: string, "notes"?: string
  },
  "shouldShowPackages"?: boolean,     // true to display the packages
  "priceEstimate"?: {"total": number, "currency": "PKR", "breakdown"?: string},
  "shouldCaptureInfo"?: boolean,      // true to ask for contact details
  "customerInfo"?: {"name": string, "email"?: string, "phone"?: string, "company"?: string},
  "createServiceRequest"?: boolean    // true once name and email or phone are known
}"#;

const MANAGER_ROLE: &str = "\
You are the operations assistant in a security company's dashboard. Managers ask \
you to look things up and to create, update or delete guards, branches and places. \
Never perform a change without asking first: propose it with requiresConfirmation \
set to true and wait. Only when the manager says yes, repeat the same action with \
confirmed set to true. If they decline, drop the action. Keep answers short; they \
are read aloud.";

const MANAGER_FIELDS: &str = r#"Respond ONLY with a JSON object:
{
  "message": string,
  "action"?: {
    "type": "create" | "update" | "delete",
    "entity": "guard" | "branch" | "place",
    "data": object,                   // fields to set; refer to records by "name"
    "requiresConfirmation": boolean
  },
  "confirmed"?: boolean               // true only after the manager confirmed
}"#;

/// Build the system prompt for `variant`.
///
/// `offerings` grounds the receptionist's pricing answers and is ignored for
/// the manager. `today` anchors relative dates ("tomorrow") in the slots.
pub fn system_prompt(variant: Variant, offerings: Option<&[Offering]>, today: NaiveDate) -> String {
    let mut prompt = String::new();
    match variant {
        Variant::Receptionist => {
            prompt.push_str(RECEPTIONIST_ROLE);
            let _ = write!(prompt, "\n\nToday is {}.\n\n", today.format("%Y-%m-%d (%A)"));
            prompt.push_str(&render_offerings(offerings.unwrap_or_default()));
            prompt.push_str("\n\n");
            prompt.push_str(RECEPTIONIST_FIELDS);
        }
        Variant::Manager => {
            prompt.push_str(MANAGER_ROLE);
            let _ = write!(prompt, "\n\nToday is {}.\n\n", today.format("%Y-%m-%d (%A)"));
            prompt.push_str(MANAGER_FIELDS);
        }
    }
    prompt
}

/// Render active offerings as a bullet list for the prompt.
pub fn render_offerings(offerings: &[Offering]) -> String {
    if offerings.is_empty() {
        return "No packages are currently listed. Do not quote prices; offer to file a \
                request so the team can send a quote."
            .into();
    }

    let mut out = String::from("Current packages (prices are per guard):\n");
    for offering in offerings {
        let _ = write!(
            out,
            "- {}: {} PKR per {}",
            offering.name,
            format_price(offering.price),
            offering.billing_unit
        );
        if let Some(hours) = offering.shift_hours {
            let _ = write!(out, " ({hours}-hour shift)");
        }
        if let Some(desc) = offering.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, ". {}", desc.trim_end_matches('.'));
            out.push('.');
        }
        if !offering.features.is_empty() {
            let _ = write!(out, " Includes: {}.", offering.features.join(", "));
        }
        out.push('\n');
    }
    out.pop();
    out
}

fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}
