//! HTTP implementation of the backend collaborators.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use guarddesk_core::config::BackendConfig;
use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{CustomerInfo, Offering, ProposedAction, ServiceRequestRef};

use crate::lookup::{NamedRecord, needs_resolution, resolve_action};
use crate::{
    ActionExecutor, ActionOutcome, ActionRequest, ActionResponse, NewServiceRequest,
    OfferingsSource, ServiceRequestDesk,
};

pub struct HttpBackend {
    pub base_url: String,
    token: Option<String>,
    resolve_names: bool,
    client: reqwest::Client,
}

/// Offerings come back either bare or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum OfferingsResponse {
    Bare(Vec<Offering>),
    Wrapped { offerings: Vec<Offering> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsResponse {
    Bare(Vec<NamedRecord>),
    Wrapped { data: Vec<NamedRecord> },
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            resolve_names: true,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let mut backend = Self::new(&config.base_url);
        backend.token = config.resolve_token();
        if config.resolve_names {
            backend
        } else {
            backend.without_name_resolution()
        }
    }

    /// Skip the directory lookup and let the server resolve names itself.
    pub fn without_name_resolution(mut self) -> Self {
        self.resolve_names = false;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, BridgeError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }
        response.json().await.map_err(BridgeError::malformed)
    }

    async fn directory(&self, entity: &str) -> Result<Vec<NamedRecord>, BridgeError> {
        let url = self.url(&format!("/api/{entity}s"));
        debug!(url = %url, "Fetching directory for name lookup");
        let records: RecordsResponse = self.send(self.client.get(url)).await?;
        Ok(match records {
            RecordsResponse::Bare(records) | RecordsResponse::Wrapped { data: records } => records,
        })
    }
}

#[async_trait]
impl OfferingsSource for HttpBackend {
    async fn active_offerings(&self) -> Result<Vec<Offering>, BridgeError> {
        let url = self.url("/api/offerings?active=true");
        debug!(url = %url, "Fetching active offerings");
        let offerings: OfferingsResponse = self.send(self.client.get(url)).await?;
        Ok(match offerings {
            OfferingsResponse::Bare(list) | OfferingsResponse::Wrapped { offerings: list } => list,
        })
    }
}

#[async_trait]
impl ServiceRequestDesk for HttpBackend {
    async fn create(&self, request: &NewServiceRequest) -> Result<ServiceRequestRef, BridgeError> {
        let url = self.url("/api/service-requests");
        debug!(url = %url, customer = %request.customer.name, "Creating service request");
        self.send(self.client.post(url).json(request)).await
    }

    async fn notify(
        &self,
        reference: &ServiceRequestRef,
        customer: &CustomerInfo,
    ) -> Result<(), BridgeError> {
        let url = self.url("/api/service-requests/notify");
        debug!(url = %url, request_number = %reference.request_number, "Sending confirmation");
        let _: serde_json::Value = self
            .send(self.client.post(url).json(&json!({
                "id": reference.id,
                "requestNumber": reference.request_number,
                "customer": customer,
            })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ActionExecutor for HttpBackend {
    async fn execute(&self, action: &ProposedAction) -> Result<ActionOutcome, BridgeError> {
        let action = if self.resolve_names && needs_resolution(action) {
            let records = self.directory(&action.entity).await?;
            resolve_action(action, &records)?
        } else {
            action.clone()
        };

        let url = self.url("/api/dashboard/actions");
        debug!(
            url = %url,
            action_type = action.action_type.as_str(),
            entity = %action.entity,
            "Executing dashboard action"
        );

        let response = self
            .authorize(self.client.post(url).json(&ActionRequest::from(&action)))
            .send()
            .await
            .map_err(BridgeError::transport)?;

        // Failures carry `{error}` in the body, often with a non-2xx status.
        let status = response.status();
        let text = response.text().await.map_err(BridgeError::transport)?;
        match serde_json::from_str::<ActionResponse>(&text) {
            Ok(parsed) => parsed.into_outcome(),
            Err(_) if !status.is_success() => Err(BridgeError::Status {
                status: status.as_u16(),
                body: text,
            }),
            Err(e) => Err(BridgeError::malformed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let backend = HttpBackend::new("https://guards.example.com/");
        assert_eq!(backend.url("/api/offerings"), "https://guards.example.com/api/offerings");
    }

    #[test]
    fn test_from_config_token() {
        let backend = HttpBackend::from_config(&BackendConfig {
            base_url: "http://localhost:3000".into(),
            token: Some("tok".into()),
            token_env: None,
            resolve_names: true,
        });
        assert_eq!(backend.token.as_deref(), Some("tok"));
        assert!(backend.resolve_names);
    }

    #[test]
    fn test_name_resolution_can_be_disabled() {
        let config: BackendConfig = serde_json::from_str(
            r#"{"base_url": "http://localhost:3000", "resolve_names": false}"#,
        )
        .unwrap();
        assert!(!HttpBackend::from_config(&config).resolve_names);

        let config: BackendConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:3000"}"#).unwrap();
        assert!(HttpBackend::from_config(&config).resolve_names);
    }

    #[test]
    fn test_offerings_response_shapes() {
        let bare: OfferingsResponse =
            serde_json::from_str(r#"[{"id": "1", "name": "Basic", "price": 4500}]"#).unwrap();
        let wrapped: OfferingsResponse = serde_json::from_str(
            r#"{"offerings": [{"id": "1", "name": "Basic", "price": 4500, "billingUnit": "hour"}]}"#,
        )
        .unwrap();
        assert!(matches!(bare, OfferingsResponse::Bare(ref l) if l[0].billing_unit == "shift"));
        assert!(matches!(wrapped, OfferingsResponse::Wrapped { ref offerings } if offerings[0].billing_unit == "hour"));
    }

    #[test]
    fn test_service_request_ref_deser() {
        let reference: ServiceRequestRef =
            serde_json::from_str(r#"{"id": "abc", "requestNumber": "SR-2026-0042", "status": "new"}"#)
                .unwrap();
        assert_eq!(reference.request_number, "SR-2026-0042");
    }
}
