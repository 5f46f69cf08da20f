use std::sync::Arc;

use async_trait::async_trait;
use parley_core::response::InteractionResponse;
use parley_interactions::engine::{DeliveryError, ResponseDelivery};
use parley_rest::RestClient;
use serde_json::Value;

/// Bridges the engine's delivery contract onto the rate-limited REST
/// client. Engine and client stay decoupled so tests can substitute
/// in-memory fakes for either side.
pub struct RestDelivery {
    client: Arc<RestClient>,
}

impl RestDelivery {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseDelivery for RestDelivery {
    async fn create_followup(
        &self,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<Value, DeliveryError> {
        self.client
            .create_followup_message(token, response)
            .await
            .map_err(|rest_error| DeliveryError::new(rest_error.to_string()))
    }

    async fn edit_original(
        &self,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<Value, DeliveryError> {
        self.client
            .edit_original_response(token, response)
            .await
            .map_err(|rest_error| DeliveryError::new(rest_error.to_string()))
    }
}
