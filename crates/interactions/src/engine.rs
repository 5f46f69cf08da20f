use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parley_core::interaction::{Interaction, InteractionKind};
use parley_core::response::{InteractionResponse, ResponseKind};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::handler::{DeliveryOutcome, Emitted, HandlerContext, InteractionHandler, Responder};
use crate::registry::{FocusedOption, Registry};
use crate::reports::{FailureReport, FailureReportSink};
use crate::state::CorrelationStore;

/// Capacity of the per-interaction response channel. Handlers emitting
/// faster than delivery proceeds are backpressured here.
const CHANNEL_CAPACITY: usize = 8;

const TIMEOUT_MESSAGE: &str = "The command did not respond in time. This shouldn't happen :(";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("delivery failed: {message}")]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Outbound side of the engine. The REST client implements this in
/// production; tests substitute recording fakes.
#[async_trait]
pub trait ResponseDelivery: Send + Sync {
    async fn create_followup(
        &self,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<Value, DeliveryError>;

    async fn edit_original(
        &self,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<Value, DeliveryError>;
}

/// Drives one handler per inbound interaction through the two-phase
/// protocol: the first emitted message must become the direct webhook reply
/// within the acknowledgement deadline; everything after it is delivered
/// through ordinary REST calls, in emission order.
pub struct Engine {
    delivery: Arc<dyn ResponseDelivery>,
    store: Arc<CorrelationStore>,
    reports: Arc<dyn FailureReportSink>,
    ack_deadline: Duration,
}

impl Engine {
    pub fn new(
        delivery: Arc<dyn ResponseDelivery>,
        store: Arc<CorrelationStore>,
        reports: Arc<dyn FailureReportSink>,
        ack_deadline: Duration,
    ) -> Self {
        Self { delivery, store, reports, ack_deadline }
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    /// Routes and executes one interaction. The returned response is the
    /// direct HTTP reply to the webhook call; `None` means nothing matched
    /// or nothing was produced, which the server surfaces as HTTP 400.
    pub async fn dispatch(
        &self,
        registry: &Registry,
        interaction: Interaction,
    ) -> Option<InteractionResponse> {
        if interaction.kind == InteractionKind::Ping {
            return Some(InteractionResponse::pong());
        }

        let interaction = Arc::new(interaction);
        let Some(resolution) = registry.resolve(&interaction) else {
            // Most likely a stale command registration on the platform
            // side; not an error worth more than a debug line.
            debug!(
                event_name = "engine.dispatch.unrouted",
                interaction_id = %interaction.id,
                kind = ?interaction.kind,
                "no handler matched, dropping interaction"
            );
            return None;
        };

        for check in &resolution.checks {
            if let Some(rejection) = check.check(&interaction) {
                debug!(
                    event_name = "engine.dispatch.check_rejected",
                    command = %resolution.routing_key,
                    check = check.name(),
                    "predicate rejected invocation"
                );
                return Some(rejection);
            }
        }

        let ctx = HandlerContext {
            interaction: Arc::clone(&interaction),
            args: resolution.args,
            state: Arc::clone(&self.store),
        };

        if interaction.kind == InteractionKind::Autocomplete {
            return Some(self.run_autocomplete(&resolution.handler, &ctx, resolution.focused).await);
        }

        let (tx, mut rx) = mpsc::channel::<Emitted>(CHANNEL_CAPACITY);
        self.spawn_handler(resolution.handler, resolution.routing_key.clone(), ctx, tx);

        match tokio::time::timeout(self.ack_deadline, rx.recv()).await {
            Ok(Some(emitted)) => {
                if let Some(outcome_tx) = emitted.outcome_tx {
                    // The acknowledgement is the webhook reply itself;
                    // there is no created message body to hand back.
                    let _ = outcome_tx.send(Ok(Value::Null));
                }
                self.spawn_drain(interaction.token.clone(), resolution.routing_key, rx);
                Some(emitted.response)
            }
            Ok(None) => {
                warn!(
                    event_name = "engine.dispatch.no_response",
                    command = %resolution.routing_key,
                    "handler finished without emitting a response"
                );
                None
            }
            Err(_elapsed) => {
                warn!(
                    event_name = "engine.dispatch.ack_timeout",
                    command = %resolution.routing_key,
                    deadline_ms = self.ack_deadline.as_millis() as u64,
                    "first response missed the acknowledgement deadline"
                );
                // The handler keeps running; whatever it emits later is
                // delivered as ordinary follow-ups.
                self.spawn_drain(interaction.token.clone(), resolution.routing_key, rx);
                Some(InteractionResponse::message(TIMEOUT_MESSAGE).ephemeral())
            }
        }
    }

    /// Autocomplete is the degenerate single-shot variant: same deadline,
    /// no deferral, no follow-ups. A missed deadline answers with an empty
    /// choice list rather than nothing at all.
    async fn run_autocomplete(
        &self,
        handler: &Arc<dyn InteractionHandler>,
        ctx: &HandlerContext,
        focused: Option<FocusedOption>,
    ) -> InteractionResponse {
        let Some(focused) = focused else {
            return InteractionResponse::autocomplete(Vec::new());
        };

        match tokio::time::timeout(
            self.ack_deadline,
            handler.autocomplete(ctx, &focused.name, &focused.value),
        )
        .await
        {
            Ok(choices) => InteractionResponse::autocomplete(choices),
            Err(_elapsed) => {
                warn!(
                    event_name = "engine.autocomplete.deadline",
                    option = %focused.name,
                    "autocomplete missed the deadline, answering empty"
                );
                InteractionResponse::autocomplete(Vec::new())
            }
        }
    }

    /// Runs the handler on its own task. An `Err` is intercepted here:
    /// logged with full context, persisted under an opaque error id, and
    /// turned into a best-effort apology that flows through the same
    /// channel as regular responses.
    fn spawn_handler(
        &self,
        handler: Arc<dyn InteractionHandler>,
        routing_key: String,
        ctx: HandlerContext,
        tx: mpsc::Sender<Emitted>,
    ) {
        let reports = Arc::clone(&self.reports);

        tokio::spawn(async move {
            let responder = Responder::new(tx);
            let Err(failure) = handler.run(ctx.clone(), responder.clone()).await else {
                return;
            };

            let error_id = Uuid::new_v4().simple().to_string();
            error!(
                event_name = "engine.handler.failed",
                error_id = %error_id,
                command = %routing_key,
                arguments = ?ctx.args,
                author_id = ctx.author_id().unwrap_or("unknown"),
                guild_id = ctx.guild_id().unwrap_or("unknown"),
                error = %failure,
                "handler failed, converting to fallback response"
            );

            reports
                .record(FailureReport {
                    error_id: error_id.clone(),
                    command: routing_key,
                    arguments: format!("{:?}", ctx.args),
                    author_id: ctx.author_id().map(str::to_owned),
                    guild_id: ctx.guild_id().map(str::to_owned),
                    detail: failure.to_string(),
                    occurred_at: Utc::now(),
                })
                .await;

            let apology = InteractionResponse::message(format!(
                "Something went wrong while running this command. \
                 Please report the error id `{error_id}` to the support team."
            ))
            .ephemeral();

            // Best effort: if the interaction already finished there is
            // nobody left to tell.
            let _ = responder.send(apology).await;
        });
    }

    /// Sequentially delivers everything emitted after the acknowledgement.
    /// One task per interaction keeps emission order; channel messages
    /// become follow-up creations, updates edit the original response, and
    /// anything else cannot follow an acknowledgement.
    fn spawn_drain(&self, token: String, routing_key: String, mut rx: mpsc::Receiver<Emitted>) {
        let delivery = Arc::clone(&self.delivery);

        tokio::spawn(async move {
            while let Some(emitted) = rx.recv().await {
                let outcome: DeliveryOutcome = match emitted.response.kind {
                    ResponseKind::ChannelMessage => {
                        delivery.create_followup(&token, &emitted.response).await
                    }
                    ResponseKind::UpdateMessage => {
                        delivery.edit_original(&token, &emitted.response).await
                    }
                    other => {
                        warn!(
                            event_name = "engine.delivery.unsupported_kind",
                            command = %routing_key,
                            kind = ?other,
                            "response kind cannot follow the acknowledgement, dropping"
                        );
                        Err(DeliveryError::new(
                            "only channel messages and updates can follow the acknowledgement",
                        ))
                    }
                };

                if let Err(delivery_error) = &outcome {
                    warn!(
                        event_name = "engine.delivery.failed",
                        command = %routing_key,
                        error = %delivery_error,
                        "follow-up delivery failed"
                    );
                }

                if let Some(outcome_tx) = emitted.outcome_tx {
                    let _ = outcome_tx.send(outcome);
                }
            }
        });
    }
}
