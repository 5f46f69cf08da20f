use std::sync::Arc;

use async_trait::async_trait;
use parley_core::interaction::{Interaction, ModalField, OptionValue};
use parley_core::response::{Choice, InteractionResponse};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::engine::DeliveryError;
use crate::state::CorrelationStore;

/// Arguments resolved by the router for one invocation.
#[derive(Clone, Debug)]
pub enum Args {
    None,
    /// Leaf command options that carried a value, in the order sent.
    Command(Vec<CommandArg>),
    /// Positional arguments decoded from the component custom-id.
    Component(Vec<String>),
    /// Flattened modal field values.
    Modal(Vec<ModalField>),
}

#[derive(Clone, Debug)]
pub struct CommandArg {
    pub name: String,
    pub value: OptionValue,
}

/// Everything a handler can see about the invocation it serves.
#[derive(Clone)]
pub struct HandlerContext {
    pub interaction: Arc<Interaction>,
    pub args: Args,
    pub state: Arc<CorrelationStore>,
}

impl HandlerContext {
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        match &self.args {
            Args::Command(args) => {
                args.iter().find(|arg| arg.name == name).map(|arg| &arg.value)
            }
            _ => None,
        }
    }

    pub fn string_option(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(OptionValue::as_str)
    }

    pub fn integer_option(&self, name: &str) -> Option<i64> {
        self.option(name).and_then(OptionValue::as_i64)
    }

    pub fn boolean_option(&self, name: &str) -> Option<bool> {
        self.option(name).and_then(OptionValue::as_bool)
    }

    pub fn component_arg(&self, index: usize) -> Option<&str> {
        match &self.args {
            Args::Component(args) => args.get(index).map(String::as_str),
            _ => None,
        }
    }

    pub fn modal_field(&self, custom_id: &str) -> Option<&str> {
        match &self.args {
            Args::Modal(fields) => fields
                .iter()
                .find(|field| field.custom_id == custom_id)
                .map(|field| field.value.as_str()),
            _ => None,
        }
    }

    pub fn guild_id(&self) -> Option<&str> {
        self.interaction.guild_id.as_deref()
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.interaction.channel_id.as_deref()
    }

    pub fn author_id(&self) -> Option<&str> {
        self.interaction.author.as_ref().map(|author| author.id.as_str())
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failure(String),
    #[error("response channel closed before the handler finished")]
    ChannelClosed,
}

impl HandlerError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

/// What happened to one delivered message: the created/edited message JSON
/// on success, or the delivery failure.
pub type DeliveryOutcome = Result<Value, DeliveryError>;

pub(crate) struct Emitted {
    pub response: InteractionResponse,
    pub outcome_tx: Option<oneshot::Sender<DeliveryOutcome>>,
}

/// The handler's side of the bounded response channel. Messages are
/// consumed by the engine in emission order.
#[derive(Clone)]
pub struct Responder {
    tx: mpsc::Sender<Emitted>,
}

impl Responder {
    pub(crate) fn new(tx: mpsc::Sender<Emitted>) -> Self {
        Self { tx }
    }

    /// Queues a response without waiting for its delivery.
    pub async fn send(&self, response: InteractionResponse) -> Result<(), HandlerError> {
        self.tx
            .send(Emitted { response, outcome_tx: None })
            .await
            .map_err(|_| HandlerError::ChannelClosed)
    }

    /// Queues a response and suspends until the engine has delivered it,
    /// returning the delivery outcome so the handler can react to failures.
    pub async fn deliver(&self, response: InteractionResponse) -> Result<DeliveryOutcome, HandlerError> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.tx
            .send(Emitted { response, outcome_tx: Some(outcome_tx) })
            .await
            .map_err(|_| HandlerError::ChannelClosed)?;

        outcome_rx.await.map_err(|_| HandlerError::ChannelClosed)
    }
}

/// A registered handler: a cooperative unit of work that may emit zero, one,
/// or many responses over the lifetime of a single interaction.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError>;

    /// Called for autocomplete interactions targeting an option that
    /// declared `autocomplete: true`. Single-shot: the returned choices are
    /// the whole reply.
    async fn autocomplete(&self, _ctx: &HandlerContext, _option: &str, _value: &str) -> Vec<Choice> {
        Vec::new()
    }
}
