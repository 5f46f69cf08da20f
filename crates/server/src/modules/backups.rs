use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::custom_id::CustomId;
use parley_core::response::{Button, ButtonStyle, Choice, Embed, InteractionResponse, TextInput};
use parley_interactions::checks::guild_only;
use parley_interactions::handler::{HandlerContext, HandlerError, InteractionHandler, Responder};
use parley_interactions::registry::{
    CommandSpec, ComponentSpec, ModalSpec, OptionSpec, Registry, RegistryError, SubCommandSpec,
};
use parley_interactions::state::CorrelationStore;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// How long a pending confirmation stays valid.
const CONFIRM_TTL: Duration = Duration::from_secs(300);

const DEFAULT_MESSAGE_COUNT: i64 = 250;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupSummary {
    pub id: String,
    pub guild_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum BackupServiceError {
    #[error("backup service call failed: {0}")]
    Rpc(String),
    #[error("backup `{0}` was not found")]
    UnknownBackup(String),
}

/// The backup RPC service. Encryption, compression and the actual guild
/// snapshotting happen on the other side of this boundary; handlers only
/// see typed requests and responses.
#[async_trait]
pub trait BackupService: Send + Sync {
    async fn create_backup(
        &self,
        guild_id: &str,
        author_id: &str,
    ) -> Result<BackupSummary, BackupServiceError>;

    async fn load_backup(
        &self,
        guild_id: &str,
        backup_id: &str,
        message_count: i64,
    ) -> Result<(), BackupServiceError>;

    async fn delete_backup(&self, author_id: &str, backup_id: &str)
        -> Result<(), BackupServiceError>;

    async fn list_backups(&self, author_id: &str) -> Result<Vec<BackupSummary>, BackupServiceError>;
}

/// Wires the backup command tree, its confirmation components and the
/// restore-options modal into the registry.
pub fn register(
    registry: &mut Registry,
    service: Arc<dyn BackupService>,
) -> Result<(), RegistryError> {
    registry.register_command(
        CommandSpec::parent("backup", "Create, manage and restore backups of this server")
            .check(guild_only())
            .sub_command(SubCommandSpec::new(
                "create",
                "Create a backup of this server",
                Arc::new(CreateHandler { service: Arc::clone(&service) }),
            ))
            .sub_command(
                SubCommandSpec::new(
                    "load",
                    "Restore this server from a backup",
                    Arc::new(LoadHandler { service: Arc::clone(&service) }),
                )
                .option(OptionSpec::string("backup_id", "The backup to restore").autocomplete())
                .option(
                    OptionSpec::integer("message_count", "Messages to restore per channel")
                        .optional(),
                ),
            )
            .sub_command(
                SubCommandSpec::new(
                    "delete",
                    "Delete one of your backups",
                    Arc::new(DeleteHandler { service: Arc::clone(&service) }),
                )
                .option(OptionSpec::string("backup_id", "The backup to delete").autocomplete()),
            )
            .sub_command(SubCommandSpec::new(
                "list",
                "List your backups",
                Arc::new(ListHandler { service: Arc::clone(&service) }),
            )),
    )?;

    registry.register_component(ComponentSpec::new(
        "backup_load_confirm",
        Arc::new(LoadConfirmHandler { service: Arc::clone(&service) }),
    ))?;
    registry.register_component(ComponentSpec::new("backup_load_cancel", Arc::new(LoadCancelHandler)))?;
    registry.register_component(ComponentSpec::new("backup_load_options", Arc::new(LoadOptionsHandler)))?;
    registry.register_component(ComponentSpec::new(
        "backup_delete_confirm",
        Arc::new(DeleteConfirmHandler { service }),
    ))?;

    registry.register_modal(ModalSpec::new(
        "backup_restore_options",
        Arc::new(RestoreOptionsHandler),
    ))?;

    Ok(())
}

fn service_failure(error: BackupServiceError) -> HandlerError {
    HandlerError::failure(error.to_string())
}

async fn backup_choices(
    service: &Arc<dyn BackupService>,
    author_id: &str,
    prefix: &str,
) -> Vec<Choice> {
    let Ok(backups) = service.list_backups(author_id).await else {
        return Vec::new();
    };

    backups
        .iter()
        .filter(|backup| backup.id.starts_with(prefix))
        .take(25)
        .map(|backup| {
            Choice::new(
                format!("{} - {}", backup.id, backup.guild_name),
                backup.id.clone(),
            )
        })
        .collect()
}

struct CreateHandler {
    service: Arc<dyn BackupService>,
}

#[async_trait]
impl InteractionHandler for CreateHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let guild_id = ctx.guild_id().ok_or_else(|| HandlerError::failure("guild missing"))?;
        let author_id = ctx.author_id().unwrap_or_default().to_owned();

        // Snapshotting can take a while; acknowledge first.
        responder.send(InteractionResponse::defer()).await?;

        let backup = self
            .service
            .create_backup(guild_id, &author_id)
            .await
            .map_err(service_failure)?;

        responder
            .send(InteractionResponse::update(format!(
                "Successfully **created a backup** of this server.\n\
                 The backup id is `{}` - load it with `/backup load`.",
                backup.id
            )))
            .await
    }
}

struct LoadHandler {
    service: Arc<dyn BackupService>,
}

#[async_trait]
impl InteractionHandler for LoadHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let backup_id = ctx
            .string_option("backup_id")
            .ok_or_else(|| HandlerError::failure("backup_id option missing"))?
            .to_owned();
        let message_count = ctx.integer_option("message_count").unwrap_or(DEFAULT_MESSAGE_COUNT);

        let state_key = ctx.state.insert(
            json!({"backup_id": backup_id, "message_count": message_count}),
            CONFIRM_TTL,
        );

        let confirm = CustomId::with_args("backup_load_confirm", [state_key.as_str()])
            .encode()
            .map_err(|error| HandlerError::failure(error.to_string()))?;
        let cancel = CustomId::with_args("backup_load_cancel", [state_key.as_str()])
            .encode()
            .map_err(|error| HandlerError::failure(error.to_string()))?;
        let options = CustomId::with_args("backup_load_options", [state_key.as_str()])
            .encode()
            .map_err(|error| HandlerError::failure(error.to_string()))?;

        responder
            .send(
                InteractionResponse::message(format!(
                    "**Restoring** from the backup `{backup_id}` will **replace channels and \
                     roles** of this server. This can **not** be undone.\nAre you sure?"
                ))
                .ephemeral()
                .row(vec![
                    Button::new(confirm, "Confirm").style(ButtonStyle::Success).into(),
                    Button::new(cancel, "Cancel").style(ButtonStyle::Secondary).into(),
                    Button::new(options, "Options").style(ButtonStyle::Secondary).into(),
                ]),
            )
            .await
    }

    async fn autocomplete(&self, ctx: &HandlerContext, _option: &str, value: &str) -> Vec<Choice> {
        backup_choices(&self.service, ctx.author_id().unwrap_or_default(), value).await
    }
}

struct LoadConfirmHandler {
    service: Arc<dyn BackupService>,
}

#[async_trait]
impl InteractionHandler for LoadConfirmHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let state_key = ctx
            .component_arg(0)
            .ok_or_else(|| HandlerError::failure("state key argument missing"))?;

        let Some(state) = ctx.state.pop(state_key) else {
            return responder
                .send(InteractionResponse::update(
                    "This confirmation has **expired**. Run the command again.",
                ))
                .await;
        };

        let backup_id = state["backup_id"].as_str().unwrap_or_default().to_owned();
        let message_count = state["message_count"].as_i64().unwrap_or(DEFAULT_MESSAGE_COUNT);
        let guild_id = ctx.guild_id().unwrap_or_default().to_owned();

        responder.send(InteractionResponse::defer_update()).await?;

        match self.service.load_backup(&guild_id, &backup_id, message_count).await {
            Ok(()) => {
                responder
                    .send(InteractionResponse::update(format!(
                        "Successfully **restored this server** from the backup `{backup_id}`."
                    )))
                    .await
            }
            Err(BackupServiceError::UnknownBackup(_)) => {
                responder
                    .send(InteractionResponse::update(format!(
                        "The backup `{backup_id}` no longer exists."
                    )))
                    .await
            }
            Err(rpc_error) => Err(service_failure(rpc_error)),
        }
    }
}

struct LoadCancelHandler;

#[async_trait]
impl InteractionHandler for LoadCancelHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        if let Some(state_key) = ctx.component_arg(0) {
            ctx.state.pop(state_key);
        }

        responder
            .send(InteractionResponse::update("The **backup load was cancelled**."))
            .await
    }
}

struct LoadOptionsHandler;

#[async_trait]
impl InteractionHandler for LoadOptionsHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let state_key = ctx
            .component_arg(0)
            .ok_or_else(|| HandlerError::failure("state key argument missing"))?;

        // The modal submit arrives as a separate interaction with an exact
        // custom-id; the pending state key travels via the scope key.
        let scope = scope_key(&ctx)?;
        ctx.state.insert_keyed(&scope, json!({"state_key": state_key}), CONFIRM_TTL);

        responder
            .send(InteractionResponse::modal(
                "backup_restore_options",
                "Restore options",
                vec![TextInput::new("message_count", "Messages to restore per channel")
                    .placeholder(DEFAULT_MESSAGE_COUNT.to_string())
                    .optional()],
            ))
            .await
    }
}

struct RestoreOptionsHandler;

#[async_trait]
impl InteractionHandler for RestoreOptionsHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let scope = scope_key(&ctx)?;
        let Some(pending) = ctx.state.pop(&scope) else {
            return responder
                .send(
                    InteractionResponse::message(
                        "These restore options have **expired**. Run the command again.",
                    )
                    .ephemeral(),
                )
                .await;
        };

        let state_key = pending["state_key"].as_str().unwrap_or_default().to_owned();
        let Some(mut state) = ctx.state.pop(&state_key) else {
            return responder
                .send(
                    InteractionResponse::message(
                        "This confirmation has **expired**. Run the command again.",
                    )
                    .ephemeral(),
                )
                .await;
        };

        let message_count = ctx
            .modal_field("message_count")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_MESSAGE_COUNT);
        state["message_count"] = json!(message_count);
        ctx.state.insert_keyed(&state_key, state, CONFIRM_TTL);

        responder
            .send(
                InteractionResponse::message(format!(
                    "Restore options saved: `{message_count}` messages per channel. \
                     Press **Confirm** to start."
                ))
                .ephemeral(),
            )
            .await
    }
}

struct DeleteHandler {
    service: Arc<dyn BackupService>,
}

#[async_trait]
impl InteractionHandler for DeleteHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let backup_id = ctx
            .string_option("backup_id")
            .ok_or_else(|| HandlerError::failure("backup_id option missing"))?;

        // The backup id itself fits in the custom-id, no stored state
        // needed for this flow.
        let confirm = CustomId::with_args("backup_delete_confirm", [backup_id])
            .encode()
            .map_err(|error| HandlerError::failure(error.to_string()))?;

        responder
            .send(
                InteractionResponse::message(format!(
                    "Are you sure that you want to **delete the backup** `{backup_id}`?\n\
                     This can **not** be undone."
                ))
                .ephemeral()
                .component(Button::new(confirm, "Confirm").style(ButtonStyle::Danger)),
            )
            .await
    }

    async fn autocomplete(&self, ctx: &HandlerContext, _option: &str, value: &str) -> Vec<Choice> {
        backup_choices(&self.service, ctx.author_id().unwrap_or_default(), value).await
    }
}

struct DeleteConfirmHandler {
    service: Arc<dyn BackupService>,
}

#[async_trait]
impl InteractionHandler for DeleteConfirmHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let backup_id = ctx
            .component_arg(0)
            .ok_or_else(|| HandlerError::failure("backup id argument missing"))?
            .to_owned();
        let author_id = ctx.author_id().unwrap_or_default().to_owned();

        match self.service.delete_backup(&author_id, &backup_id).await {
            Ok(()) => {
                responder
                    .send(InteractionResponse::update(format!(
                        "Successfully **deleted the backup** `{backup_id}`."
                    )))
                    .await
            }
            Err(BackupServiceError::UnknownBackup(_)) => {
                responder
                    .send(InteractionResponse::update(format!(
                        "The backup `{backup_id}` does not exist (already deleted?)."
                    )))
                    .await
            }
            Err(rpc_error) => Err(service_failure(rpc_error)),
        }
    }
}

struct ListHandler {
    service: Arc<dyn BackupService>,
}

#[async_trait]
impl InteractionHandler for ListHandler {
    async fn run(&self, ctx: HandlerContext, responder: Responder) -> Result<(), HandlerError> {
        let author_id = ctx.author_id().unwrap_or_default().to_owned();
        let backups = self.service.list_backups(&author_id).await.map_err(service_failure)?;

        if backups.is_empty() {
            return responder
                .send(
                    InteractionResponse::message(
                        "You don't have any backups yet. Create one with `/backup create`.",
                    )
                    .ephemeral(),
                )
                .await;
        }

        let mut embed = Embed::new().title("Your backups").color(0x36393e);
        for backup in &backups {
            embed = embed.field(
                format!("`{}`", backup.id),
                format!("{} - {}", backup.guild_name, backup.created_at.format("%Y-%m-%d %H:%M")),
                false,
            );
        }
        embed = embed.footer(format!("{} backup(s)", backups.len()));

        responder.send(InteractionResponse::message("").ephemeral().embed(embed)).await
    }
}

fn scope_key(ctx: &HandlerContext) -> Result<String, HandlerError> {
    let channel_id = ctx
        .channel_id()
        .ok_or_else(|| HandlerError::failure("channel missing for scoped state"))?;
    let author_id = ctx
        .author_id()
        .ok_or_else(|| HandlerError::failure("author missing for scoped state"))?;
    Ok(CorrelationStore::scope_key(channel_id, author_id))
}

/// In-memory stand-in for the backup RPC service, used by tests and local
/// runs without the real backend.
#[derive(Default)]
pub struct InMemoryBackupService {
    backups: Mutex<Vec<(String, BackupSummary)>>,
    loads: Mutex<Vec<(String, String, i64)>>,
}

impl InMemoryBackupService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, author_id: &str, summary: BackupSummary) {
        if let Ok(mut backups) = self.backups.lock() {
            backups.push((author_id.to_owned(), summary));
        }
    }

    pub fn recorded_loads(&self) -> Vec<(String, String, i64)> {
        self.loads.lock().map(|loads| loads.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BackupService for InMemoryBackupService {
    async fn create_backup(
        &self,
        _guild_id: &str,
        author_id: &str,
    ) -> Result<BackupSummary, BackupServiceError> {
        let summary = BackupSummary {
            id: Uuid::new_v4().simple().to_string()[..8].to_owned(),
            guild_name: "test guild".to_owned(),
            created_at: Utc::now(),
        };
        self.seed(author_id, summary.clone());
        Ok(summary)
    }

    async fn load_backup(
        &self,
        guild_id: &str,
        backup_id: &str,
        message_count: i64,
    ) -> Result<(), BackupServiceError> {
        let known = self
            .backups
            .lock()
            .map(|backups| backups.iter().any(|(_, backup)| backup.id == backup_id))
            .unwrap_or(false);
        if !known {
            return Err(BackupServiceError::UnknownBackup(backup_id.to_owned()));
        }

        if let Ok(mut loads) = self.loads.lock() {
            loads.push((guild_id.to_owned(), backup_id.to_owned(), message_count));
        }
        Ok(())
    }

    async fn delete_backup(
        &self,
        author_id: &str,
        backup_id: &str,
    ) -> Result<(), BackupServiceError> {
        let Ok(mut backups) = self.backups.lock() else {
            return Err(BackupServiceError::Rpc("store poisoned".to_owned()));
        };

        let before = backups.len();
        backups.retain(|(owner, backup)| !(owner == author_id && backup.id == backup_id));
        if backups.len() == before {
            return Err(BackupServiceError::UnknownBackup(backup_id.to_owned()));
        }
        Ok(())
    }

    async fn list_backups(&self, author_id: &str) -> Result<Vec<BackupSummary>, BackupServiceError> {
        let Ok(backups) = self.backups.lock() else {
            return Err(BackupServiceError::Rpc("store poisoned".to_owned()));
        };

        Ok(backups
            .iter()
            .filter(|(owner, _)| owner == author_id)
            .map(|(_, backup)| backup.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use parley_core::interaction::{
        Author, CommandData, CommandOption, ComponentData, Interaction, InteractionData,
        InteractionKind, OptionType, OptionValue,
    };
    use parley_core::response::{InteractionResponse, ResponseKind};
    use parley_interactions::engine::{DeliveryError, Engine, ResponseDelivery};
    use parley_interactions::registry::Registry;
    use parley_interactions::reports::InMemoryReportSink;
    use parley_interactions::state::CorrelationStore;
    use serde_json::Value;
    use tokio::sync::Mutex;

    use super::{register, BackupService, BackupSummary, InMemoryBackupService};

    #[derive(Default)]
    struct RecordingDelivery {
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl RecordingDelivery {
        async fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl ResponseDelivery for RecordingDelivery {
        async fn create_followup(
            &self,
            _token: &str,
            response: &InteractionResponse,
        ) -> Result<Value, DeliveryError> {
            self.calls.lock().await.push(("create".to_owned(), response.body.content.clone()));
            Ok(Value::Null)
        }

        async fn edit_original(
            &self,
            _token: &str,
            response: &InteractionResponse,
        ) -> Result<Value, DeliveryError> {
            self.calls.lock().await.push(("edit".to_owned(), response.body.content.clone()));
            Ok(Value::Null)
        }
    }

    struct Fixture {
        engine: Engine,
        registry: Registry,
        service: Arc<InMemoryBackupService>,
        delivery: Arc<RecordingDelivery>,
    }

    fn fixture() -> Fixture {
        let service = Arc::new(InMemoryBackupService::new());
        let delivery = Arc::new(RecordingDelivery::default());
        let mut registry = Registry::new();
        register(&mut registry, service.clone()).expect("module registers");

        let engine = Engine::new(
            delivery.clone(),
            Arc::new(CorrelationStore::new(Duration::from_secs(300))),
            Arc::new(InMemoryReportSink::new()),
            Duration::from_millis(2_500),
        );

        Fixture { engine, registry, service, delivery }
    }

    fn author() -> Author {
        Author { id: "42".to_owned(), username: "muffin".to_owned(), is_member: true }
    }

    fn sub_command_interaction(name: &str, options: Vec<CommandOption>) -> Interaction {
        Interaction {
            id: "1".to_owned(),
            kind: InteractionKind::Command,
            application_id: None,
            guild_id: Some("100".to_owned()),
            channel_id: Some("200".to_owned()),
            token: "tok".to_owned(),
            author: Some(author()),
            message_id: None,
            data: InteractionData::Command(CommandData {
                id: "777".to_owned(),
                name: "backup".to_owned(),
                options: vec![CommandOption {
                    name: name.to_owned(),
                    kind: OptionType::SubCommand,
                    value: None,
                    options,
                    focused: false,
                }],
            }),
        }
    }

    fn component_interaction(custom_id: &str) -> Interaction {
        Interaction {
            id: "2".to_owned(),
            kind: InteractionKind::Component,
            application_id: None,
            guild_id: Some("100".to_owned()),
            channel_id: Some("200".to_owned()),
            token: "tok".to_owned(),
            author: Some(author()),
            message_id: Some("555".to_owned()),
            data: InteractionData::Component(ComponentData {
                custom_id: custom_id.to_owned(),
                component_type: 2,
                values: Vec::new(),
            }),
        }
    }

    fn string_option(name: &str, value: &str) -> CommandOption {
        CommandOption {
            name: name.to_owned(),
            kind: OptionType::String,
            value: Some(OptionValue::String(value.to_owned())),
            options: Vec::new(),
            focused: false,
        }
    }

    fn seeded(fixture: &Fixture, id: &str) {
        fixture.service.seed(
            "42",
            BackupSummary {
                id: id.to_owned(),
                guild_name: "muffin's guild".to_owned(),
                created_at: Utc::now(),
            },
        );
    }

    fn first_custom_id(response: &InteractionResponse) -> String {
        let wire = response.to_wire();
        wire["data"]["components"][0]["components"][0]["custom_id"]
            .as_str()
            .expect("button custom id")
            .to_owned()
    }

    #[tokio::test(start_paused = true)]
    async fn create_defers_then_reports_the_new_backup_id() {
        let fixture = fixture();

        let ack = fixture
            .engine
            .dispatch(&fixture.registry, sub_command_interaction("create", vec![]))
            .await
            .expect("ack expected");
        assert_eq!(ack.kind, ResponseKind::DeferredChannelMessage);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let calls = fixture.delivery.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "edit");
        assert!(calls[0].1.as_deref().expect("content").contains("created a backup"));
    }

    #[tokio::test(start_paused = true)]
    async fn load_confirmation_round_trips_through_the_correlation_store() {
        let fixture = fixture();
        seeded(&fixture, "ABC123");

        let prompt = fixture
            .engine
            .dispatch(
                &fixture.registry,
                sub_command_interaction("load", vec![string_option("backup_id", "ABC123")]),
            )
            .await
            .expect("confirmation prompt expected");
        assert!(prompt.is_ephemeral());

        let confirm_id = first_custom_id(&prompt);
        assert!(confirm_id.starts_with("backup_load_confirm?"));

        let ack = fixture
            .engine
            .dispatch(&fixture.registry, component_interaction(&confirm_id))
            .await
            .expect("component ack expected");
        assert_eq!(ack.kind, ResponseKind::DeferredUpdateMessage);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let loads = fixture.service.recorded_loads();
        assert_eq!(loads, vec![("100".to_owned(), "ABC123".to_owned(), 250)]);

        let calls = fixture.delivery.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.as_deref().expect("content").contains("restored this server"));
    }

    #[tokio::test(start_paused = true)]
    async fn confirming_twice_reports_an_expired_confirmation() {
        let fixture = fixture();
        seeded(&fixture, "ABC123");

        let prompt = fixture
            .engine
            .dispatch(
                &fixture.registry,
                sub_command_interaction("load", vec![string_option("backup_id", "ABC123")]),
            )
            .await
            .expect("prompt expected");
        let confirm_id = first_custom_id(&prompt);

        fixture
            .engine
            .dispatch(&fixture.registry, component_interaction(&confirm_id))
            .await
            .expect("first confirm");
        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = fixture
            .engine
            .dispatch(&fixture.registry, component_interaction(&confirm_id))
            .await
            .expect("second confirm");
        assert!(second.body.content.expect("content").contains("expired"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_confirm_carries_the_backup_id_in_the_custom_id() {
        let fixture = fixture();
        seeded(&fixture, "ABC123");

        let prompt = fixture
            .engine
            .dispatch(
                &fixture.registry,
                sub_command_interaction("delete", vec![string_option("backup_id", "ABC123")]),
            )
            .await
            .expect("prompt expected");

        let confirm_id = first_custom_id(&prompt);
        assert_eq!(confirm_id, "backup_delete_confirm?ABC123");

        let response = fixture
            .engine
            .dispatch(&fixture.registry, component_interaction(&confirm_id))
            .await
            .expect("deletion response expected");
        assert!(response.body.content.expect("content").contains("deleted the backup"));
        assert!(fixture.service.list_backups("42").await.expect("list").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pops_the_pending_state() {
        let fixture = fixture();
        seeded(&fixture, "ABC123");

        let prompt = fixture
            .engine
            .dispatch(
                &fixture.registry,
                sub_command_interaction("load", vec![string_option("backup_id", "ABC123")]),
            )
            .await
            .expect("prompt expected");

        let wire = prompt.to_wire();
        let cancel_id = wire["data"]["components"][0]["components"][1]["custom_id"]
            .as_str()
            .expect("cancel custom id")
            .to_owned();
        assert!(cancel_id.starts_with("backup_load_cancel?"));

        let response = fixture
            .engine
            .dispatch(&fixture.registry, component_interaction(&cancel_id))
            .await
            .expect("cancel response expected");
        assert!(response.body.content.expect("content").contains("cancelled"));
        assert!(fixture.engine.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn autocomplete_suggests_matching_backup_ids() {
        let fixture = fixture();
        seeded(&fixture, "ABC123");
        seeded(&fixture, "XYZ789");

        let mut interaction = sub_command_interaction(
            "load",
            vec![CommandOption {
                name: "backup_id".to_owned(),
                kind: OptionType::String,
                value: Some(OptionValue::String("AB".to_owned())),
                options: Vec::new(),
                focused: true,
            }],
        );
        interaction.kind = InteractionKind::Autocomplete;

        let response = fixture
            .engine
            .dispatch(&fixture.registry, interaction)
            .await
            .expect("autocomplete response expected");

        let choices = response.body.choices.expect("choices");
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].value, "ABC123");
    }

    #[tokio::test(start_paused = true)]
    async fn dm_invocations_are_rejected_by_the_guild_check() {
        let fixture = fixture();
        let mut interaction = sub_command_interaction("create", vec![]);
        interaction.guild_id = None;

        let response = fixture
            .engine
            .dispatch(&fixture.registry, interaction)
            .await
            .expect("rejection expected");
        assert!(response.body.content.expect("content").contains("inside a server"));
    }

    #[tokio::test(start_paused = true)]
    async fn list_renders_an_embed_with_one_field_per_backup() {
        let fixture = fixture();
        seeded(&fixture, "ABC123");
        seeded(&fixture, "XYZ789");

        let response = fixture
            .engine
            .dispatch(&fixture.registry, sub_command_interaction("list", vec![]))
            .await
            .expect("list expected");

        let wire = response.to_wire();
        let fields = wire["data"]["embeds"][0]["fields"].as_array().expect("fields");
        assert_eq!(fields.len(), 2);
        assert_eq!(wire["data"]["embeds"][0]["footer"]["text"], "2 backup(s)");
    }
}
