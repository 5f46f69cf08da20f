use std::collections::HashMap;
use std::sync::Arc;

use parley_core::custom_id::CustomId;
use parley_core::interaction::{
    CommandOption, Interaction, InteractionData, InteractionKind, OptionType,
};
use parley_core::response::Choice;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::checks::Predicate;
use crate::handler::{Args, CommandArg, InteractionHandler};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a command named `{0}` is already registered")]
    DuplicateCommand(String),
    #[error("command `{command}` declares `{name}` twice")]
    DuplicateEntry { command: String, name: String },
    #[error("a component named `{0}` is already registered")]
    DuplicateComponent(String),
    #[error("a modal named `{0}` is already registered")]
    DuplicateModal(String),
    #[error("`{0}` is not invocable and has no sub-commands")]
    MissingHandler(String),
}

/// A typed option declaration attached to an invocable leaf. Declarative by
/// design: the schema sent to the platform is exactly what is written here.
#[derive(Clone)]
pub struct OptionSpec {
    pub kind: OptionType,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub choices: Vec<Choice>,
    pub autocomplete: bool,
}

impl OptionSpec {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: true,
            choices: Vec::new(),
            autocomplete: false,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::String, name, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Integer, name, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Boolean, name, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self
    }

    fn to_payload(&self) -> Value {
        json!({
            "type": self.kind.wire_code(),
            "name": self.name,
            "description": self.description,
            "required": self.required,
            "choices": self.choices.iter()
                .map(|choice| json!({"name": choice.name, "value": choice.value}))
                .collect::<Vec<_>>(),
            "autocomplete": self.autocomplete,
        })
    }
}

pub struct SubCommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<OptionSpec>,
    pub checks: Vec<Arc<dyn Predicate>>,
    pub handler: Arc<dyn InteractionHandler>,
}

impl SubCommandSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn InteractionHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            checks: Vec::new(),
            handler,
        }
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn check(mut self, check: Arc<dyn Predicate>) -> Self {
        self.checks.push(check);
        self
    }

    fn to_payload(&self) -> Value {
        json!({
            "type": OptionType::SubCommand.wire_code(),
            "name": self.name,
            "description": self.description,
            "options": self.options.iter().map(OptionSpec::to_payload).collect::<Vec<_>>(),
        })
    }
}

pub struct SubCommandGroupSpec {
    pub name: String,
    pub description: String,
    pub sub_commands: Vec<SubCommandSpec>,
}

impl SubCommandGroupSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), sub_commands: Vec::new() }
    }

    pub fn sub_command(mut self, sub_command: SubCommandSpec) -> Self {
        self.sub_commands.push(sub_command);
        self
    }

    fn to_payload(&self) -> Value {
        json!({
            "type": OptionType::SubCommandGroup.wire_code(),
            "name": self.name,
            "description": self.description,
            "options": self.sub_commands.iter().map(SubCommandSpec::to_payload).collect::<Vec<_>>(),
        })
    }
}

pub enum CommandEntry {
    Sub(SubCommandSpec),
    Group(SubCommandGroupSpec),
}

impl CommandEntry {
    fn name(&self) -> &str {
        match self {
            Self::Sub(sub) => &sub.name,
            Self::Group(group) => &group.name,
        }
    }
}

/// A top-level command. Either a leaf with its own handler, or a parent
/// whose entries (sub-commands and sub-command groups) hold the handlers;
/// only leaves are invocable.
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<OptionSpec>,
    pub entries: Vec<CommandEntry>,
    pub checks: Vec<Arc<dyn Predicate>>,
    pub handler: Option<Arc<dyn InteractionHandler>>,
}

impl CommandSpec {
    /// An invocable top-level command without sub-commands.
    pub fn leaf(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn InteractionHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            entries: Vec::new(),
            checks: Vec::new(),
            handler: Some(handler),
        }
    }

    /// A parent command; attach sub-commands or groups before registering.
    pub fn parent(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            entries: Vec::new(),
            checks: Vec::new(),
            handler: None,
        }
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn check(mut self, check: Arc<dyn Predicate>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn sub_command(mut self, sub_command: SubCommandSpec) -> Self {
        self.entries.push(CommandEntry::Sub(sub_command));
        self
    }

    pub fn group(mut self, group: SubCommandGroupSpec) -> Self {
        self.entries.push(CommandEntry::Group(group));
        self
    }

    fn to_payload(&self) -> Value {
        let mut options: Vec<Value> = self.options.iter().map(OptionSpec::to_payload).collect();
        for entry in &self.entries {
            options.push(match entry {
                CommandEntry::Sub(sub) => sub.to_payload(),
                CommandEntry::Group(group) => group.to_payload(),
            });
        }

        json!({
            "type": 1,
            "name": self.name,
            "description": self.description,
            "options": options,
        })
    }
}

pub struct ComponentSpec {
    pub name: String,
    pub checks: Vec<Arc<dyn Predicate>>,
    pub handler: Arc<dyn InteractionHandler>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, handler: Arc<dyn InteractionHandler>) -> Self {
        Self { name: name.into(), checks: Vec::new(), handler }
    }

    pub fn check(mut self, check: Arc<dyn Predicate>) -> Self {
        self.checks.push(check);
        self
    }
}

pub struct ModalSpec {
    pub name: String,
    pub checks: Vec<Arc<dyn Predicate>>,
    pub handler: Arc<dyn InteractionHandler>,
}

impl ModalSpec {
    pub fn new(name: impl Into<String>, handler: Arc<dyn InteractionHandler>) -> Self {
        Self { name: name.into(), checks: Vec::new(), handler }
    }
}

/// The option the client is currently typing into, for autocomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusedOption {
    pub name: String,
    pub value: String,
}

/// A routed invocation: the unique handler plus its resolved arguments.
pub struct Resolution {
    pub handler: Arc<dyn InteractionHandler>,
    pub checks: Vec<Arc<dyn Predicate>>,
    /// Human-readable routing key for logs: `backup load`,
    /// `backup_delete_confirm`, ...
    pub routing_key: String,
    pub args: Args,
    pub focused: Option<FocusedOption>,
}

/// The in-memory handler tree. Populated at process start, immutable and
/// shared behind an `Arc` afterwards.
#[derive(Default)]
pub struct Registry {
    commands: Vec<CommandSpec>,
    components: HashMap<String, ComponentSpec>,
    modals: HashMap<String, ModalSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&mut self, command: CommandSpec) -> Result<(), RegistryError> {
        if self.commands.iter().any(|existing| existing.name == command.name) {
            return Err(RegistryError::DuplicateCommand(command.name));
        }

        if command.entries.is_empty() && command.handler.is_none() {
            return Err(RegistryError::MissingHandler(command.name));
        }

        let mut seen = Vec::new();
        for entry in &command.entries {
            if seen.contains(&entry.name()) {
                return Err(RegistryError::DuplicateEntry {
                    command: command.name.clone(),
                    name: entry.name().to_owned(),
                });
            }
            seen.push(entry.name());

            if let CommandEntry::Group(group) = entry {
                if group.sub_commands.is_empty() {
                    return Err(RegistryError::MissingHandler(format!(
                        "{} {}",
                        command.name, group.name
                    )));
                }
            }
        }

        self.commands.push(command);
        Ok(())
    }

    pub fn register_component(&mut self, component: ComponentSpec) -> Result<(), RegistryError> {
        if self.components.contains_key(&component.name) {
            return Err(RegistryError::DuplicateComponent(component.name));
        }

        self.components.insert(component.name.clone(), component);
        Ok(())
    }

    pub fn register_modal(&mut self, modal: ModalSpec) -> Result<(), RegistryError> {
        if self.modals.contains_key(&modal.name) {
            return Err(RegistryError::DuplicateModal(modal.name));
        }

        self.modals.insert(modal.name.clone(), modal);
        Ok(())
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Routes an interaction to exactly one handler, or `None` when nothing
    /// matches. A miss is not an error: the platform may still hold a stale
    /// command registration.
    pub fn resolve(&self, interaction: &Interaction) -> Option<Resolution> {
        match (&interaction.kind, &interaction.data) {
            (InteractionKind::Command | InteractionKind::Autocomplete, InteractionData::Command(data)) => {
                let command = self.commands.iter().find(|command| command.name == data.name)?;
                let (handler, checks, routing_key, leaf_options) =
                    walk_command(command, &data.options)?;

                Some(Resolution {
                    handler,
                    checks,
                    routing_key,
                    args: Args::Command(collect_args(leaf_options)),
                    focused: find_focused(leaf_options),
                })
            }
            (InteractionKind::Component, InteractionData::Component(data)) => {
                let custom_id = match CustomId::parse(&data.custom_id) {
                    Ok(custom_id) => custom_id,
                    Err(error) => {
                        debug!(
                            custom_id = %data.custom_id,
                            error = %error,
                            "component custom id failed to decode"
                        );
                        return None;
                    }
                };

                let component = self.components.get(&custom_id.name)?;
                Some(Resolution {
                    handler: component.handler.clone(),
                    checks: component.checks.clone(),
                    routing_key: custom_id.name,
                    args: Args::Component(custom_id.args),
                    focused: None,
                })
            }
            (InteractionKind::ModalSubmit, InteractionData::Modal(data)) => {
                let modal = self.modals.get(&data.custom_id)?;
                Some(Resolution {
                    handler: modal.handler.clone(),
                    checks: modal.checks.clone(),
                    routing_key: data.custom_id.clone(),
                    args: Args::Modal(data.fields.clone()),
                    focused: None,
                })
            }
            _ => None,
        }
    }

    /// The registration payload sent to `PUT .../commands`.
    pub fn registration_payloads(&self) -> Value {
        Value::Array(self.commands.iter().map(CommandSpec::to_payload).collect())
    }
}

type Walked<'a> = (
    Arc<dyn InteractionHandler>,
    Vec<Arc<dyn Predicate>>,
    String,
    &'a [CommandOption],
);

/// Walks the client-sent option tree against the registered tree: top-level
/// name, then an optional sub-command-group, then an optional sub-command,
/// returning the deepest leaf and the options attached to it. Any name that
/// is out of sync with the registration resolves to `None`.
fn walk_command<'a>(command: &CommandSpec, options: &'a [CommandOption]) -> Option<Walked<'a>> {
    for option in options {
        match option.kind {
            OptionType::SubCommandGroup => {
                let group = command.entries.iter().find_map(|entry| match entry {
                    CommandEntry::Group(group) if group.name == option.name => Some(group),
                    _ => None,
                })?;

                let sub_option = option.options.first()?;
                let sub = group
                    .sub_commands
                    .iter()
                    .find(|sub| sub.name == sub_option.name)?;

                let mut checks = command.checks.clone();
                checks.extend(sub.checks.iter().cloned());
                return Some((
                    sub.handler.clone(),
                    checks,
                    format!("{} {} {}", command.name, group.name, sub.name),
                    &sub_option.options,
                ));
            }
            OptionType::SubCommand => {
                let sub = command.entries.iter().find_map(|entry| match entry {
                    CommandEntry::Sub(sub) if sub.name == option.name => Some(sub),
                    _ => None,
                })?;

                let mut checks = command.checks.clone();
                checks.extend(sub.checks.iter().cloned());
                return Some((
                    sub.handler.clone(),
                    checks,
                    format!("{} {}", command.name, sub.name),
                    &option.options,
                ));
            }
            _ => {}
        }
    }

    let handler = command.handler.clone()?;
    Some((handler, command.checks.clone(), command.name.clone(), options))
}

fn collect_args(options: &[CommandOption]) -> Vec<CommandArg> {
    options
        .iter()
        .filter_map(|option| {
            option.value.as_ref().map(|value| CommandArg {
                name: option.name.clone(),
                value: value.clone(),
            })
        })
        .collect()
}

fn find_focused(options: &[CommandOption]) -> Option<FocusedOption> {
    options.iter().find(|option| option.focused).map(|option| FocusedOption {
        name: option.name.clone(),
        value: option
            .value
            .as_ref()
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_owned(),
    })
}
