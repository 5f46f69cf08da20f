use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("interaction payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown interaction type `{0}`")]
    UnknownKind(u8),
    #[error("unknown command option type `{0}`")]
    UnknownOptionType(u8),
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
}

/// One inbound webhook call. Constructed once per request, immutable, and
/// discarded when the response cycle for it ends.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
    pub id: String,
    pub kind: InteractionKind,
    pub application_id: Option<String>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub token: String,
    pub author: Option<Author>,
    pub message_id: Option<String>,
    pub data: InteractionData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Ping,
    Command,
    Component,
    Autocomplete,
    ModalSubmit,
}

impl InteractionKind {
    pub fn from_wire(value: u8) -> Result<Self, PayloadError> {
        match value {
            1 => Ok(Self::Ping),
            2 => Ok(Self::Command),
            3 => Ok(Self::Component),
            4 => Ok(Self::Autocomplete),
            5 => Ok(Self::ModalSubmit),
            other => Err(PayloadError::UnknownKind(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Author {
    pub id: String,
    pub username: String,
    /// True when the interaction arrived from inside a guild (the payload
    /// carried `member` rather than a bare `user`).
    pub is_member: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InteractionData {
    Ping,
    Command(CommandData),
    Component(ComponentData),
    Modal(ModalData),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CommandData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// Options arrive as a recursive tree: sub-command groups and sub-commands
/// nest further options. The router flattens this during resolution; the
/// parser keeps the tree as sent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(default)]
    pub value: Option<OptionValue>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub focused: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionType {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
}

impl OptionType {
    pub fn from_wire(value: u8) -> Result<Self, PayloadError> {
        match value {
            1 => Ok(Self::SubCommand),
            2 => Ok(Self::SubCommandGroup),
            3 => Ok(Self::String),
            4 => Ok(Self::Integer),
            5 => Ok(Self::Boolean),
            6 => Ok(Self::User),
            7 => Ok(Self::Channel),
            8 => Ok(Self::Role),
            other => Err(PayloadError::UnknownOptionType(other)),
        }
    }

    pub fn wire_code(self) -> u8 {
        match self {
            Self::SubCommand => 1,
            Self::SubCommandGroup => 2,
            Self::String => 3,
            Self::Integer => 4,
            Self::Boolean => 5,
            Self::User => 6,
            Self::Channel => 7,
            Self::Role => 8,
        }
    }
}

impl<'de> Deserialize<'de> for OptionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_wire(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ComponentData {
    pub custom_id: String,
    pub component_type: u8,
    /// Chosen values for select menus; empty for buttons.
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModalData {
    pub custom_id: String,
    pub fields: Vec<ModalField>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModalField {
    pub custom_id: String,
    pub value: String,
}

impl Interaction {
    pub fn from_slice(raw: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawInteraction = serde_json::from_slice(raw)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawInteraction) -> Result<Self, PayloadError> {
        let kind = InteractionKind::from_wire(raw.kind)?;

        let author = match (&raw.member, &raw.user) {
            (Some(member), _) => Some(Author {
                id: member.user.id.clone(),
                username: member.user.username.clone(),
                is_member: true,
            }),
            (None, Some(user)) => {
                Some(Author { id: user.id.clone(), username: user.username.clone(), is_member: false })
            }
            (None, None) => None,
        };

        if kind != InteractionKind::Ping && author.is_none() {
            return Err(PayloadError::MissingField("member or user"));
        }

        let data = match kind {
            InteractionKind::Ping => InteractionData::Ping,
            InteractionKind::Command | InteractionKind::Autocomplete => {
                let data = raw.data.ok_or(PayloadError::MissingField("data"))?;
                InteractionData::Command(serde_json::from_value(data)?)
            }
            InteractionKind::Component => {
                let data = raw.data.ok_or(PayloadError::MissingField("data"))?;
                InteractionData::Component(serde_json::from_value(data)?)
            }
            InteractionKind::ModalSubmit => {
                let data = raw.data.ok_or(PayloadError::MissingField("data"))?;
                let data: RawModalData = serde_json::from_value(data)?;
                InteractionData::Modal(ModalData {
                    custom_id: data.custom_id,
                    fields: flatten_modal_fields(data.components),
                })
            }
        };

        Ok(Self {
            id: raw.id,
            kind,
            application_id: raw.application_id,
            guild_id: raw.guild_id,
            channel_id: raw.channel_id,
            token: raw.token.unwrap_or_default(),
            author,
            message_id: raw.message.map(|message| message.id),
            data,
        })
    }

    pub fn command_data(&self) -> Option<&CommandData> {
        match &self.data {
            InteractionData::Command(data) => Some(data),
            _ => None,
        }
    }

    pub fn component_data(&self) -> Option<&ComponentData> {
        match &self.data {
            InteractionData::Component(data) => Some(data),
            _ => None,
        }
    }

    pub fn modal_data(&self) -> Option<&ModalData> {
        match &self.data {
            InteractionData::Modal(data) => Some(data),
            _ => None,
        }
    }
}

/// Modal submissions nest text inputs inside action rows; handlers only
/// care about the flat `custom_id -> value` pairs.
fn flatten_modal_fields(rows: Vec<RawModalRow>) -> Vec<ModalField> {
    let mut fields = Vec::new();
    for row in rows {
        for component in row.components {
            if let Some(value) = component.value {
                fields.push(ModalField { custom_id: component.custom_id, value });
            }
        }
    }
    fields
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    application_id: Option<String>,
    guild_id: Option<String>,
    channel_id: Option<String>,
    token: Option<String>,
    member: Option<RawMember>,
    user: Option<RawUser>,
    message: Option<RawMessage>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawModalData {
    custom_id: String,
    #[serde(default)]
    components: Vec<RawModalRow>,
}

#[derive(Debug, Deserialize)]
struct RawModalRow {
    #[serde(default)]
    components: Vec<RawModalField>,
}

#[derive(Debug, Deserialize)]
struct RawModalField {
    custom_id: String,
    #[serde(default)]
    value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Interaction, InteractionData, InteractionKind, OptionType, OptionValue, PayloadError};

    fn command_payload() -> Vec<u8> {
        serde_json::json!({
            "id": "9001",
            "type": 2,
            "guild_id": "100",
            "channel_id": "200",
            "token": "interaction-token",
            "member": {"user": {"id": "42", "username": "muffin"}},
            "data": {
                "id": "777",
                "name": "backup",
                "options": [{
                    "type": 1,
                    "name": "load",
                    "options": [{"type": 3, "name": "backup_id", "value": "ABC123"}]
                }]
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn parses_nested_command_payload() {
        let interaction =
            Interaction::from_slice(&command_payload()).expect("payload should parse");

        assert_eq!(interaction.kind, InteractionKind::Command);
        assert_eq!(interaction.guild_id.as_deref(), Some("100"));
        assert_eq!(interaction.token, "interaction-token");
        let author = interaction.author.as_ref().expect("author");
        assert_eq!(author.id, "42");
        assert!(author.is_member);

        let data = interaction.command_data().expect("command data");
        assert_eq!(data.name, "backup");
        assert_eq!(data.options.len(), 1);
        assert_eq!(data.options[0].kind, OptionType::SubCommand);
        assert_eq!(data.options[0].options[0].name, "backup_id");
        assert_eq!(
            data.options[0].options[0].value,
            Some(OptionValue::String("ABC123".to_owned()))
        );
    }

    #[test]
    fn parses_ping_without_author() {
        let payload = serde_json::json!({"id": "1", "type": 1, "token": "t"}).to_string();
        let interaction = Interaction::from_slice(payload.as_bytes()).expect("ping should parse");

        assert_eq!(interaction.kind, InteractionKind::Ping);
        assert_eq!(interaction.data, InteractionData::Ping);
        assert!(interaction.author.is_none());
    }

    #[test]
    fn parses_component_click_with_message_reference() {
        let payload = serde_json::json!({
            "id": "2",
            "type": 3,
            "channel_id": "200",
            "token": "t",
            "user": {"id": "42", "username": "muffin"},
            "message": {"id": "555"},
            "data": {"custom_id": "backup_delete_confirm?ABC123", "component_type": 2}
        })
        .to_string();

        let interaction =
            Interaction::from_slice(payload.as_bytes()).expect("component should parse");
        assert_eq!(interaction.message_id.as_deref(), Some("555"));
        let data = interaction.component_data().expect("component data");
        assert_eq!(data.custom_id, "backup_delete_confirm?ABC123");
    }

    #[test]
    fn flattens_modal_rows_into_fields() {
        let payload = serde_json::json!({
            "id": "3",
            "type": 5,
            "token": "t",
            "user": {"id": "42", "username": "muffin"},
            "data": {
                "custom_id": "backup_restore_options",
                "components": [
                    {"components": [{"custom_id": "message_count", "value": "250", "type": 4}]},
                    {"components": [{"custom_id": "note", "value": "before the raid", "type": 4}]}
                ]
            }
        })
        .to_string();

        let interaction = Interaction::from_slice(payload.as_bytes()).expect("modal should parse");
        let data = interaction.modal_data().expect("modal data");
        assert_eq!(data.fields.len(), 2);
        assert_eq!(data.fields[0].custom_id, "message_count");
        assert_eq!(data.fields[1].value, "before the raid");
    }

    #[test]
    fn rejects_unknown_interaction_type() {
        let payload = serde_json::json!({"id": "4", "type": 99, "token": "t"}).to_string();
        let result = Interaction::from_slice(payload.as_bytes());
        assert!(matches!(result, Err(PayloadError::UnknownKind(99))));
    }

    #[test]
    fn rejects_non_json_bytes() {
        assert!(matches!(Interaction::from_slice(b"not json"), Err(PayloadError::Json(_))));
    }

    #[test]
    fn rejects_command_without_author() {
        let payload = serde_json::json!({
            "id": "5",
            "type": 2,
            "token": "t",
            "data": {"id": "777", "name": "backup"}
        })
        .to_string();

        let result = Interaction::from_slice(payload.as_bytes());
        assert!(matches!(result, Err(PayloadError::MissingField(_))));
    }
}
