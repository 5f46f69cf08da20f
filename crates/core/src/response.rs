use serde::Serialize;
use serde_json::{json, Value};

/// Wire codes for the `type` field of an interaction response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Pong,
    ChannelMessage,
    DeferredChannelMessage,
    DeferredUpdateMessage,
    UpdateMessage,
    AutocompleteResult,
    Modal,
}

impl ResponseKind {
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Pong => 1,
            Self::ChannelMessage => 4,
            Self::DeferredChannelMessage => 5,
            Self::DeferredUpdateMessage => 6,
            Self::UpdateMessage => 7,
            Self::AutocompleteResult => 8,
            Self::Modal => 9,
        }
    }
}

const EPHEMERAL_FLAG: u64 = 1 << 6;

/// One outgoing response unit. Produced by a handler, consumed exactly once
/// by the execution engine.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionResponse {
    pub kind: ResponseKind,
    pub body: ResponseBody,
    pub files: Vec<FileAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Choice {
    pub name: String,
    pub value: Value,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// File attachment carried outside the JSON body; encoded as a multipart
/// part by the REST client.
#[derive(Clone, Debug, PartialEq)]
pub struct FileAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }
}

impl InteractionResponse {
    fn new(kind: ResponseKind) -> Self {
        Self { kind, body: ResponseBody::default(), files: Vec::new() }
    }

    pub fn pong() -> Self {
        Self::new(ResponseKind::Pong)
    }

    pub fn message(content: impl Into<String>) -> Self {
        let mut response = Self::new(ResponseKind::ChannelMessage);
        response.body.content = Some(content.into());
        response.body.allowed_mentions = Some(json!({"parse": ["users"]}));
        response
    }

    pub fn defer() -> Self {
        Self::new(ResponseKind::DeferredChannelMessage)
    }

    pub fn defer_update() -> Self {
        Self::new(ResponseKind::DeferredUpdateMessage)
    }

    pub fn update(content: impl Into<String>) -> Self {
        let mut response = Self::new(ResponseKind::UpdateMessage);
        response.body.content = Some(content.into());
        response.body.allowed_mentions = Some(json!({"parse": ["users"]}));
        response
    }

    pub fn autocomplete(choices: Vec<Choice>) -> Self {
        let mut response = Self::new(ResponseKind::AutocompleteResult);
        response.body.choices = Some(choices);
        response
    }

    pub fn modal(custom_id: impl Into<String>, title: impl Into<String>, inputs: Vec<TextInput>) -> Self {
        let mut response = Self::new(ResponseKind::Modal);
        response.body.custom_id = Some(custom_id.into());
        response.body.title = Some(title.into());
        response.body.components =
            inputs.into_iter().map(|input| ActionRow::new(vec![input.into()])).collect();
        response
    }

    pub fn ephemeral(mut self) -> Self {
        self.body.flags = Some(self.body.flags.unwrap_or(0) | EPHEMERAL_FLAG);
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.body.embeds.push(embed);
        self
    }

    /// Wraps a bare element in its own action row.
    pub fn component(mut self, element: impl Into<RowElement>) -> Self {
        self.body.components.push(ActionRow::new(vec![element.into()]));
        self
    }

    /// A single row holding all the given elements.
    pub fn row(mut self, elements: Vec<RowElement>) -> Self {
        self.body.components.push(ActionRow::new(elements));
        self
    }

    pub fn file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.body.flags.unwrap_or(0) & EPHEMERAL_FLAG != 0
    }

    /// The direct webhook reply form: `{"type": code, "data": {...}}`.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": self.kind.wire_code(),
            "data": serde_json::to_value(&self.body).unwrap_or_else(|_| json!({})),
        })
    }

    /// The body alone, as sent to the followup/edit REST endpoints.
    pub fn body_value(&self) -> Value {
        serde_json::to_value(&self.body).unwrap_or_else(|_| json!({}))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<RowElement>,
}

impl ActionRow {
    pub fn new(components: Vec<RowElement>) -> Self {
        Self { kind: 1, components }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowElement {
    Button(Button),
    SelectMenu(SelectMenu),
    TextInput(TextInput),
}

impl From<Button> for RowElement {
    fn from(value: Button) -> Self {
        Self::Button(value)
    }
}

impl From<SelectMenu> for RowElement {
    fn from(value: SelectMenu) -> Self {
        Self::SelectMenu(value)
    }
}

impl From<TextInput> for RowElement {
    fn from(value: TextInput) -> Self {
        Self::TextInput(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
    Link,
}

impl Serialize for ButtonStyle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let code: u8 = match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Success => 3,
            Self::Danger => 4,
            Self::Link => 5,
        };
        serializer.serialize_u8(code)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: ButtonStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Value>,
    pub disabled: bool,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style: ButtonStyle::Primary,
            label: Some(label.into()),
            custom_id: Some(custom_id.into()),
            url: None,
            emoji: None,
            disabled: false,
        }
    }

    pub fn link(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style: ButtonStyle::Link,
            label: Some(label.into()),
            custom_id: None,
            url: Some(url.into()),
            emoji: None,
            disabled: false,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }

    pub fn emoji(mut self, name: impl Into<String>) -> Self {
        self.emoji = Some(json!({"name": name.into()}));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectMenu {
    #[serde(rename = "type")]
    kind: u8,
    pub custom_id: String,
    pub options: Vec<SelectMenuOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub min_values: u8,
    pub max_values: u8,
}

impl SelectMenu {
    pub fn new(custom_id: impl Into<String>, options: Vec<SelectMenuOption>) -> Self {
        Self {
            kind: 3,
            custom_id: custom_id.into(),
            options,
            placeholder: None,
            min_values: 1,
            max_values: 1,
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn values(mut self, min: u8, max: u8) -> Self {
        self.min_values = min;
        self.max_values = max;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectMenuOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default: bool,
}

impl SelectMenuOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into(), description: None, default: false }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextInputStyle {
    Short,
    Paragraph,
}

impl Serialize for TextInputStyle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(match self {
            Self::Short => 1,
            Self::Paragraph => 2,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextInput {
    #[serde(rename = "type")]
    kind: u8,
    pub custom_id: String,
    pub label: String,
    pub style: TextInputStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    pub required: bool,
}

impl TextInput {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: 4,
            custom_id: custom_id.into(),
            label: label.into(),
            style: TextInputStyle::Short,
            placeholder: None,
            min_length: None,
            max_length: None,
            required: true,
        }
    }

    pub fn paragraph(mut self) -> Self {
        self.style = TextInputStyle::Paragraph;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::{
        Button, ButtonStyle, Choice, Embed, InteractionResponse, ResponseKind, TextInput,
    };

    #[test]
    fn message_carries_wire_code_and_restricted_mentions() {
        let wire = InteractionResponse::message("hello").to_wire();

        assert_eq!(wire["type"], 4);
        assert_eq!(wire["data"]["content"], "hello");
        assert_eq!(wire["data"]["allowed_mentions"]["parse"][0], "users");
    }

    #[test]
    fn ephemeral_sets_the_sixty_four_flag() {
        let response = InteractionResponse::message("quiet").ephemeral();
        assert!(response.is_ephemeral());
        assert_eq!(response.to_wire()["data"]["flags"], 64);
    }

    #[test]
    fn bare_button_is_wrapped_in_an_action_row() {
        let wire = InteractionResponse::message("confirm?")
            .component(Button::new("backup_delete_confirm?ABC123", "Confirm").style(ButtonStyle::Danger))
            .to_wire();

        let rows = wire["data"]["components"].as_array().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["type"], 1);
        assert_eq!(rows[0]["components"][0]["type"], 2);
        assert_eq!(rows[0]["components"][0]["custom_id"], "backup_delete_confirm?ABC123");
        assert_eq!(rows[0]["components"][0]["style"], 4);
    }

    #[test]
    fn autocomplete_serializes_choice_pairs() {
        let wire = InteractionResponse::autocomplete(vec![
            Choice::new("Friday backup", "ABC123"),
            Choice::new("Monday backup", "DEF456"),
        ])
        .to_wire();

        assert_eq!(wire["type"], 8);
        assert_eq!(wire["data"]["choices"][1]["value"], "DEF456");
    }

    #[test]
    fn modal_nests_inputs_in_rows() {
        let wire = InteractionResponse::modal(
            "backup_restore_options",
            "Restore options",
            vec![TextInput::new("message_count", "Messages per channel").optional()],
        )
        .to_wire();

        assert_eq!(wire["type"], 9);
        assert_eq!(wire["data"]["custom_id"], "backup_restore_options");
        assert_eq!(wire["data"]["components"][0]["components"][0]["type"], 4);
    }

    #[test]
    fn deferred_kinds_have_empty_bodies() {
        let wire = InteractionResponse::defer().to_wire();
        assert_eq!(wire["type"], 5);
        assert_eq!(wire["data"], serde_json::json!({}));
    }

    #[test]
    fn embeds_serialize_inline_fields() {
        let wire = InteractionResponse::message("")
            .embed(Embed::new().title("Backup").field("Id", "ABC123", true).color(0x2ecc71))
            .to_wire();

        assert_eq!(wire["data"]["embeds"][0]["fields"][0]["inline"], true);
    }

    #[test]
    fn update_uses_edit_wire_code() {
        assert_eq!(InteractionResponse::update("done").kind, ResponseKind::UpdateMessage);
        assert_eq!(InteractionResponse::update("done").to_wire()["type"], 7);
    }
}
