use std::sync::Arc;

use parley_core::interaction::Interaction;
use parley_core::response::InteractionResponse;

/// One pre-handler gate. Returning `Some` rejects the invocation and the
/// returned response becomes the direct reply; the handler never runs.
/// Checks are evaluated in registration order, first failure wins.
pub trait Predicate: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, interaction: &Interaction) -> Option<InteractionResponse>;
}

pub struct GuildOnly;

impl Predicate for GuildOnly {
    fn name(&self) -> &'static str {
        "guild_only"
    }

    fn check(&self, interaction: &Interaction) -> Option<InteractionResponse> {
        if interaction.guild_id.is_none() {
            return Some(
                InteractionResponse::message(
                    "This command can **only** be used **inside a server**.",
                )
                .ephemeral(),
            );
        }

        None
    }
}

pub struct DmOnly;

impl Predicate for DmOnly {
    fn name(&self) -> &'static str {
        "dm_only"
    }

    fn check(&self, interaction: &Interaction) -> Option<InteractionResponse> {
        if interaction.guild_id.is_some() {
            return Some(
                InteractionResponse::message(
                    "This command can **only** be used inside **direct messages**.",
                )
                .ephemeral(),
            );
        }

        None
    }
}

pub fn guild_only() -> Arc<dyn Predicate> {
    Arc::new(GuildOnly)
}

pub fn dm_only() -> Arc<dyn Predicate> {
    Arc::new(DmOnly)
}

#[cfg(test)]
mod tests {
    use parley_core::interaction::{
        Author, Interaction, InteractionData, InteractionKind,
    };

    use super::{DmOnly, GuildOnly, Predicate};

    fn interaction(guild_id: Option<&str>) -> Interaction {
        Interaction {
            id: "1".to_owned(),
            kind: InteractionKind::Command,
            application_id: None,
            guild_id: guild_id.map(str::to_owned),
            channel_id: Some("200".to_owned()),
            token: "t".to_owned(),
            author: Some(Author {
                id: "42".to_owned(),
                username: "muffin".to_owned(),
                is_member: guild_id.is_some(),
            }),
            message_id: None,
            data: InteractionData::Ping,
        }
    }

    #[test]
    fn guild_only_rejects_direct_messages() {
        let rejection = GuildOnly.check(&interaction(None)).expect("should reject");
        assert!(rejection.is_ephemeral());
        assert!(GuildOnly.check(&interaction(Some("100"))).is_none());
    }

    #[test]
    fn dm_only_rejects_guild_invocations() {
        assert!(DmOnly.check(&interaction(Some("100"))).is_some());
        assert!(DmOnly.check(&interaction(None)).is_none());
    }
}
