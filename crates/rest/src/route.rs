use reqwest::Method;

/// One outbound REST call target: HTTP method, path below the API base, and
/// the normalized key used for rate limit accounting.
///
/// Webhook routes share one bucket per interaction token; everything else
/// is grouped by `{channel}:{guild}:{path template}` so that calls which
/// only differ in a message id land in the same bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    bucket: String,
}

impl Route {
    fn new(method: Method, path: String, bucket: String) -> Self {
        Self { method, path, bucket }
    }

    /// Escape hatch for calls without a dedicated constructor. The caller
    /// supplies the already-formatted path and the path template used as
    /// the bucket discriminator.
    pub fn raw(
        method: Method,
        path: impl Into<String>,
        template: &str,
        channel_id: Option<&str>,
        guild_id: Option<&str>,
    ) -> Self {
        let bucket = format!(
            "{}:{}:{template}",
            channel_id.unwrap_or_default(),
            guild_id.unwrap_or_default()
        );
        Self::new(method, path.into(), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn create_followup_message(application_id: &str, token: &str) -> Self {
        Self::new(
            Method::POST,
            format!("/webhooks/{application_id}/{token}"),
            webhook_bucket(token),
        )
    }

    pub fn edit_original_response(application_id: &str, token: &str) -> Self {
        Self::edit_followup_message(application_id, token, "@original")
    }

    pub fn edit_followup_message(application_id: &str, token: &str, message_id: &str) -> Self {
        Self::new(
            Method::PATCH,
            format!("/webhooks/{application_id}/{token}/messages/{message_id}"),
            webhook_bucket(token),
        )
    }

    pub fn delete_original_response(application_id: &str, token: &str) -> Self {
        Self::new(
            Method::DELETE,
            format!("/webhooks/{application_id}/{token}/messages/@original"),
            webhook_bucket(token),
        )
    }

    /// The platform has no GET for the original response; a bodyless PATCH
    /// returns the current message.
    pub fn fetch_original_response(application_id: &str, token: &str) -> Self {
        Self::edit_original_response(application_id, token)
    }

    pub fn get_global_commands(application_id: &str) -> Self {
        Self::new(
            Method::GET,
            format!("/applications/{application_id}/commands"),
            application_bucket(application_id, "commands"),
        )
    }

    pub fn replace_global_commands(application_id: &str) -> Self {
        Self::new(
            Method::PUT,
            format!("/applications/{application_id}/commands"),
            application_bucket(application_id, "commands"),
        )
    }

    pub fn get_guild_commands(application_id: &str, guild_id: &str) -> Self {
        Self::new(
            Method::GET,
            format!("/applications/{application_id}/guilds/{guild_id}/commands"),
            guild_commands_bucket(application_id, guild_id),
        )
    }

    pub fn replace_guild_commands(application_id: &str, guild_id: &str) -> Self {
        Self::new(
            Method::PUT,
            format!("/applications/{application_id}/guilds/{guild_id}/commands"),
            guild_commands_bucket(application_id, guild_id),
        )
    }

    pub fn delete_guild_command(application_id: &str, guild_id: &str, command_id: &str) -> Self {
        Self::new(
            Method::DELETE,
            format!("/applications/{application_id}/guilds/{guild_id}/commands/{command_id}"),
            guild_commands_bucket(application_id, guild_id),
        )
    }
}

fn webhook_bucket(token: &str) -> String {
    format!("webhook:{token}")
}

fn application_bucket(application_id: &str, suffix: &str) -> String {
    format!("::applications/{application_id}/{suffix}")
}

fn guild_commands_bucket(application_id: &str, guild_id: &str) -> String {
    format!(":{guild_id}:applications/{application_id}/guilds/commands")
}

#[cfg(test)]
mod tests {
    use super::Route;
    use reqwest::Method;

    #[test]
    fn webhook_routes_share_a_bucket_per_token() {
        let create = Route::create_followup_message("app", "tok-1");
        let edit = Route::edit_original_response("app", "tok-1");
        let other = Route::create_followup_message("app", "tok-2");

        assert_eq!(create.bucket(), edit.bucket());
        assert_ne!(create.bucket(), other.bucket());
    }

    #[test]
    fn edit_original_targets_the_original_sentinel() {
        let route = Route::edit_original_response("app", "tok");
        assert_eq!(route.method, Method::PATCH);
        assert_eq!(route.path, "/webhooks/app/tok/messages/@original");
    }

    #[test]
    fn guild_command_routes_differ_only_by_guild() {
        let one = Route::replace_guild_commands("app", "guild-1");
        let two = Route::replace_guild_commands("app", "guild-2");
        assert_ne!(one.bucket(), two.bucket());

        let replace = Route::replace_guild_commands("app", "guild-1");
        let delete = Route::delete_guild_command("app", "guild-1", "cmd");
        assert_eq!(replace.bucket(), delete.bucket());
    }

    #[test]
    fn raw_routes_bucket_by_channel_guild_and_template() {
        let one = Route::raw(
            Method::GET,
            "/channels/123/messages",
            "channels/{channel_id}/messages",
            Some("123"),
            None,
        );
        let two = Route::raw(
            Method::GET,
            "/channels/456/messages",
            "channels/{channel_id}/messages",
            Some("456"),
            None,
        );
        assert_ne!(one.bucket(), two.bucket());
    }
}
