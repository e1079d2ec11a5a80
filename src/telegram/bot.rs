//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command list registration for the Telegram UI

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::conversation::event::{parse_user_id, AdminCommand, Decision, Event};
use crate::core::config;

/// Bot commands. Admin commands take their target user id as the argument.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "open the main menu")]
    Start,
    #[command(description = "abort the current action")]
    Cancel,
    #[command(description = "skip an optional step")]
    Skip,
    #[command(description = "admin panel")]
    Admin,
    #[command(description = "grant admin rights")]
    Setadmin(String),
    #[command(description = "change the payment amount")]
    Setpaymentamount(String),
    #[command(description = "approve a pending payment")]
    Allow(String),
    #[command(description = "reject a pending payment")]
    Disallow(String),
    #[command(description = "revoke access")]
    Revoke(String),
    #[command(description = "usage statistics")]
    Stats,
    #[command(rename = "reload_config", description = "re-read payment details")]
    ReloadConfig,
}

impl Command {
    /// The conversation event this command stands for.
    pub fn into_event(self) -> Event {
        match self {
            Command::Start => Event::Start,
            Command::Cancel => Event::Cancel,
            Command::Skip => Event::Skip,
            Command::Admin => Event::AdminMenu,
            Command::Setadmin(arg) => Event::Command(AdminCommand::SetAdmin(parse_user_id(&arg))),
            Command::Setpaymentamount(arg) => {
                let arg = arg.trim();
                Event::SetPaymentAmount((!arg.is_empty()).then(|| arg.to_string()))
            }
            Command::Allow(arg) => Event::Command(AdminCommand::Decide(parse_user_id(&arg), Decision::Allow)),
            Command::Disallow(arg) => Event::Command(AdminCommand::Decide(parse_user_id(&arg), Decision::Disallow)),
            Command::Revoke(arg) => Event::Command(AdminCommand::Revoke(parse_user_id(&arg))),
            Command::Stats => Event::Command(AdminCommand::Stats),
            Command::ReloadConfig => Event::Command(AdminCommand::ReloadConfig),
        }
    }
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (missing token, invalid URL, HTTP client setup)
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Check if local Bot API server is configured
    match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Sets up the user-facing commands in the Telegram UI. Admin commands stay
/// unlisted.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "open the main menu"),
        BotCommand::new("cancel", "abort the current action"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Command {
        Command::parse(text, "roadpass_bot").unwrap()
    }

    #[test]
    fn test_command_descriptions() {
        let command_list = Command::descriptions().to_string();
        assert!(command_list.contains("/start"));
        assert!(command_list.contains("/reload_config"));
    }

    #[test]
    fn test_decide_commands_carry_target() {
        assert_eq!(
            parse("/allow 42").into_event(),
            Event::Command(AdminCommand::Decide(Some(42), Decision::Allow))
        );
        assert_eq!(
            parse("/disallow abc").into_event(),
            Event::Command(AdminCommand::Decide(None, Decision::Disallow))
        );
    }

    #[test]
    fn test_amount_argument_is_optional() {
        assert_eq!(parse("/setpaymentamount").into_event(), Event::SetPaymentAmount(None));
        assert_eq!(
            parse("/setpaymentamount 15,50").into_event(),
            Event::SetPaymentAmount(Some("15,50".into()))
        );
    }

    #[test]
    fn test_reload_config_keeps_underscore() {
        assert_eq!(parse("/reload_config"), Command::ReloadConfig);
    }
}
