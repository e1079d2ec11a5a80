use clap::{Parser, Subcommand};
use indoc::indoc;

const ENV_HELP: &str = indoc! {"
    Environment:
      BOT_TOKEN                        Telegram bot token (or TELOXIDE_TOKEN)
      ADMIN_IDS                        super-admin ids, separated by commas or whitespace
      DATABASE_PATH                    SQLite file (default: roadpass.sqlite)
      LOG_FILE_PATH                    log file (default: roadpass.log)
      PAYMENT_AMOUNT                   initial payment amount (default: 14.09)
      PAYMENT_CARD_DETAILS             card numbers shown in payment instructions
      PAYMENT_CARD_OWNER               card owner shown in payment instructions
      CONVERSATION_IDLE_TIMEOUT_SECS   reset abandoned flows after this long (0 disables)
      BOT_API_URL                      custom Bot API server
"};

#[derive(Parser)]
#[command(name = "roadpass")]
#[command(author, version, about = "Telegram bot for driving-exam preparation with manual payment approval", long_about = None)]
#[command(after_help = ENV_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Renumber every catalog partition to 1..N and exit
    Reindex,

    /// Give a user admin rights and exit
    GrantAdmin {
        /// Telegram user id
        user_id: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
