pub mod config;
pub mod enforcement;
pub mod feed;
pub mod gateway;
pub mod logging;
pub mod reddit;

// Customize these constants for your bot
pub const BOT_NAME: &str = "flair_warden";
pub const ENFORCEMENT_TARGET: &str = "flair_warden::enforcement";
pub const ERROR_TARGET: &str = "flair_warden::error";
pub const FEED_TARGET: &str = "flair_warden::feed";
pub const CONSOLE_TARGET: &str = "flair_warden";

pub use config::Config;
pub use enforcement::{EnforcementEngine, EnforcementError, FeedDispatcher, RunOutcome};
pub use gateway::{ItemGateway, ItemId, ItemSnapshot};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
