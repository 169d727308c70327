use std::env;
use std::sync::Arc;
use std::time::Duration;

use flair_warden::reddit::{Credentials, RedditGateway};
use flair_warden::{Config, EnforcementEngine, Error, FeedDispatcher, feed, logging};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// User agent sent with every API request, as Reddit requires
const USER_AGENT: &str = "flair-warden moderation bot";
/// Wiki page holding the YAML configuration
const CONFIG_WIKI_PAGE: &str = "flair-warden";
/// How often the new-submissions listing is polled
const FEED_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load environment variables
    let credentials = Credentials {
        client_id: env::var("REDDIT_CLIENT_ID")?,
        client_secret: env::var("REDDIT_CLIENT_SECRET")?,
        username: env::var("REDDIT_USERNAME")?,
        password: env::var("REDDIT_PASSWORD")?,
    };
    let subreddit = env::var("SUBREDDIT")?;

    let gateway = Arc::new(RedditGateway::login(&credentials, &subreddit, USER_AGENT).await?);
    info!("Logged in, watching /r/{}", gateway.subreddit());

    // The config is fetched once; edits to the wiki page need a restart
    let config = Config::from_yaml(&gateway.wiki_page(CONFIG_WIKI_PAGE).await?)?;
    logging::log_console(format!("Loaded config for /r/{subreddit}"));

    let engine = EnforcementEngine::new(gateway.clone(), Arc::new(config));
    let dispatcher = FeedDispatcher::new(engine);

    // Skip the backlog so submissions that predate this process are not
    // re-enforced; their grace periods are not persisted anywhere.
    let (tx, rx) = mpsc::channel(100);
    let feed_task = tokio::spawn(feed::run_feed(gateway, tx, true, FEED_POLL_INTERVAL));

    info!("Starting dispatcher...");
    tokio::select! {
        () = dispatcher.dispatch(rx) => {
            info!("Feed ended, dispatcher finished");
        }
        _ = tokio::signal::ctrl_c() => {
            // In-flight grace periods are not persisted; operators should
            // expect them to be abandoned here, not resumed.
            warn!(
                abandoned = dispatcher.in_flight_count(),
                "Shutting down, abandoning in-flight enforcement runs"
            );
        }
    }
    feed_task.abort();

    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async_main());

    // Handle any errors that occurred during execution
    if let Err(err) = result {
        eprintln!("Error: {}", err);
    }
}
