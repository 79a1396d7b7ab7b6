use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use galleria::config::{Cli, Command, Config};
use galleria::db;
use galleria::db::models::{Item, ItemId, PublicUpload, UserId};
use galleria::error::AppError;
use galleria::feed::{FeedPaginator, FetchOutcome, ScrollTrigger, TriggerOutcome};
use galleria::gateway::{DocPath, DocumentGateway, SqliteGateway};
use galleria::images::{ImageSource, UnsplashClient};
use galleria::session::{Session, SessionUser};
use galleria::state::AppState;
use galleria::uploads::UploadRequest;
use galleria::viewer::DetailViewer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let gateway: Arc<dyn DocumentGateway> = Arc::new(SqliteGateway::new(pool));
    let images: Arc<dyn ImageSource> = Arc::new(UnsplashClient::new(
        &config.unsplash.base_url,
        config.unsplash.api_key.clone(),
    )?);

    let state = AppState {
        gateway,
        images,
        config,
    };

    let result = match cli.command {
        Command::Explore { query, pages } => browse(state.explore_feed(query), pages).await,
        Command::Uploads { pages } => browse(state.uploads_feed(), pages).await,
        Command::Upload {
            user,
            file,
            title,
            description,
            link,
        } => {
            let bytes = Bytes::from(std::fs::read(&file)?);
            let request = UploadRequest {
                file_name: file.display().to_string(),
                bytes,
                title,
                description,
                link,
            };
            state
                .uploads()
                .upload(&signed_in(user, None), request)
                .await
                .map(|item| println!("Uploaded {}", item.id))
        }
        Command::Like { user, item } => {
            let mut viewer = open(&state, &item, signed_in(user, None)).await?;
            viewer.like().await.map(|toggle| {
                let verb = if toggle.liked { "Liked" } else { "Unliked" };
                println!("{} {} ({} likes)", verb, item, toggle.count);
            })
        }
        Command::Comment {
            user,
            name,
            item,
            text,
        } => {
            let mut viewer = open(&state, &item, signed_in(user, name)).await?;
            viewer
                .comment(&text)
                .await
                .map(|c| println!("Added comment {}", c.id))
        }
        Command::Download { url, alt, dir } => match state.images.download(&url).await {
            Ok(download) => {
                let path = dir.join(download.file_name(alt.as_deref()));
                std::fs::write(&path, &download.bytes)?;
                println!("Saved {}", path.display());
                Ok(())
            }
            Err(e) => Err(AppError::from(e)),
        },
        Command::Show { item, user } => {
            let session = match user {
                Some(user) => signed_in(user, None),
                None => Session::anonymous(),
            };
            let viewer = open(&state, &item, session).await?;
            print_viewer(&viewer);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e.user_message());
        // 2 for failures a retry may fix, 1 for refusals
        std::process::exit(if e.is_remote() { 2 } else { 1 });
    }

    Ok(())
}

fn signed_in(user: String, name: Option<String>) -> Session {
    Session::sign_in(SessionUser {
        id: UserId::new(user),
        display_name: name,
    })
}

/// Load pages the way a scrolling view would: one sentinel, one trigger per page.
async fn browse(feed: FeedPaginator, pages: usize) -> Result<(), AppError> {
    let trigger = ScrollTrigger::new(Arc::new(feed));
    let sentinel = trigger.arm();

    for _ in 0..pages {
        match trigger.on_visibility(sentinel, true).await {
            TriggerOutcome::Fetched(FetchOutcome::Failed(e)) => return Err(e),
            TriggerOutcome::Fetched(_) => {}
            TriggerOutcome::Ignored(reason) => {
                tracing::debug!("No more pages: {:?}", reason);
                break;
            }
        }
    }

    for item in trigger.feed().items().await {
        println!(
            "{}\t{}\t{} likes\t{} comments",
            item.id,
            item.alt,
            item.likes.len(),
            item.comments.len()
        );
    }
    trigger.teardown().await;
    Ok(())
}

async fn open(state: &AppState, id: &str, session: Session) -> anyhow::Result<DetailViewer> {
    let item = load_upload(&state.gateway, &ItemId::new(id)).await?;
    let on_update = Box::new(|item: Item| {
        tracing::debug!("{} now has {} likes", item.id, item.likes.len());
    });
    Ok(DetailViewer::open(item, session, state.gateway.clone(), on_update).await)
}

async fn load_upload(gateway: &Arc<dyn DocumentGateway>, id: &ItemId) -> anyhow::Result<Item> {
    let doc = gateway
        .get(&DocPath::public_upload(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("No uploaded image with id {}", id))?;
    let upload: PublicUpload = serde_json::from_value(doc)?;
    Ok(upload.into_item(id.as_str()))
}

fn print_viewer(viewer: &DetailViewer) {
    let item = viewer.item();
    println!("{} ({})", item.alt, item.id);
    if let Some(uploader) = viewer.uploader() {
        println!("by {} @{}", uploader.name, uploader.handle);
    }
    println!("{} likes, {} comments", item.likes.len(), viewer.total_comments());
    for comment in viewer.comments() {
        println!("- {}: {}", comment.user.name, comment.text);
        for reply in viewer.sync().replies_for(&comment.id) {
            println!("    - {}: {}", reply.user.name, reply.text);
        }
    }
}
