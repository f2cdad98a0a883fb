// Bookshelf client entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (log to file, stdout is for command output)
// 3. Load config
// 4. Open the state store
// 5. Restore the persisted session
// 6. Run the requested command

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use bookshelf_api::{ApiClient, ContentApi};
use bookshelf_app::{ChatComposer, SessionManager};
use bookshelf_core::config;
use bookshelf_core::protocol::{Credentials, SearchRequest, SignUpRequest, UserProfile};
use bookshelf_core::selection::{InputEvent, ManualSelection, SelectionObserver};
use bookshelf_core::store::StateStore;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse arguments
    let args = Cli::parse();

    // 2. Initialize tracing
    let data_dir = config::data_dir();
    init_tracing(&data_dir)?;
    info!("bookshelf starting up");

    // 3. Load config
    let base_dir = match &args.config_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let mut config = config::load_config(&base_dir).context("failed to load configuration")?;
    if let Some(env) = args.env {
        config.api.environment = env;
    }
    let base_url = config.api.resolved_base_url();
    info!(
        "Config loaded: environment={}, backend={}",
        config.api.environment, base_url
    );

    // 4. Open the state store
    let db_path = config.storage.resolve_path(&data_dir);
    let store = Arc::new(StateStore::open(&db_path).context("failed to open state store")?);
    info!("State store opened at {}", db_path);

    let client = ApiClient::from_config(&config.api).context("failed to build HTTP client")?;
    let mut session = SessionManager::new(client.clone(), Arc::clone(&store));

    // 5. Restore the persisted session
    if let Err(e) = session.bootstrap().await {
        warn!("stored session was not accepted: {e}");
    }

    // 6. Run the requested command
    match args.command {
        Commands::Signup {
            email,
            password,
            first_name,
            last_name,
            background,
        } => {
            let mut request = SignUpRequest::new(email, password);
            request.first_name = first_name;
            request.last_name = last_name;
            background.apply_to(&mut request);
            let user = session.sign_up(request).await?;
            println!("Welcome, {}!", user.display_name());
        }

        Commands::Login { email, password } => {
            let user = session.sign_in(Credentials::new(email, password)).await?;
            println!("Signed in as {}", user.email);
        }

        Commands::Logout => {
            session.sign_out().await;
            println!("Signed out");
        }

        Commands::Whoami => match session.user() {
            Some(user) => print_profile(user),
            None => println!("Not signed in"),
        },

        Commands::Background { background } => {
            let user = session.update_background(background.into_update()).await?;
            println!("Background updated");
            print_profile(&user);
        }

        Commands::Chat { query, selection } => {
            let source = Arc::new(ManualSelection::new());
            let observer = Arc::new(SelectionObserver::new(Arc::clone(&source)));
            if let Some(text) = selection {
                source.select(text);
                observer.handle_event(InputEvent::MouseUp);
            }

            let composer = ChatComposer::new(client, Arc::clone(&observer));
            let response = composer.send(&query, session.user()).await?;
            observer.destroy();

            println!("{}", response.answer);
            if !response.citations.is_empty() {
                println!();
                println!("Sources:");
                for citation in &response.citations {
                    println!("  - {} ({})", citation.doc_id, citation.url);
                }
            }
        }

        Commands::Search { query } => {
            let request = SearchRequest {
                query: query.trim().to_string(),
            };
            let response = client.search(&request).await?;
            if response.results.is_empty() {
                println!("No passages matched `{}`", query.trim());
            }
            for chunk in &response.results {
                println!("## {} ({})", chunk.chapter_title, chunk.url_slug);
                println!("{}", chunk.page_content.trim());
                println!();
            }
        }
    }

    info!("bookshelf finished");
    Ok(())
}

fn print_profile(user: &UserProfile) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  software experience:  {:?}", user.software_experience);
    println!("  hardware experience:  {:?}", user.hardware_experience);
    println!("  technical background: {:?}", user.technical_background);
    if let Some(lang) = &user.primary_programming_language {
        println!("  primary language:     {lang}");
    }
}

/// Initialize tracing to log to a file under the data directory.
fn init_tracing(data_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("bookshelf.log"))
        .context("failed to open log file")?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bookshelf=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
