mod auth;
mod catalog;
mod config;
mod controller;
mod library;
mod logging;
mod model;
mod player;
mod session;
mod share;
mod view;

use std::io;
use std::sync::Arc;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::sync::Mutex;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use auth::Authenticator;
use config::AppConfig;
use controller::{AppController, SessionContext};
use library::{ListeningHistory, LocalLibrary, Settings, Store};
use model::{AppModel, BackendKind, SpotifyClient, YtMusicClient};
use session::{LiveAdapters, SessionCoordinator};
use view::AppView;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    if let Err(e) = logging::init_logging(&config.log_dir()) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== Nova Starting ===");

    let store = Store::open(config.data_dir())?;
    tracing::info!(data_dir = %store.root().display(), "Opened data store");
    // Other instances sharing the data directory show up as storage events
    let _watcher = match store.watch() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Could not watch the data directory");
            None
        }
    };
    let library = LocalLibrary::new(store.clone());
    let history = ListeningHistory::new(store.clone());
    let settings = Settings::new(store.clone());

    let ytmusic = YtMusicClient::new(&config.backend_url, config.health_timeout())?;
    let backend_healthy = ytmusic.check_health().await;
    tracing::info!(url = %config.backend_url, healthy = backend_healthy, "Probed YouTube Music backend");

    let authenticator = if config.has_spotify_app() {
        Some(Authenticator::new(
            &config.spotify.client_id,
            config.spotify.redirect_port,
            store.clone(),
        )?)
    } else {
        None
    };

    let preferred = settings.preferred_source().unwrap_or(if config.use_ytmusic {
        BackendKind::YtMusic
    } else {
        BackendKind::Spotify
    });
    let (backend, spotify) = choose_backend(preferred, backend_healthy, authenticator.as_ref()).await?;

    if let Some(client) = &spotify {
        if backend_healthy {
            if let Err(e) = ytmusic.set_token(&client.access_token().await).await {
                tracing::debug!(error = %e, "Backend did not accept the Spotify token");
            }
        }
    }

    let adapters = LiveAdapters::new(ytmusic.clone(), spotify);
    let session = SessionCoordinator::start(
        backend,
        Arc::new(adapters.clone()),
        Arc::new(ytmusic.clone()),
        history.clone(),
        backend_healthy,
    )
    .await?;

    let app_model = AppModel::new(backend, backend_healthy, settings.theme().id);
    let model = Arc::new(Mutex::new(app_model));

    let ctx = Arc::new(SessionContext {
        config,
        store,
        library,
        history,
        settings,
        ytmusic,
        adapters,
        authenticator,
        session: session.clone(),
    });
    let controller = AppController::new(model.clone(), ctx);

    controller.refresh_playlists().await;
    controller.refresh_liked_cache().await;
    controller.load_home().await;
    controller.start_background_listeners();

    // `nova <share link>` opens the shared track or playlist straight away
    if let Some(link) = std::env::args().nth(1) {
        controller.open_share_link(&link).await;
    }

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    let res = run_app(&mut terminal, model.clone(), controller, session.clone()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    if let Err(e) = session.stop().await {
        tracing::warn!(error = %e, "Failed to stop playback on exit");
    }

    tracing::info!("Nova shutting down");
    Ok(())
}

/// Pick the source to start with. A preferred but unavailable source falls back to the other one.
async fn choose_backend(
    preferred: BackendKind,
    backend_healthy: bool,
    authenticator: Option<&Authenticator>,
) -> Result<(BackendKind, Option<SpotifyClient>)> {
    if preferred == BackendKind::YtMusic {
        if backend_healthy {
            return Ok((BackendKind::YtMusic, None));
        }
        tracing::warn!("YouTube Music backend unreachable, falling back to Spotify");
    }

    match connect_spotify(authenticator).await {
        Ok(client) => Ok((BackendKind::Spotify, Some(client))),
        Err(e) if backend_healthy => {
            tracing::warn!(error = %e, "Spotify unavailable, using YouTube Music");
            Ok((BackendKind::YtMusic, None))
        }
        Err(e) => Err(e.context("No music source available: Spotify login failed and the YouTube Music backend is not reachable")),
    }
}

async fn connect_spotify(authenticator: Option<&Authenticator>) -> Result<SpotifyClient> {
    let auth = authenticator
        .ok_or_else(|| anyhow!("No Spotify client id configured (NOVA_SPOTIFY_CLIENT_ID)"))?;
    let token = auth.obtain_token().await?;
    let client = SpotifyClient::new(token, Some(auth.clone()))?;
    match client.me().await {
        Ok(user) => tracing::info!(
            user_id = %user.id,
            name = user.display_name.as_deref().unwrap_or_default(),
            "Spotify authorized successfully"
        ),
        Err(e) => {
            tracing::error!(error = %e, "Spotify authorization check failed");
            return Err(e.into());
        }
    }
    Ok(client)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<Mutex<AppModel>>,
    controller: AppController,
    session: SessionCoordinator,
) -> io::Result<()> {
    loop {
        let snapshot = session.snapshot().await;

        // Get current state
        let (ui_state, content_state, liked, should_quit) = {
            let model_guard = model.lock().await;

            // Auto-clear old errors and notices (after 5 seconds)
            model_guard.auto_clear_old_messages().await;

            (
                model_guard.get_ui_state().await,
                model_guard.get_content_state().await,
                model_guard.liked.snapshot().await,
                model_guard.should_quit().await,
            )
        };

        terminal.draw(|f| {
            AppView::render(f, &snapshot.info, &ui_state, &content_state, &liked);
        })?;

        // Handle input with shorter poll time for smoother UI updates
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    tracing::warn!(error = %e, "Key handling failed");
                }
            }
        }

        if should_quit {
            break;
        }
    }

    Ok(())
}
