mod app;
mod cache;
mod config;
mod constants;
mod events;
mod filter;
mod forms;
mod gallery_view;
mod input;
mod link;
mod model;
mod pager;
mod service;
mod session;
mod store;
mod tags;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyEventKind},
    execute,
  },
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use link::Route;
use service::GalleryService;
use session::Session;
use store::{MemoryStore, RecordStore, RestConfig, RestStore, Seed};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Browse tagged video galleries", long_about = None)]
struct Args {
  /// JSON file of galleries, videos and tag groups for offline use
  #[arg(long, value_name = "PATH")]
  seed: Option<PathBuf>,

  /// Backend base URL (overrides `backend_url` in prefs.toml)
  #[arg(long, value_name = "URL")]
  backend_url: Option<String>,

  /// Public API key for the backend
  #[arg(long)]
  anon_key: Option<String>,

  /// Act as this user id
  #[arg(short, long)]
  user: Option<String>,

  /// Open a shared link, e.g. vg://gallery/<id>?search=drill
  #[arg(short, long, conflicts_with = "gallery")]
  link: Option<String>,

  /// Open this gallery directly
  #[arg(short, long)]
  gallery: Option<String>,
}

// --- Setup ---

/// Log to a daily file under the data dir; the terminal belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
  let dir = Config::log_dir()?;
  std::fs::create_dir_all(&dir).ok()?;
  let appender = tracing_appender::rolling::daily(dir, "vg.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vg=info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}

fn build_store(args: &Args, config: &Config, session: &Session) -> Result<Arc<dyn RecordStore>> {
  if let Some(base_url) = args.backend_url.clone().or_else(|| config.backend_url.clone()) {
    let anon_key = args.anon_key.clone().or_else(|| config.anon_key.clone()).unwrap_or_default();
    info!(url = %base_url, "store: using backend");
    return Ok(Arc::new(RestStore::new(RestConfig {
      base_url,
      anon_key,
      access_token: session.access_token.clone(),
    })));
  }
  let seed = match &args.seed {
    Some(path) => Seed::load(path)?,
    None => Seed::default(),
  };
  info!(
    galleries = seed.galleries.len(),
    videos = seed.videos.len(),
    "store: offline with {} seed",
    if args.seed.is_some() { "file" } else { "empty" }
  );
  Ok(Arc::new(MemoryStore::from_seed(seed)))
}

fn start_route(args: &Args) -> Result<Route> {
  if let Some(link) = &args.link {
    return Route::parse(link).context("Failed to open link");
  }
  Ok(args.gallery.as_ref().map_or(Route::Galleries, |id| Route::gallery(id.as_str())))
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();

  let config = Config::load();
  let session = match args.user.clone().or_else(|| config.user_id.clone()) {
    Some(user) => Session::signed_in(user, config.access_token.clone()),
    None => Session::anonymous(),
  };
  let store = build_store(&args, &config, &session)?;
  let start = start_route(&args)?;
  info!(signed_in = session.is_signed_in(), link = %start.to_link(), "starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  execute!(std::io::stdout(), EnableFocusChange)?;
  let app = App::new(GalleryService::new(store), session, config, start);
  let result = run(&mut terminal, app).await;
  let _ = execute!(std::io::stdout(), DisableFocusChange);
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
  app.start();

  loop {
    app.check_pending();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        Event::FocusGained => app.on_focus_gained(),
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  info!("exiting");
  Ok(())
}
