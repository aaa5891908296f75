use crate::api::{resolve_base_url, ApiClient, GroceryClient};
use crate::cache::{CacheWorker, Registration, SqliteStorage};
use crate::config::Config;
use crate::db::Database;
use crate::event::{Event, EventHandler};
use crate::net::{HttpTransport, Transport};
use crate::store::GroceryStore;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Notice, View, ViewAction};
use crate::ui::views::{ChatView, GroceryListView};
use crate::ui::{self, Focus, Screen, WIDE_LAYOUT_MIN_WIDTH};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

type OfflineCache = Registration<SqliteStorage>;

/// Main application state
pub struct App {
  /// Items, transcript and theme shared by both panes
  store: GroceryStore,
  list: GroceryListView,
  chat: ChatView,
  focus: Focus,
  command: CommandInput,
  notice: Option<Notice>,
  offline: Option<Arc<OfflineCache>>,
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let store = match Database::open() {
      Ok(db) => GroceryStore::load(db),
      Err(e) => {
        warn!(error = %e, "local storage unavailable, list will not persist");
        GroceryStore::in_memory()
      }
    };

    let base_url = resolve_base_url(config.api.url.as_deref());
    let base = Url::parse(&base_url).map_err(|e| eyre!("Invalid API URL '{}': {}", base_url, e))?;
    let network: Arc<dyn Transport> = Arc::new(HttpTransport::new(base.origin())?);

    let offline = if config.offline.enabled {
      match start_offline_cache(config, &base, Arc::clone(&network)) {
        Ok(registration) => Some(registration),
        Err(e) => {
          warn!(error = %e, "offline cache disabled");
          None
        }
      }
    } else {
      None
    };

    // Requests go through the cache whenever it is running
    let transport: Arc<dyn Transport> = match &offline {
      Some(registration) => Arc::clone(registration) as Arc<dyn Transport>,
      None => network,
    };
    info!(api = %base_url, offline = offline.is_some(), "starting grocer");

    let client = GroceryClient::new(ApiClient::new(base_url, transport));
    let width = crossterm::terminal::size()
      .map(|(width, _)| width)
      .unwrap_or(WIDE_LAYOUT_MIN_WIDTH);

    Ok(Self {
      store,
      list: GroceryListView::new(client.clone()),
      chat: ChatView::new(client),
      focus: Focus::initial(width),
      command: CommandInput::new(),
      notice: None,
      offline,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(offline) = &self.offline {
      offline.settle().await;
    }
    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      let offline = self.offline_label();
      terminal.draw(|frame| {
        ui::draw(
          frame,
          Screen {
            store: &self.store,
            list: &mut self.list,
            chat: &mut self.chat,
            focus: self.focus,
            command: &self.command,
            notice: self.notice.as_ref(),
            offline: &offline,
          },
        )
      })?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn offline_label(&self) -> String {
    match &self.offline {
      None => "offline off".to_string(),
      Some(registration) => match registration.status() {
        Some((version, state)) => format!("{} {}", version, state.label()),
        None => "offline starting".to_string(),
      },
    }
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Resize(width, height) => debug!(width, height, "terminal resized"),
      Event::Tick => {}
    }
    // Input can starve ticks, so poll after every event
    self.tick();
  }

  fn tick(&mut self) {
    for notice in [self.list.tick(&mut self.store), self.chat.tick(&mut self.store)]
      .into_iter()
      .flatten()
    {
      self.notice = Some(notice);
    }

    if self
      .notice
      .as_ref()
      .is_some_and(|n| n.is_expired(Instant::now()))
    {
      self.notice = None;
    }
  }

  fn focused_view(&self) -> &dyn View {
    match self.focus {
      Focus::List => &self.list,
      Focus::Chat => &self.chat,
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // An open overlay takes every key
    if self.command.is_active() {
      if let KeyResult::Event(CommandEvent::Submitted(cmd)) = self.command.handle_key(key) {
        self.execute_command(&cmd);
      }
      return;
    }

    if matches!(key.code, KeyCode::Tab | KeyCode::BackTab) {
      self.focus = self.focus.toggle();
      return;
    }

    // Borrow the store separately from the focused pane
    let action = match self.focus {
      Focus::List => self.list.handle_key(key, &mut self.store),
      Focus::Chat => self.chat.handle_key(key, &mut self.store),
    };
    if action == ViewAction::None {
      return;
    }

    if self.command.handle_key(key) != KeyResult::NotHandled {
      return;
    }

    if key.code == KeyCode::Char('q') && !self.focused_view().captures_text() {
      self.should_quit = true;
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    match cmd {
      "list" => self.focus = Focus::List,
      "chat" => self.focus = Focus::Chat,
      "theme" => self.store.toggle_dark_mode(),
      "clear" => self.store.clear_messages(),
      "quit" => self.should_quit = true,
      "" => {}
      other => self.notice = Some(Notice::error(format!("Unknown command: {}", other))),
    }
  }
}

/// Open the cache buckets and register the worker in the background.
///
/// Requests made before registration finishes go straight to the network.
fn start_offline_cache(
  config: &Config,
  base: &Url,
  network: Arc<dyn Transport>,
) -> Result<Arc<OfflineCache>> {
  let storage = Arc::new(SqliteStorage::open()?);
  let scope = base
    .join("/")
    .map_err(|e| eyre!("Invalid cache scope for {}: {}", base, e))?;
  let worker = CacheWorker::new(&config.offline, scope, storage, Arc::clone(&network))?;

  let registration = Arc::new(Registration::new(network));
  let background = Arc::clone(&registration);
  tokio::spawn(async move {
    match background.register(worker).await {
      Ok(()) => info!("offline cache ready"),
      Err(e) => warn!(error = %e, "offline cache registration failed"),
    }
  });

  Ok(registration)
}
