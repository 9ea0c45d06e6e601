use crate::commands::Action;
use crate::config::{Config, Resource};
use crate::event::{Event, EventHandler};
use crate::fetch::{FetchStore, HttpTransport, Transport};
use crate::persist::{SqliteKvStore, Storage};
use crate::store::ProviderScope;
use crate::swapi::ApiBase;
use crate::table::params::{parse_columns_param, parse_sort_param};
use crate::table::SortEntry;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{PeopleView, PlanetsView};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Table preferences given on the command line, in URL parameter syntax
#[derive(Debug, Clone, Default)]
pub struct TableOverrides {
  pub columns: Option<String>,
  pub sort: Option<String>,
  /// Keep preferences in memory only
  pub no_persist: bool,
}

impl TableOverrides {
  fn columns(&self) -> Option<Vec<String>> {
    parse_columns_param(self.columns.as_deref())
  }

  fn sort(&self) -> Option<Vec<SortEntry>> {
    self.sort.as_deref().map(|raw| parse_sort_param(Some(raw)))
  }

  fn is_empty(&self) -> bool {
    self.columns.is_none() && self.sort.is_none()
  }
}

/// Main application state
pub struct App {
  config: Config,
  fetch: FetchStore,
  storage: Storage,
  base: ApiBase,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command line
  command: CommandInput,

  /// One-shot message shown in place of the footer
  flash: Option<String>,

  should_quit: bool,

  /// Resource hooks only work while this is alive. Declared last so the
  /// views release their handles first.
  _provider: ProviderScope,
}

impl App {
  pub fn new(config: Config, overrides: TableOverrides) -> Result<Self> {
    let transport = HttpTransport::new(&config.api.user_agent)
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    let storage = Self::open_storage(&config, &overrides);
    Self::with_parts(config, overrides, Arc::new(transport), storage)
  }

  fn open_storage(config: &Config, overrides: &TableOverrides) -> Storage {
    if overrides.no_persist || !config.persist {
      info!("table preferences kept in memory");
      return Storage::memory();
    }
    match SqliteKvStore::open_default() {
      Ok(store) => Storage::new(store),
      Err(e) => {
        warn!(error = %e, "failed to open preference store, falling back to memory");
        Storage::memory()
      }
    }
  }

  fn with_parts(
    config: Config,
    overrides: TableOverrides,
    transport: Arc<dyn Transport>,
    storage: Storage,
  ) -> Result<Self> {
    let base = ApiBase::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.api.base_url, e))?;
    let fetch = FetchStore::new(transport);
    let provider = fetch.provide();

    let mut app = Self {
      config,
      fetch,
      storage,
      base,
      view_stack: Vec::new(),
      command: CommandInput::new(),
      flash: None,
      should_quit: false,
      _provider: provider,
    };
    let root = app.root_view(app.config.default_resource, &overrides)?;
    app.view_stack.push(root);
    Ok(app)
  }

  fn root_view(&self, resource: Resource, overrides: &TableOverrides) -> Result<Box<dyn View>> {
    let apply = !overrides.is_empty();
    let view: Box<dyn View> = match resource {
      Resource::People => {
        let mut view = PeopleView::new(&self.fetch, &self.storage, &self.base)
          .map_err(|e| eyre!("Failed to open people: {}", e))?;
        if apply {
          view.apply_overrides(overrides.columns(), overrides.sort());
        }
        Box::new(view)
      }
      Resource::Planets => {
        let mut view = PlanetsView::new(&self.fetch, &self.storage, &self.base)
          .map_err(|e| eyre!("Failed to open planets: {}", e))?;
        if apply {
          view.apply_overrides(overrides.columns(), overrides.sort());
        }
        Box::new(view)
      }
    };
    Ok(view)
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

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(self.config.tick_rate());
    info!(base = %self.base.as_str(), "started");

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      let fetch = self.fetch.clone();
      tokio::select! {
        event = events.next() => match event {
          Some(event) => self.handle_event(event),
          None => {
            warn!("event stream closed");
            self.should_quit = true;
          }
        },
        _ = fetch.next_completion() => {}
      }
    }

    info!("exiting");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Resize => {}
      Event::Tick => self.tick(),
    }
  }

  fn tick(&mut self) {
    if self.storage.sync_external() {
      debug!("picked up preference changes from another process");
    }
    self.fetch.poll();
    if let Some(view) = self.view_stack.last_mut() {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }
    self.flash = None;

    match self.command.handle_key(key) {
      KeyResult::Handled => return,
      KeyResult::Event(event) => {
        self.handle_command(event);
        return;
      }
      KeyResult::NotHandled => {}
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => return,
    };
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_command(&mut self, event: CommandEvent) {
    match event {
      CommandEvent::Cancelled => {}
      CommandEvent::Unknown(input) => {
        debug!(input = %input, "unknown command");
        self.flash = Some(format!("unknown command: {}", input));
      }
      CommandEvent::Submitted(action) => self.execute(action),
    }
  }

  fn execute(&mut self, action: Action) {
    match action {
      Action::People => self.switch_root(Resource::People),
      Action::Planets => self.switch_root(Resource::Planets),
      Action::Refresh => {
        if let Some(view) = self.view_stack.last_mut() {
          view.refresh(true);
        }
      }
      Action::Reset => {
        if let Some(view) = self.view_stack.last_mut() {
          view.reset();
        }
      }
      Action::Quit => self.should_quit = true,
    }
  }

  /// Replace the whole stack. The new root is built before the old views
  /// drop, so a reopened listing keeps its cache entry.
  fn switch_root(&mut self, resource: Resource) {
    match self.root_view(resource, &TableOverrides::default()) {
      Ok(view) => self.view_stack = vec![view],
      Err(e) => {
        warn!(error = %e, "failed to switch view");
        self.flash = Some(e.to_string());
      }
    }
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|view| &**view)
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn title(&self) -> &str {
    self.config.title()
  }

  pub fn base_url(&self) -> &str {
    self.base.as_str()
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn flash(&self) -> Option<&str> {
    self.flash.as_deref()
  }

  pub fn in_flight(&self) -> usize {
    self.fetch.in_flight()
  }

  /// Breadcrumb trail, root first
  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }
}
