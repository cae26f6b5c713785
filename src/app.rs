use crate::books::BookStoreClient;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::BookListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::info;

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// API base URL, shown in the header
  api_url: String,

  /// Whether the network is bypassed for this session
  offline: bool,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(client: BookStoreClient, offline: bool) -> Self {
    let api_url = client.base_url().to_string();
    Self {
      view_stack: vec![Box::new(BookListView::new(client))],
      api_url,
      offline,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
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

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));
    info!(offline = self.offline, "Session started");

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if let Some(view) = self.view_stack.last_mut() {
          view.tick();
        }
      }
      // The next draw picks up the new size
      Event::Resize => {}
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
      return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      self.should_quit = true;
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        // Popping the root view quits
        if self.view_stack.len() <= 1 {
          self.should_quit = true;
        } else {
          self.view_stack.pop();
        }
      }
    }
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn api_url(&self) -> &str {
    &self.api_url
  }

  pub fn is_offline(&self) -> bool {
    self.offline
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::view::Shortcut;
  use crossterm::event::KeyEventState;

  struct Stub(&'static str);

  impl View for Stub {
    fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
      match key.code {
        KeyCode::Enter => ViewAction::Push(Box::new(Stub("child"))),
        KeyCode::Char('q') => ViewAction::Pop,
        _ => ViewAction::None,
      }
    }

    fn render(&mut self, _frame: &mut Frame, _area: Rect) {}

    fn breadcrumb_label(&self) -> String {
      self.0.to_string()
    }

    fn shortcuts(&self) -> Vec<Shortcut> {
      Vec::new()
    }
  }

  fn app() -> App {
    App {
      view_stack: vec![Box::new(Stub("root"))],
      api_url: "https://api.itbook.store/1.0/".to_string(),
      offline: false,
      should_quit: false,
    }
  }

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent {
      code,
      modifiers: KeyModifiers::NONE,
      kind: KeyEventKind::Press,
      state: KeyEventState::NONE,
    }
  }

  #[test]
  fn test_push_and_pop() {
    let mut app = app();

    app.handle_key(press(KeyCode::Enter));
    assert_eq!(app.breadcrumb(), vec!["root", "child"]);

    app.handle_key(press(KeyCode::Char('q')));
    assert_eq!(app.breadcrumb(), vec!["root"]);
    assert!(!app.should_quit);
  }

  #[test]
  fn test_pop_at_root_quits() {
    let mut app = app();
    app.handle_key(press(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[test]
  fn test_ctrl_c_quits_from_any_depth() {
    let mut app = app();
    app.handle_key(press(KeyCode::Enter));
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }

  #[test]
  fn test_key_release_is_ignored() {
    let mut app = app();
    let mut key = press(KeyCode::Enter);
    key.kind = KeyEventKind::Release;
    app.handle_key(key);
    assert_eq!(app.breadcrumb().len(), 1);
  }
}
