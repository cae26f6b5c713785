use crate::books::{Book, BookListResponse, BookStoreClient};
use crate::cache::CacheResult;
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{source_color, source_label, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::BookDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// New releases, the root view
pub struct BookListView {
  client: BookStoreClient,
  query: Query<CacheResult<BookListResponse>>,
  list_state: ListState,
}

impl BookListView {
  pub fn new(client: BookStoreClient) -> Self {
    let books = client.clone();
    let mut query = Query::new(move || {
      let books = books.clone();
      async move { books.new_books().await.map_err(|e| e.to_string()) }
    });

    // Start fetching immediately
    query.fetch();

    Self {
      client,
      query,
      list_state: ListState::default(),
    }
  }

  fn books(&self) -> &[Book] {
    self
      .query
      .data()
      .map(|result| result.data.books.as_slice())
      .unwrap_or(&[])
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.books().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => " New Releases (loading...) ".to_string(),
      QueryState::Error(e) => format!(" New Releases (error: {}) ", e),
      _ => format!(" New Releases ({}) ", len),
    };

    let mut block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(result) = self.query.data() {
      block = block.title_bottom(
        Line::styled(
          format!(" {} ", source_label(result.source, result.cached_at)),
          Style::default().fg(source_color(result.source)),
        )
        .right_aligned(),
      );
    }

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load books and no offline copy exists. Press 'r' to retry."
      } else {
        "No books found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .books()
      .iter()
      .map(|book| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<14}", book.isbn13),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:>8}", book.price),
            Style::default().fg(Color::Green),
          ),
          Span::raw("  "),
          Span::raw(truncate(&book.title, 50)),
          Span::styled(
            format!("  {}", truncate(&book.subtitle, 40)),
            Style::default().fg(Color::DarkGray),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for BookListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.query.refetch();
      }
      KeyCode::Enter => {
        if let Some(book) = self.list_state.selected().and_then(|idx| self.books().get(idx)) {
          return ViewAction::Push(Box::new(BookDetailView::new(
            book.clone(),
            self.client.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "New Releases".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("enter", "details"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "quit"),
    ]
  }
}
