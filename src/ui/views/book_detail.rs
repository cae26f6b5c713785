use crate::books::{Book, BookDetail, BookStoreClient};
use crate::cache::CacheResult;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{rating_stars, source_color, source_label};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use image::DynamicImage;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::sync::Arc;

/// Full record for one book plus its cover
pub struct BookDetailView {
  book: Book,
  detail: Query<CacheResult<BookDetail>>,
  cover: Query<Option<Arc<DynamicImage>>>,
}

impl BookDetailView {
  pub fn new(book: Book, client: BookStoreClient) -> Self {
    let books = client.clone();
    let isbn13 = book.isbn13.clone();
    let mut detail = Query::new(move || {
      let books = books.clone();
      let isbn13 = isbn13.clone();
      async move { books.book_detail(&isbn13).await.map_err(|e| e.to_string()) }
    });

    // The list entry already carries the cover URL, so both load in parallel
    let image_url = book.image.clone();
    let mut cover = Query::new(move || {
      let books = client.clone();
      let image_url = image_url.clone();
      async move { Ok(books.cover(&image_url).await) }
    });

    detail.fetch();
    cover.fetch();

    Self {
      book,
      detail,
      cover,
    }
  }

  fn cover_line(&self) -> Line<'static> {
    let label = Span::styled("Cover:     ", Style::default().fg(Color::DarkGray));
    let value = match self.cover.state() {
      QueryState::Success(Some(image)) => Span::styled(
        format!("{}x{} px", image.width(), image.height()),
        Style::default().fg(Color::Green),
      ),
      QueryState::Success(None) => {
        Span::styled("unavailable", Style::default().fg(Color::DarkGray))
      }
      QueryState::Error(e) => Span::styled(e.clone(), Style::default().fg(Color::Red)),
      QueryState::Loading | QueryState::Idle => {
        Span::styled("loading...", Style::default().fg(Color::DarkGray))
      }
    };
    Line::from(vec![label, value])
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.detail.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.book.isbn13),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.book.isbn13, e),
      _ => format!(" {} ", self.book.isbn13),
    };

    let mut block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(result) = self.detail.data() {
      block = block.title_bottom(
        Line::styled(
          format!(" {} ", source_label(result.source, result.cached_at)),
          Style::default().fg(source_color(result.source)),
        )
        .right_aligned(),
      );
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if self.detail.is_loading() {
      let paragraph =
        Paragraph::new("Loading book details...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    if let Some(error) = self.detail.error() {
      let paragraph = Paragraph::new(format!(
        "Error: {}\n\nNo offline copy of this book exists yet. Press 'r' to retry.",
        error
      ))
      .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let detail = match self.detail.data() {
      Some(result) => &result.data,
      None => return,
    };

    let chapters: Vec<Line> = detail
      .chapters()
      .map(|(title, link)| {
        Line::from(vec![
          Span::styled(format!("  {:<12}", title), Style::default().fg(Color::Cyan)),
          Span::raw(link),
        ])
      })
      .collect();

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(8),                         // Fields
        Constraint::Length(1),                         // Separator
        Constraint::Min(3),                            // Description
        Constraint::Length(chapters.len() as u16 + 1), // Sample chapters
      ])
      .split(inner);

    let field = |name: &'static str, value: &str| {
      Line::from(vec![
        Span::styled(format!("{:<11}", name), Style::default().fg(Color::DarkGray)),
        Span::raw(value.to_string()),
      ])
    };

    let header = vec![
      Line::from(Span::styled(
        detail.title.clone(),
        Style::default().fg(Color::White).bold(),
      )),
      Line::from(Span::styled(
        detail.subtitle.clone(),
        Style::default().fg(Color::DarkGray),
      )),
      field("Authors:", &detail.authors),
      field("Publisher:", &format!("{} ({})", detail.publisher, detail.year)),
      field("Pages:", &detail.pages),
      Line::from(vec![
        Span::styled(format!("{:<11}", "Rating:"), Style::default().fg(Color::DarkGray)),
        Span::styled(rating_stars(&detail.rating), Style::default().fg(Color::Yellow)),
        Span::raw("   "),
        Span::styled(detail.price.clone(), Style::default().fg(Color::Green)),
      ]),
      field("ISBN-10:", &detail.isbn10),
      self.cover_line(),
    ];
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let sep = Paragraph::new("─".repeat(chunks[1].width as usize))
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, chunks[1]);

    let desc = Paragraph::new(detail.desc.as_str()).wrap(Wrap { trim: true });
    frame.render_widget(desc, chunks[2]);

    let heading = if chapters.is_empty() {
      "No sample chapters"
    } else {
      "Sample chapters"
    };
    let mut samples = vec![Line::styled(heading, Style::default().fg(Color::DarkGray))];
    samples.extend(chapters);
    frame.render_widget(Paragraph::new(samples), chunks[3]);
  }
}

impl View for BookDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.detail.refetch();
        // A cover that failed before may be reachable now
        if !matches!(self.cover.state(), QueryState::Success(Some(_))) {
          self.cover.refetch();
        }
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.book.isbn13.clone()
  }

  fn tick(&mut self) {
    self.detail.poll();
    self.cover.poll();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![Shortcut::new("r", "refresh"), Shortcut::new("q", "back")]
  }
}
