mod app;
mod books;
mod cache;
mod config;
mod error;
mod event;
mod http;
mod logging;
mod query;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use books::BookStoreClient;
use cache::{CacheResult, Caches};
use http::ReqwestClient;

#[derive(Parser, Debug)]
#[command(name = "itbooks")]
#[command(about = "Browse the IT Bookstore, online or from the local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/itbooks/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Never touch the network; serve only what is already cached
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List newly released books
  New,
  /// Show one book by ISBN-13
  Book { isbn13: String },
  /// Resolve a cover image through the image cache
  Cover {
    url: String,
    /// Write the decoded image here (format from the extension)
    #[arg(short, long)]
    out: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // The TUI owns the terminal, so it logs to a file instead
  let _guard = match args.command {
    Some(_) => logging::init_stderr()?,
    None => logging::init_file(&logging::default_log_dir()?)?,
  };

  let config = config::Config::load(args.config.as_deref())?;

  let mut http = ReqwestClient::new(&config.http)?;
  if args.offline {
    http = http.offline();
  }

  let root = config.cache.root()?;
  info!(root = %root.display(), offline = args.offline, "Opening cache");
  let caches = Caches::open(Arc::new(http), &config.cache, &root)?;
  let client = BookStoreClient::new(&config.api.base_url, caches)?;

  match args.command {
    None => app::App::new(client, args.offline).run().await,
    Some(Command::New) => print_new_books(&client).await,
    Some(Command::Book { isbn13 }) => print_book(&client, &isbn13).await,
    Some(Command::Cover { url, out }) => save_cover(&client, &url, out).await,
  }
}

async fn print_new_books(client: &BookStoreClient) -> Result<()> {
  let result = client.new_books().await?;
  print_source(&result);

  if !result.data.is_ok() {
    return Err(eyre!("API error: {}", result.data.error));
  }
  for book in &result.data.books {
    println!("{}  {:>8}  {}", book.isbn13, book.price, book.title);
  }
  Ok(())
}

async fn print_book(client: &BookStoreClient, isbn13: &str) -> Result<()> {
  let result = client.book_detail(isbn13).await?;
  print_source(&result);

  let book = &result.data;
  if !book.is_ok() {
    return Err(eyre!("API error for {}: {}", isbn13, book.error));
  }

  println!("{}", book.title);
  if !book.subtitle.is_empty() {
    println!("{}", book.subtitle);
  }
  println!();
  println!("Authors:   {}", book.authors);
  println!("Publisher: {} ({})", book.publisher, book.year);
  println!("Pages:     {}", book.pages);
  println!("Rating:    {}/5", book.rating);
  println!("Price:     {}", book.price);
  println!("ISBN-10:   {}", book.isbn10);
  println!("Cover:     {}", book.image);
  for (title, link) in book.chapters() {
    println!("PDF:       {}  {}", title, link);
  }
  println!();
  println!("{}", book.desc);
  Ok(())
}

async fn save_cover(client: &BookStoreClient, url: &str, out: Option<PathBuf>) -> Result<()> {
  let image = client
    .cover(url)
    .await
    .ok_or_else(|| eyre!("Could not resolve cover image {}", url))?;

  println!("{}x{} px", image.width(), image.height());

  if let Some(path) = out {
    image
      .save(&path)
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
    println!("Saved to {}", path.display());
  }
  Ok(())
}

fn print_source<T>(result: &CacheResult<T>) {
  if result.is_cached() {
    match result.cached_at {
      Some(at) => eprintln!("(offline copy from {})", at.to_rfc3339()),
      None => eprintln!("(offline copy)"),
    }
  }
}
