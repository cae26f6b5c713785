//! IT Bookstore API on top of the fetch cache.

pub mod api_types;
mod client;

pub use api_types::{Book, BookDetail, BookListResponse};
pub use client::BookStoreClient;
