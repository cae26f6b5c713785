//! Serde-deserializable types matching IT Bookstore API responses.
//!
//! The API returns every scalar as a string, including numeric ones like
//! `total`, `pages` and `rating`. Every field is required except `pdf`, so
//! a body of another shape fails to decode. Unknown fields are ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

// ============================================================================
// GET /new
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookListResponse {
  pub error: String,
  pub total: String,
  pub books: Vec<Book>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Book {
  pub title: String,
  pub subtitle: String,
  pub isbn13: String,
  pub price: String,
  pub image: String,
  pub url: String,
}

// ============================================================================
// GET /books/{isbn13}
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookDetail {
  pub error: String,
  pub title: String,
  pub subtitle: String,
  pub authors: String,
  pub publisher: String,
  pub isbn10: String,
  pub isbn13: String,
  pub pages: String,
  pub year: String,
  pub rating: String,
  pub desc: String,
  pub price: String,
  pub image: String,
  pub url: String,
  /// Free sample chapters, keyed by chapter title
  pub pdf: Option<BTreeMap<String, String>>,
}

impl BookListResponse {
  /// `"0"` means success; the API reports failures in-band.
  pub fn is_ok(&self) -> bool {
    self.error.is_empty() || self.error == "0"
  }
}

impl BookDetail {
  pub fn is_ok(&self) -> bool {
    self.error.is_empty() || self.error == "0"
  }

  /// Chapter links in title order; empty when the book has no samples.
  pub fn chapters(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .pdf
      .iter()
      .flatten()
      .map(|(title, link)| (title.as_str(), link.as_str()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_new_books() {
    let json = r#"{"error":"0","total":"1","books":[{"title":"Test Book","subtitle":"Test Subtitle","isbn13":"1234567890123","price":"$10.00","image":"https://example.com/image.png","url":"https://example.com/book"}]}"#;

    let list: BookListResponse = serde_json::from_str(json).unwrap();

    assert!(list.is_ok());
    assert_eq!(list.total, "1");
    assert_eq!(list.books.len(), 1);
    assert_eq!(list.books[0].isbn13, "1234567890123");
    assert_eq!(list.books[0].price, "$10.00");
  }

  #[test]
  fn test_unknown_fields_are_ignored() {
    let json = r#"{"title":"Test Book","subtitle":"","isbn13":"1","price":"$0.00","image":"","url":"","badge":"new","sales":{"rank":3}}"#;

    let book: Book = serde_json::from_str(json).unwrap();
    assert_eq!(book.title, "Test Book");
  }

  #[test]
  fn test_decode_detail_with_pdf() {
    let json = r#"{
      "error": "0",
      "title": "Securing DevOps",
      "subtitle": "Security in the Cloud",
      "authors": "Julien Vehent",
      "publisher": "Manning",
      "isbn10": "1617294136",
      "isbn13": "9781617294136",
      "pages": "384",
      "year": "2018",
      "rating": "5",
      "desc": "An application running in the cloud...",
      "price": "$26.98",
      "image": "https://itbook.store/img/books/9781617294136.png",
      "url": "https://itbook.store/books/9781617294136",
      "pdf": {
        "Chapter 2": "https://itbook.store/files/9781617294136/chapter2.pdf",
        "Chapter 5": "https://itbook.store/files/9781617294136/chapter5.pdf"
      }
    }"#;

    let detail: BookDetail = serde_json::from_str(json).unwrap();

    assert_eq!(detail.isbn13, "9781617294136");
    assert_eq!(detail.authors, "Julien Vehent");
    let chapters: Vec<_> = detail.chapters().collect();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].0, "Chapter 2");
  }

  #[test]
  fn test_detail_without_pdf() {
    let json = r#"{"error":"0","title":"T","subtitle":"","authors":"A","publisher":"P","isbn10":"1617294136","isbn13":"9781617294136","pages":"1","year":"2018","rating":"4","desc":"","price":"$0.00","image":"","url":""}"#;

    let detail: BookDetail = serde_json::from_str(json).unwrap();
    assert!(detail.pdf.is_none());
    assert_eq!(detail.chapters().count(), 0);
  }

  #[test]
  fn test_missing_required_field_fails() {
    assert!(serde_json::from_str::<Book>(r#"{"title":"No ISBN"}"#).is_err());
  }

  #[test]
  fn test_other_shapes_do_not_decode_as_a_list() {
    for body in [r#"{}"#, r#"{"message":"rate limited"}"#, r#"{"error":"0","total":"0"}"#] {
      assert!(serde_json::from_str::<BookListResponse>(body).is_err(), "{}", body);
    }
  }

  #[test]
  fn test_detail_requires_every_field_but_pdf() {
    let json = r#"{"error":"[books] Book not found","title":"T","isbn13":"9781617294136"}"#;
    assert!(serde_json::from_str::<BookDetail>(json).is_err());
  }

  #[test]
  fn test_in_band_error() {
    let list: BookListResponse =
      serde_json::from_str(r#"{"error":"[books] Invalid request","total":"0","books":[]}"#).unwrap();
    assert!(!list.is_ok());
  }
}
