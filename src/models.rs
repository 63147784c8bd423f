use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::schema::books;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, diesel::Queryable, diesel::Selectable)]
#[diesel(table_name = books)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields of a book as they arrive in a request body, before any validation.
///
/// Used both for creating a book (every field must be present) and for
/// updating one (only the fields present are touched).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookFields {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub published_date: Option<String>,
}

/// A field sent as `null` is present but empty, so it fails as required
fn null_as_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(value.unwrap_or_default()))
}

/// A validated book, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, diesel::Insertable)]
#[diesel(table_name = books)]
pub struct NewBook {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_date: NaiveDate,
}

/// A validated partial update. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, diesel::AsChangeset)]
#[diesel(table_name = books)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub published_date: Option<NaiveDate>,
}

impl BookChanges {
    pub fn apply_to(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(genre) = self.genre {
            book.genre = genre;
        }
        if let Some(published_date) = self.published_date {
            book.published_date = published_date;
        }
    }
}

/// What's left of a book after it has been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedBook {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
}

impl From<Book> for DeletedBook {
    fn from(book: Book) -> Self {
        DeletedBook {
            id: book.id,
            title: book.title,
            author: book.author,
            genre: book.genre,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    Author,
    Genre,
    PublishedDate,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub const ALL: [SortField; 6] = [
        SortField::Title,
        SortField::Author,
        SortField::Genre,
        SortField::PublishedDate,
        SortField::CreatedAt,
        SortField::UpdatedAt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Author => "author",
            SortField::Genre => "genre",
            SortField::PublishedDate => "publishedDate",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
        }
    }

    pub fn parse(name: &str) -> Option<SortField> {
        SortField::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Only "asc" sorts ascending, anything else sorts descending
    pub fn parse(value: Option<&str>) -> SortOrder {
        match value {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A page of books, already validated: `page >= 1` and `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page: i64,
    pub limit: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_books: i64,
    pub books_per_page: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_books: i64) -> Self {
        let total_pages = (total_books + limit - 1) / limit;
        let has_next_page = page < total_pages;
        let has_prev_page = page > 1;

        Pagination {
            current_page: page,
            total_pages,
            total_books,
            books_per_page: limit,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then(|| page + 1),
            prev_page: has_prev_page.then(|| page - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sorting {
    pub sort_by: &'static str,
    pub sort_order: &'static str,
}
