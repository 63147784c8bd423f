use std::cmp::Ordering;
use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Book, BookFields, BookPage, ListQuery, SortField, SortOrder};
use crate::repo::{BookRepo, RepoError};
use crate::validation::today;

/// Keeps books in process memory. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryBookRepo {
    books: Arc<RwLock<Vec<Book>>>,
}

impl MemoryBookRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &Book, b: &Book, field: SortField) -> Ordering {
    match field {
        SortField::Title => a.title.cmp(&b.title),
        SortField::Author => a.author.cmp(&b.author),
        SortField::Genre => a.genre.cmp(&b.genre),
        SortField::PublishedDate => a.published_date.cmp(&b.published_date),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

impl BookRepo for MemoryBookRepo {
    type Error = Infallible;

    async fn create(&self, fields: BookFields) -> Result<Book, RepoError<Infallible>> {
        let new_book = fields.into_new_book(today())?;
        let now = Utc::now();
        let book = Book {
            id: new_book.id,
            title: new_book.title,
            author: new_book.author,
            genre: new_book.genre,
            published_date: new_book.published_date,
            created_at: now,
            updated_at: now,
        };

        self.books.write().await.push(book.clone());
        Ok(book)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, Infallible> {
        let books = self.books.read().await;
        Ok(books.iter().find(|book| book.id == id).cloned())
    }

    async fn list(&self, query: ListQuery) -> Result<BookPage, Infallible> {
        let mut books = self.books.read().await.clone();

        books.sort_by(|a, b| {
            let ordering = match query.sort_order {
                SortOrder::Asc => compare(a, b, query.sort_by),
                SortOrder::Desc => compare(b, a, query.sort_by),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        let total = books.len() as i64;
        let books = books
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .collect();

        Ok(BookPage { books, total })
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        fields: BookFields,
    ) -> Result<Option<Book>, RepoError<Infallible>> {
        let changes = fields.into_changes(today())?;

        let mut books = self.books.write().await;
        let Some(book) = books.iter_mut().find(|book| book.id == id) else {
            return Ok(None);
        };

        changes.apply_to(book);
        book.updated_at = Utc::now();
        Ok(Some(book.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Book>, Infallible> {
        let mut books = self.books.write().await;
        let position = books.iter().position(|book| book.id == id);
        Ok(position.map(|index| books.remove(index)))
    }
}
