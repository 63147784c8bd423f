use std::error::Error;
use std::future::Future;
use uuid::Uuid;

use crate::models::{Book, BookFields, BookPage, ListQuery};
use crate::validation::ValidationErrors;

/// Failure of an operation that validates its input before touching the store
#[derive(Debug, thiserror::Error)]
pub enum RepoError<E> {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Store(E),
}

pub trait BookRepo: Clone + Send + Sync + 'static {
    type Error: Error + Send + Sync + 'static;

    /// Validates every field and stores the new book
    fn create(
        &self,
        fields: BookFields,
    ) -> impl Future<Output = Result<Book, RepoError<Self::Error>>> + Send;

    fn find_by_id(&self, id: Uuid) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send;

    /// Returns one page of books along with the total number of books
    fn list(&self, query: ListQuery) -> impl Future<Output = Result<BookPage, Self::Error>> + Send;

    /// Validates the fields present and applies them. `None` if no such book exists.
    fn update_by_id(
        &self,
        id: Uuid,
        fields: BookFields,
    ) -> impl Future<Output = Result<Option<Book>, RepoError<Self::Error>>> + Send;

    /// Returns the book that was deleted, or `None` if it didn't exist
    fn delete_by_id(&self, id: Uuid) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send;
}
