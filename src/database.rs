use bb8::Pool;
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{
    pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{
    Book, BookChanges, BookFields, BookPage, ListQuery, NewBook, SortField, SortOrder,
};
use crate::repo::{BookRepo, RepoError};
use crate::schema::books;
use crate::validation::today;

pub type DBPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Connections are opened on first use, so the server can start while the DB is down
pub fn create_db_pool(connection_string: String) -> DBPool {
    let config =
        AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(connection_string);
    Pool::builder().build_unchecked(config)
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("problem getting a connection from the connection pool: {0}")]
    PoolError(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),
    #[error("problem executing a statement against the DB: {0}")]
    ResultError(#[from] diesel::result::Error),
}

impl From<DatabaseError> for RepoError<DatabaseError> {
    fn from(error: DatabaseError) -> Self {
        RepoError::Store(error)
    }
}

#[derive(Clone)]
pub struct DatabaseBookRepo {
    pool: DBPool,
}

impl DatabaseBookRepo {
    pub fn new(pool: DBPool) -> Self {
        DatabaseBookRepo { pool }
    }

    async fn insert(&self, new_book: NewBook) -> Result<Book, DatabaseError> {
        let mut conn = self.pool.get().await?;

        let inserted_book = diesel::insert_into(books::table)
            .values(new_book)
            .returning(Book::as_returning())
            .get_result(&mut conn)
            .await?;

        Ok(inserted_book)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: BookChanges,
    ) -> Result<Option<Book>, DatabaseError> {
        let mut conn = self.pool.get().await?;

        let updated_book = diesel::update(books::table.find(id))
            .set((changes, books::updated_at.eq(Utc::now())))
            .returning(Book::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;

        Ok(updated_book)
    }
}

/// Orders a boxed query by `$column` in the requested direction
macro_rules! order_by {
    ($query:expr, $column:expr, $order:expr) => {
        match $order {
            SortOrder::Asc => $query.order($column.asc()),
            SortOrder::Desc => $query.order($column.desc()),
        }
    };
}

impl BookRepo for DatabaseBookRepo {
    type Error = DatabaseError;

    async fn create(&self, fields: BookFields) -> Result<Book, RepoError<DatabaseError>> {
        let new_book = fields.into_new_book(today())?;
        Ok(self.insert(new_book).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, DatabaseError> {
        let mut conn = self.pool.get().await?;

        let maybe_book = books::table
            .find(id)
            .select(Book::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(maybe_book)
    }

    async fn list(&self, query: ListQuery) -> Result<BookPage, DatabaseError> {
        let mut conn = self.pool.get().await?;

        let select = books::table.select(Book::as_select()).into_boxed();
        let sorted = match query.sort_by {
            SortField::Title => order_by!(select, books::title, query.sort_order),
            SortField::Author => order_by!(select, books::author, query.sort_order),
            SortField::Genre => order_by!(select, books::genre, query.sort_order),
            SortField::PublishedDate => {
                order_by!(select, books::published_date, query.sort_order)
            }
            SortField::CreatedAt => order_by!(select, books::created_at, query.sort_order),
            SortField::UpdatedAt => order_by!(select, books::updated_at, query.sort_order),
        };

        let books = sorted
            .then_order_by(books::id.asc())
            .offset(query.offset())
            .limit(query.limit)
            .load(&mut conn)
            .await?;

        let total = books::table.count().get_result::<i64>(&mut conn).await?;

        Ok(BookPage { books, total })
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        fields: BookFields,
    ) -> Result<Option<Book>, RepoError<DatabaseError>> {
        let changes = fields.into_changes(today())?;
        Ok(self.update(id, changes).await?)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Book>, DatabaseError> {
        let mut conn = self.pool.get().await?;

        let deleted_book = diesel::delete(books::table.find(id))
            .returning(Book::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;

        Ok(deleted_book)
    }
}
