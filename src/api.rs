use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    middleware::map_response_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{panic_response, render_unhandled, route_not_found, ApiError};
use crate::models::{
    Book, BookFields, DeletedBook, ListQuery, Pagination, SortField, SortOrder, Sorting,
};
use crate::repo::BookRepo;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Clone)]
struct AppState<R> {
    repo: R,
}

/// Every successful response carries a message and its data
#[derive(Debug, Serialize)]
struct Envelope<T> {
    message: &'static str,
    data: T,
}

#[derive(Debug, Serialize)]
struct BookData {
    book: Book,
}

#[derive(Debug, Serialize)]
struct BookListData {
    books: Vec<Book>,
    pagination: Pagination,
    sorting: Sorting,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedBookData {
    deleted_book: DeletedBook,
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

fn respond<T>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope { message, data })
}

pub fn build_app<R: BookRepo>(repo: R, config: &Config) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/books", get(list_books::<R>))
        .route("/books/add", post(add_book::<R>))
        .route(
            "/books/{id}",
            get(get_book::<R>)
                .put(update_book::<R>)
                .delete(delete_book::<R>),
        )
        .fallback(route_not_found)
        .with_state(AppState { repo })
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(map_response_with_state(config.environment, render_unhandled))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().cloned())
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn welcome() -> &'static str {
    "Welcome to the bookshelf API"
}

/// Reads `page`, `limit`, `sortBy` and `sortOrder`, falling back to their defaults
fn parse_list_query(params: &HashMap<String, String>) -> Result<ListQuery, ApiError> {
    let int_param = |name: &str, default: i64| match params.get(name).map(|v| v.trim()) {
        None | Some("") => Some(default),
        Some(value) => value.parse::<i64>().ok(),
    };

    let page = int_param("page", DEFAULT_PAGE)
        .filter(|page| *page >= 1)
        .ok_or(ApiError::InvalidPage)?;

    let limit = int_param("limit", DEFAULT_LIMIT)
        .filter(|limit| (1..=MAX_LIMIT).contains(limit))
        .ok_or(ApiError::InvalidLimit)?;

    let sort_by = match params.get("sortBy").filter(|name| !name.is_empty()) {
        None => SortField::CreatedAt,
        Some(name) => {
            SortField::parse(name).ok_or_else(|| ApiError::InvalidSortField(name.clone()))?
        }
    };

    let sort_order = SortOrder::parse(params.get("sortOrder").map(String::as_str));

    Ok(ListQuery {
        page,
        limit,
        sort_by,
        sort_order,
    })
}

fn parse_book_id(id: String) -> Result<Uuid, ApiError> {
    Uuid::parse_str(&id).map_err(|_| ApiError::InvalidId(id))
}

fn is_blank(body: &Bytes) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// An empty body counts as an empty object
fn parse_book_fields(body: &Bytes) -> Result<BookFields, ApiError> {
    if is_blank(body) {
        return Ok(BookFields::default());
    }
    serde_json::from_slice(body).map_err(ApiError::MalformedBody)
}

async fn list_books<R: BookRepo>(
    State(state): State<AppState<R>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<BookListData> {
    let query = parse_list_query(&params)?;

    let page = state
        .repo
        .list(query)
        .await
        .map_err(|e| ApiError::unexpected("Error retrieving books", e))?;

    info!(
        "Retrieved {} of {} books from the DB (page {}, limit {})",
        page.books.len(),
        page.total,
        query.page,
        query.limit
    );

    Ok(respond(
        "Books retrieved successfully",
        BookListData {
            books: page.books,
            pagination: Pagination::new(query.page, query.limit, page.total),
            sorting: Sorting {
                sort_by: query.sort_by.as_str(),
                sort_order: query.sort_order.as_str(),
            },
        },
    ))
}

async fn get_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> ApiResult<BookData> {
    let id = parse_book_id(id)?;

    let book = state
        .repo
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::unexpected("Error fetching book", e))?;

    match book {
        Some(book) => {
            info!("Retrieved book from DB: {:?}", book);
            Ok(respond("Book retrieved successfully", BookData { book }))
        }
        None => {
            info!("No book found in DB with ID: {}", id);
            Err(ApiError::NotFound(id))
        }
    }
}

async fn add_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<BookData>>), ApiError> {
    let fields = parse_book_fields(&body)?;

    let missing = fields.missing_fields();
    if !missing.is_empty() {
        info!("Rejected new book with missing fields: {:?}", missing);
        return Err(ApiError::MissingFields(missing));
    }

    let book = state
        .repo
        .create(fields)
        .await
        .map_err(|e| ApiError::from_repo("Error adding book", e))?;

    info!("Inserted book into the DB: {:?}", book);

    Ok((
        StatusCode::CREATED,
        respond("Book added successfully!", BookData { book }),
    ))
}

async fn update_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<BookData> {
    let id = parse_book_id(id)?;

    let object: Map<String, Value> = if is_blank(&body) {
        Map::new()
    } else {
        serde_json::from_slice(&body).map_err(ApiError::MalformedBody)?
    };
    if object.is_empty() {
        return Err(ApiError::EmptyUpdate);
    }
    let fields: BookFields =
        serde_json::from_value(Value::Object(object)).map_err(ApiError::MalformedBody)?;

    let updated_book = state
        .repo
        .update_by_id(id, fields)
        .await
        .map_err(|e| ApiError::from_repo("Error updating book", e))?;

    match updated_book {
        Some(book) => {
            info!("Updated book in DB: {:?}", book);
            Ok(respond("Book updated successfully", BookData { book }))
        }
        None => {
            info!("Tried to update non-existent book with ID: {}", id);
            Err(ApiError::NotFound(id))
        }
    }
}

async fn delete_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> ApiResult<DeletedBookData> {
    let id = parse_book_id(id)?;

    let deleted_book = state
        .repo
        .delete_by_id(id)
        .await
        .map_err(|e| ApiError::unexpected("Error deleting book", e))?;

    match deleted_book {
        Some(book) => {
            info!("Deleted book from DB with ID: {}", id);
            Ok(respond(
                "Book deleted successfully",
                DeletedBookData {
                    deleted_book: book.into(),
                },
            ))
        }
        None => {
            info!("Tried to delete non-existent book with ID: {}", id);
            Err(ApiError::NotFound(id))
        }
    }
}
