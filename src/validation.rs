use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{BookChanges, BookFields, NewBook};

const MAX_TITLE_CHARS: usize = 200;
const MAX_AUTHOR_CHARS: usize = 100;
const MAX_GENRE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// One message per field that failed validation, in field order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed for {} field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|e| e.message.clone()).collect()
    }
}

struct TextRule {
    field: &'static str,
    required: &'static str,
    too_long: &'static str,
    max_chars: usize,
}

const TITLE: TextRule = TextRule {
    field: "title",
    required: "Title is required",
    too_long: "Title cannot exceed 200 characters",
    max_chars: MAX_TITLE_CHARS,
};

const AUTHOR: TextRule = TextRule {
    field: "author",
    required: "Author is required",
    too_long: "Author name cannot exceed 100 characters",
    max_chars: MAX_AUTHOR_CHARS,
};

const GENRE: TextRule = TextRule {
    field: "genre",
    required: "Genre is required",
    too_long: "Genre cannot exceed 50 characters",
    max_chars: MAX_GENRE_CHARS,
};

/// Collects per-field failures while the fields are checked one by one
#[derive(Default)]
struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    fn fail(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    fn text(&mut self, rule: &TextRule, value: Option<&str>) -> Option<String> {
        let trimmed = value.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            self.fail(rule.field, rule.required);
            None
        } else if trimmed.chars().count() > rule.max_chars {
            self.fail(rule.field, rule.too_long);
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn published_date(&mut self, value: Option<&str>, today: NaiveDate) -> Option<NaiveDate> {
        let trimmed = value.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            self.fail("publishedDate", "Published date is required");
            return None;
        }
        match parse_date(trimmed) {
            None => {
                self.fail("publishedDate", "Published date must be a valid date");
                None
            }
            Some(date) if date > today => {
                self.fail("publishedDate", "Published date cannot be in the future");
                None
            }
            Some(date) => Some(date),
        }
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// Accepts a plain calendar date or a full RFC 3339 timestamp
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).date_naive())
        })
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl BookFields {
    /// Names of the fields that are absent or empty, in the order they are reported
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("genre", &self.genre),
            ("publishedDate", &self.published_date),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn into_new_book(self, today: NaiveDate) -> Result<NewBook, ValidationErrors> {
        let mut validator = Validator::default();
        let title = validator.text(&TITLE, self.title.as_deref());
        let author = validator.text(&AUTHOR, self.author.as_deref());
        let genre = validator.text(&GENRE, self.genre.as_deref());
        let published_date = validator.published_date(self.published_date.as_deref(), today);

        match (title, author, genre, published_date) {
            (Some(title), Some(author), Some(genre), Some(published_date)) => Ok(NewBook {
                id: Uuid::new_v4(),
                title,
                author,
                genre,
                published_date,
            }),
            _ => Err(ValidationErrors(validator.errors)),
        }
    }

    /// Validates only the fields that are present
    pub fn into_changes(self, today: NaiveDate) -> Result<BookChanges, ValidationErrors> {
        let mut validator = Validator::default();
        let title = self.title.map(|v| validator.text(&TITLE, Some(v.as_str())));
        let author = self.author.map(|v| validator.text(&AUTHOR, Some(v.as_str())));
        let genre = self.genre.map(|v| validator.text(&GENRE, Some(v.as_str())));
        let published_date = self
            .published_date
            .map(|v| validator.published_date(Some(v.as_str()), today));

        validator.into_result()?;

        Ok(BookChanges {
            title: title.flatten(),
            author: author.flatten(),
            genre: genre.flatten(),
            published_date: published_date.flatten(),
        })
    }
}
