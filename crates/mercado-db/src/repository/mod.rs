//! # Repository Module
//!
//! Database repository implementations for Mercado.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CLI command                                                            │
//! │       │  db.products().list("arroz")                                    │
//! │       ▼                                                                 │
//! │  ProductRepository / CustomerRepository / OrderRepository               │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Writes that must be atomic with other writes (checkout) take a         │
//! │  `&mut SqliteConnection` from the caller's transaction instead.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD, stock
//! - [`CustomerRepository`](customer::CustomerRepository) - Registration, login, profile
//! - [`OrderRepository`](order::OrderRepository) - Order history and detail

pub mod customer;
pub mod order;
pub mod product;

/// Escapes LIKE wildcards in user input and wraps it for substring match.
///
/// Use with `LIKE ? ESCAPE '\'`.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("arroz"), "%arroz%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(""), "%%");
    }
}
