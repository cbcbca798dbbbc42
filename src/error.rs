//! Error types returned by routing-table operations.

use thiserror::Error;

use crate::Family;

/// A failed lookup or modification.
///
/// Failing operations leave the tree untouched. Queries never fail just
/// because nothing matched; they return empty results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RibError {
    /// The textual prefix or address could not be parsed.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// The prefix belongs to the wrong address family for this table.
    #[error("{prefix} is not an {family} prefix")]
    FamilyMismatch {
        /// The offending input text.
        prefix: String,
        /// The family the table is bound to.
        family: Family,
    },

    /// The operation requires the prefix to be installed, but it is not.
    #[error("no exact match for {0}")]
    UnknownPrefix(String),

    /// An attribute-filtered delete did not match any installed route.
    #[error("no route for {prefix} with the given attributes")]
    NoMatchingRoute {
        /// The canonical prefix the delete was aimed at.
        prefix: String,
    },

    /// The prefix of a route cannot be changed after construction.
    #[error("the prefix of a route is immutable")]
    ImmutableAttribute,
}
