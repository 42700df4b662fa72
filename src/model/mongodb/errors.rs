//! The mongodb crate reports constraint violations only via numeric server
//! codes; this module names the ones we rely on.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a unique-index violation.
///
/// This is how the store tells us a second ballot, candidacy, or voter email
/// collided with an existing row; callers translate it into the specific
/// business-rule error for their operation.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}
