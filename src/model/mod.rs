//! All the data types of the application, in three layers:
//!
//! - `common`: types shared between the API and the database.
//! - `api`: types as they appear on the wire.
//! - `db`: types as they are stored, plus the `mongodb` plumbing.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
