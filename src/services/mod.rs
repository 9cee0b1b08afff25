//! Database operations behind the HTTP handlers.
//!
//! Functions take a `rusqlite::Connection` checked out of the pool; anything
//! that touches more than one row for a single logical change runs in a
//! transaction and therefore takes `&mut Connection`.

pub mod blogs;
pub mod comments;
pub mod likes;
pub mod query;
pub mod users;
