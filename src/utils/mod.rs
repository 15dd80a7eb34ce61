//! Various unsorted utilities.

pub mod morton;
