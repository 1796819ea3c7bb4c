//! Grammar productions, split by level.

mod section;
mod value;
