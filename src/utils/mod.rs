//! Various helper functions.
pub mod test_helper;
