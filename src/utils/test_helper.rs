//! Helper functions used by the unit tests.
//!
//! **Note**: This module is only compiled during testing.
