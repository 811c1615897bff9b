pub mod backend;
pub mod frontend;
pub mod test_helpers;
