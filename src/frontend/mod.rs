pub mod source;

pub use source::{Command, Position, SourceCursor};
