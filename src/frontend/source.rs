use std::fmt;

use derive_more::TryFrom;

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFrom)]
#[try_from(repr)]
#[repr(u8)]
pub enum Command {
    Movr = b'>',
    Movl = b'<',
    Incr = b'+',
    Decr = b'-',
    Writ = b'.',
    Read = b',',
    JmpF = b'[',
    JmpB = b']',
}

impl Command {
    pub fn symbol(self) -> char {
        self as u8 as char
    }
}

/// Location of a byte in the source. `offset` counts bytes from zero,
/// `line` and `column` count from one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Walks program bytes once, yielding every command together with where it
/// was found. Anything that isn't a command is counted and skipped.
pub struct SourceCursor<'a> {
    bytes: std::slice::Iter<'a, u8>,
    position: Position,
    comments: usize,
}

impl<'a> SourceCursor<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        SourceCursor {
            bytes: source.iter(),
            position: Position::START,
            comments: 0,
        }
    }

    /// Number of non-command bytes skipped so far.
    pub fn comments(&self) -> usize {
        self.comments
    }

    fn advance(&mut self, byte: u8) -> Position {
        let here = self.position;

        self.position.offset += 1;
        if byte == b'\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }

        here
    }
}

impl Iterator for SourceCursor<'_> {
    type Item = (Position, Command);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let byte = *self.bytes.next()?;
            let here = self.advance(byte);

            match Command::try_from(byte) {
                Ok(command) => return Some((here, command)),
                Err(_) => self.comments += 1,
            }
        }
    }
}
