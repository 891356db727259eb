use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// A position in an input file.
///
/// Positions are shared by handle ([`PositionId`]) through a [`Positions`]
/// arena. Two handles are equal only when they refer to the same slot, even
/// if the slots carry identical values; code that needs value comparison
/// must resolve the handles first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub filename: Rc<str>,
    /// 0-indexed byte offset in the input.
    pub index: usize,
    /// 1-indexed line of `index`.
    pub line: usize,
    /// 1-indexed column of `index`.
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// A stable handle into a [`Positions`] arena.
pub struct PositionId(pub(crate) usize);

/// Arena of [`Position`] slots owned by a lexer.
///
/// Inserting never deduplicates: value-equal positions stay distinct, which
/// preserves the handle-identity semantics the parser and the semantic
/// passes rely on.
#[derive(Debug, Default)]
pub struct Positions {
    slots: Vec<Position>,
}

impl Position {
    pub fn new(filename: Rc<str>) -> Self {
        Self {
            filename,
            index: 0,
            line: 1,
            column: 1,
        }
    }

    /// Advance past `ch`. A newline resets the column and bumps the line.
    pub fn advance(&mut self, ch: char) {
        self.index += ch.len_utf8();

        if ch != '\n' {
            self.column += 1;
        } else {
            self.line += 1;
            self.column = 1;
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

impl Positions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new slot holding `position` and return its handle.
    pub fn insert(&mut self, position: Position) -> PositionId {
        self.slots.push(position);
        PositionId(self.slots.len() - 1)
    }

    pub fn get(&self, id: PositionId) -> &Position {
        &self.slots[id.0]
    }

    /// Overwrite the slot behind `id` with the fields of `from`.
    ///
    /// Every handle pointing at `id` observes the change; this is how the
    /// lexer re-anchors its starting position onto the first terminal.
    pub fn update(&mut self, id: PositionId, from: &Position) {
        self.slots[id.0] = from.clone();
    }
}
