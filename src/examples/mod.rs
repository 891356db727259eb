//! Example grammars exercising the engine end to end.
//!
//! Grammars are ordinary Rust values: a tag registry for a [`Lexer`](crate::Lexer)
//! plus [`INonterminalType`](crate::INonterminalType) implementations for a
//! [`Parser`](crate::Parser). These examples double as the fixtures of the
//! crate's test suite.

pub mod ambiguous;
pub mod blocks;
pub mod calc;
pub mod mutual;

#[cfg(test)]
mod __tests__;
