use crate::position::Position;

/// Any error surfaced by the front-end.
///
/// Errors are grouped by the analysis phase that raises them; the
/// `*Conditions` groups are raised at construction time when the grammar is
/// misconfigured for the active runtime conditions, the remaining groups
/// during analysis. Each analysis error carries the position it was raised
/// at; condition errors carry the offending tag or type name instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    LexicalConditions(#[from] LexicalConditionsError),
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    SyntacticConditions(#[from] SyntacticConditionsError),
    #[error(transparent)]
    Syntactic(#[from] SyntacticError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

/// Lexer misconfiguration for the active runtime conditions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexicalConditionsError {
    #[error("{0}: Lexical Conditions Error: Missing indenting or dedenting terminal tag.")]
    MissingOffside(&'static str),
    #[error("{0}: Lexical Conditions Error: Multiple indenting terminal tags.")]
    MultipleIndents(&'static str),
    #[error("{0}: Lexical Conditions Error: Multiple dedenting terminal tags.")]
    MultipleDedents(&'static str),
}

/// Lexical error processing an input file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexicalError {
    #[error(
        "{position}: Lexical Error: Could not derive any terminal tag.{}",
        closest_matches_suffix(.closest_matches)
    )]
    NoTerminalTag {
        position: Position,
        /// Tags whose automata survived the longest before dying.
        closest_matches: Vec<&'static str>,
    },
    #[error("{0}: Lexical Error: Indentation does not match.")]
    IndentationMismatch(Position),
}

/// Parser misconfiguration for the active runtime conditions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntacticConditionsError {
    #[error("Syntactic Conditions Error: Could not determine starting symbol.")]
    NoStart,
    #[error("{0}: Syntactic Conditions Error: Multiple starting symbols.")]
    MultipleStarts(&'static str),
}

/// Syntactic error processing an input file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntacticError {
    #[error("{0}: Syntactic Error: Could not derive input from any production rule.")]
    NoDerivation(Position),
}

/// Semantic error raised by a library or user pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticError {
    #[error("{0}: Semantic Error: Unexpected grammar ambiguity.")]
    AmbiguousGrammar(Position),
    #[error("{position}: Semantic Error: Duplicate definition of symbol '{name}', first defined at {first_position}.")]
    DuplicateSymbolDefinition {
        position: Position,
        name: String,
        first_position: Position,
    },
    #[error("{position}: Semantic Error: Undefined symbol '{name}', first referenced at {first_position}.")]
    UndefinedSymbol {
        position: Position,
        name: String,
        first_position: Position,
    },
}

/// A non-fatal diagnostic mirroring the error taxonomy.
///
/// The core never emits warnings on its own; downstream passes construct
/// them and decide how to report them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    #[error("{position}: Semantic Warning: {description}")]
    Semantic {
        position: Position,
        description: String,
    },
    #[error("{name}: {phase} Conditions Warning: {description}")]
    Conditions {
        /// Tag or type the warning refers to.
        name: &'static str,
        phase: &'static str,
        description: String,
    },
}

fn closest_matches_suffix(closest_matches: &[&'static str]) -> String {
    if closest_matches.is_empty() {
        String::new()
    } else {
        format!(" Closest matches: {}.", closest_matches.join(", "))
    }
}
