use crate::frontend::token::Location;

/// A parse error with the location of the token that caused it. The parser
/// collects these and keeps going, so one pass can report several.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    pub location: Location,
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for ParserError {}
