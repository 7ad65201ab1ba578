use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Unterminated block comment.")]
    UnterminatedBlockComment { line: usize },

    #[error("Unterminated string.")]
    UnterminatedString { line: usize },

    #[error("Unexpected character.")]
    UnexpectedCharacter { ch: char, line: usize },
}

impl Error {
    pub fn line(&self) -> usize {
        match self {
            Error::UnterminatedBlockComment { line } => *line,
            Error::UnterminatedString { line } => *line,
            Error::UnexpectedCharacter { line, .. } => *line,
        }
    }

    /// Where the error happened, in the same shape the parser uses for its diagnostics.
    pub fn location(&self) -> String {
        match self {
            Error::UnexpectedCharacter { ch, .. } => format!("at '{}'", ch),
            // both of these run off the end of the source
            Error::UnterminatedBlockComment { .. } | Error::UnterminatedString { .. } => {
                String::from("at end")
            }
        }
    }
}
