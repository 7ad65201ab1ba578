use losk_core::{Error as CoreError, Token};
use thiserror::Error;

/// Runtime fault categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A variable was read or assigned without being declared anywhere in the scope chain.
    Name,
    /// Operand types, call arity, calling a non-callable and stack exhaustion.
    Type,
    /// Printed output could not be written.
    Io,
}

#[derive(Debug, Error, PartialEq, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("{location} on line {line}: {source}")]
    ScannerError {
        line: usize,
        location: String,
        source: CoreError,
    },

    #[error("{location} on line {line}: {msg}")]
    ParserError {
        token: Token,

        // line is copied from token, this is required because thiserror doesn't support field
        // access, e.g {token.line:?}, in error strings
        line: usize,
        location: String,
        msg: String,
    },

    #[error("at line {line}: {msg}")]
    RuntimeError {
        kind: FaultKind,
        token: Token,
        line: usize,
        msg: String,
    },
}

impl Error {
    pub(crate) fn parser_error(token: &Token, msg: &str) -> Self {
        let location = if token.is_eof() {
            String::from("at end")
        } else {
            format!("at '{}'", token.lexeme)
        };

        Error::ParserError {
            token: token.clone(),
            line: token.line,
            location,
            msg: String::from(msg),
        }
    }

    pub(crate) fn runtime_error(kind: FaultKind, token: &Token, msg: &str) -> Self {
        Error::RuntimeError {
            kind,
            token: token.clone(),
            line: token.line,
            msg: String::from(msg),
        }
    }

    pub(crate) fn type_error(token: &Token, msg: &str) -> Self {
        Error::runtime_error(FaultKind::Type, token, msg)
    }

    pub(crate) fn undefined_variable(name: &Token) -> Self {
        Error::runtime_error(
            FaultKind::Name,
            name,
            &format!("Undefined variable '{}'.", name.lexeme),
        )
    }

    /// Scanner and parser errors stop a program before it runs.
    pub fn is_static(&self) -> bool {
        !matches!(self, Error::RuntimeError { .. })
    }

    pub fn line(&self) -> usize {
        match self {
            Error::ScannerError { line, .. }
            | Error::ParserError { line, .. }
            | Error::RuntimeError { line, .. } => *line,
        }
    }

    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Error::RuntimeError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::ScannerError { source, .. } => source.to_string(),
            Error::ParserError { msg, .. } | Error::RuntimeError { msg, .. } => msg.clone(),
        }
    }

    /// Process exit status for a program that failed with this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_static() {
            65
        } else {
            70
        }
    }
}

impl From<CoreError> for Error {
    fn from(value: CoreError) -> Self {
        Error::ScannerError {
            line: value.line(),
            location: value.location(),
            source: value,
        }
    }
}

pub type LoskResult<T> = Result<T, Vec<Error>>;

/// Process exit status for a run that failed with `errors`: static errors win because a program
/// that has them never starts running.
pub fn exit_code(errors: &[Error]) -> i32 {
    if errors.iter().any(Error::is_static) {
        65
    } else if errors.is_empty() {
        0
    } else {
        70
    }
}

#[cfg(test)]
mod tests {
    use losk_core::{Error as CoreError, Literal, Token, Type};
    use pretty_assertions::assert_eq;

    use crate::error::{Error, FaultKind};

    #[test]
    fn test_static_error_format() {
        let token = Token::new(Type::SemiColon, String::from(";"), 3, 10, 4, Literal::Nil);
        let err = Error::parser_error(&token, "Expect expression.");
        assert_eq!(err.to_string(), "at ';' on line 3: Expect expression.");
        assert_eq!(err.exit_code(), 65);

        let eof = Token::new(Type::Eof, String::new(), 7, 50, 12, Literal::Nil);
        let err = Error::parser_error(&eof, "Expect ';' after value.");
        assert_eq!(err.to_string(), "at end on line 7: Expect ';' after value.");

        let err = Error::from(CoreError::UnexpectedCharacter { ch: '@', line: 2 });
        assert_eq!(err.to_string(), "at '@' on line 2: Unexpected character.");
        assert!(err.is_static());
    }

    #[test]
    fn test_runtime_error_format() {
        let token = Token::new(Type::Identifier, String::from("foo"), 5, 0, 0, Literal::Nil);
        let err = Error::undefined_variable(&token);
        assert_eq!(err.to_string(), "at line 5: Undefined variable 'foo'.");
        assert_eq!(err.fault_kind(), Some(FaultKind::Name));
        assert_eq!(err.exit_code(), 70);
    }
}
