use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use losk_core::Scanner;
use tracing::debug;

use crate::error::{Error, LoskResult};
use crate::interpreter::Interpreter;
use crate::parser::Parser;

/// One run context: a script execution or a whole REPL session. The global environment lives as
/// long as the session does, so later runs see what earlier runs defined.
pub struct Session {
    interpreter: Interpreter,
}

impl Session {
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        Session {
            interpreter: Interpreter::new(stdout),
        }
    }

    /// Scans, parses and executes `src`.
    ///
    /// Scanner diagnostics don't stop the parser, so a single run can report both kinds of
    /// static errors. If there are any, nothing is executed. Otherwise the program runs until it
    /// finishes or hits its first runtime error.
    pub fn run(&mut self, src: &str) -> LoskResult<()> {
        let (tokens, scan_errors) = Scanner::scan(src);
        let mut errors: Vec<Error> = scan_errors.into_iter().map(Error::from).collect();

        let parsed = Parser::new(&tokens).parse();
        let stmts = match parsed {
            Ok(stmts) if errors.is_empty() => stmts,
            Ok(_) => return Err(errors),
            Err(parse_errors) => {
                errors.extend(parse_errors);
                return Err(errors);
            }
        };

        debug!(statements = stmts.len(), "executing");
        self.interpreter.interpret(&stmts).map_err(|err| vec![err])
    }
}
