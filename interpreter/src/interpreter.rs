use std::cell::RefCell;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use losk_core::{Literal, Token, Type};
use tracing::trace;

use crate::ast::{Expr, ExprVisitor, FunctionDecl, Stmt, StmtVisitor};
use crate::callable::{Function, Native};
use crate::env::Environment;
use crate::error::{Error, FaultKind};
use crate::limits::MAX_CALL_DEPTH;
use crate::parser::StmtStream;
use crate::value::Value;

/// How a statement finished. `Return` travels up through enclosing blocks and loops, skipping
/// whatever is left in them, until the function call that is running them turns it into the
/// call's value.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
}

type ExprResult = Result<Value, Error>;
type StmtResult = Result<Flow, Error>;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    env: Rc<RefCell<Environment>>,
    stdout: Rc<RefCell<dyn Write>>,

    // number of user and native calls currently running
    depth: usize,
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("clock", Value::Callable(Rc::new(Native::clock())));

        Interpreter {
            env: Rc::clone(&globals),
            globals,
            stdout,
            depth: 0,
        }
    }

    /// Runs a program against the global environment, which persists across calls. The first
    /// runtime error stops the program. A `return` at the top level quietly ends it.
    pub fn interpret(&mut self, stmts: &StmtStream) -> Result<(), Error> {
        // Statements always run against the globals here, even if an earlier program failed
        // halfway through a call
        self.env = Rc::clone(&self.globals);
        self.depth = 0;

        for stmt in &stmts.0 {
            if let Flow::Return(_) = self.visit_stmt(stmt)? {
                break;
            }
        }

        Ok(())
    }

    /// Runs `stmts` with `env` as the current scope, putting the previous scope back afterwards,
    /// whether the statements finished, returned or failed.
    pub(crate) fn execute_block_with_env(
        &mut self,
        stmts: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> StmtResult {
        let previous = mem::replace(&mut self.env, env);
        let result = self.execute_statements(stmts);
        self.env = previous;
        result
    }

    fn execute_statements(&mut self, stmts: &[Stmt]) -> StmtResult {
        for stmt in stmts {
            if let flow @ Flow::Return(_) = self.visit_stmt(stmt)? {
                return Ok(flow);
            }
        }

        Ok(Flow::Normal)
    }

    fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64), Error> {
        match (left, right) {
            (Value::Num(left), Value::Num(right)) => Ok((*left, *right)),
            _ => Err(Error::type_error(operator, "Operands must be numbers.")),
        }
    }
}

impl ExprVisitor for Interpreter {
    type Output = ExprResult;

    fn visit_assign(&mut self, name: &Token, value: &Expr) -> ExprResult {
        let value = self.visit_expr(value)?;
        self.env.borrow_mut().assign(name, value.clone())?;
        Ok(value)
    }

    fn visit_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> ExprResult {
        let left = self.visit_expr(left)?;
        let right = self.visit_expr(right)?;

        match operator.ty {
            Type::EqualEqual => Ok(Value::from(left == right)),
            Type::BangEqual => Ok(Value::from(left != right)),
            Type::Plus => match (left, right) {
                (Value::Num(left), Value::Num(right)) => Ok(Value::from(left + right)),
                (Value::Str(left), Value::Str(right)) => {
                    let mut joined = String::with_capacity(left.len() + right.len());
                    joined.push_str(&left);
                    joined.push_str(&right);
                    Ok(Value::from(joined))
                }
                _ => Err(Error::type_error(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },
            Type::Minus => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left - right))
            }
            Type::Slash => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left / right))
            }
            Type::Star => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left * right))
            }
            Type::Greater => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left > right))
            }
            Type::GreaterEqual => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left >= right))
            }
            Type::Less => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left < right))
            }
            Type::LessEqual => {
                let (left, right) = Self::number_operands(operator, &left, &right)?;
                Ok(Value::from(left <= right))
            }
            _ => Err(Error::type_error(operator, "Invalid binary operator.")),
        }
    }

    fn visit_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> ExprResult {
        let callee = self.visit_expr(callee)?;
        let mut evaluated_args = Vec::with_capacity(args.len());
        for arg in args {
            evaluated_args.push(self.visit_expr(arg)?);
        }

        let function = match callee {
            Value::Callable(function) => function,
            _ => return Err(Error::type_error(paren, "Can only call functions.")),
        };

        if function.arity() != evaluated_args.len() {
            return Err(Error::type_error(
                paren,
                &format!(
                    "Expected {} arguments but got {}.",
                    function.arity(),
                    evaluated_args.len()
                ),
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            return Err(Error::type_error(paren, "Stack overflow."));
        }

        trace!(
            name = function.name(),
            arity = function.arity(),
            depth = self.depth,
            "call"
        );

        self.depth += 1;
        let result = function.call(self, evaluated_args);
        self.depth -= 1;
        result
    }

    fn visit_grouping(&mut self, expression: &Expr) -> ExprResult {
        self.visit_expr(expression)
    }

    fn visit_literal(&mut self, value: &Literal) -> ExprResult {
        Ok(Value::from(value))
    }

    fn visit_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> ExprResult {
        let left = self.visit_expr(left)?;

        // The right operand is only evaluated when the left one doesn't already decide the
        // result. Either way the result is one of the operands, not a plain boolean.
        if operator.ty == Type::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }

        self.visit_expr(right)
    }

    fn visit_unary(&mut self, operator: &Token, right: &Expr) -> ExprResult {
        let right = self.visit_expr(right)?;
        match (operator.ty, right) {
            (Type::Minus, Value::Num(val)) => Ok(Value::from(-val)),
            (Type::Minus, _) => Err(Error::type_error(operator, "Operand must be a number.")),
            (Type::Bang, val) => Ok(Value::from(!val.is_truthy())),
            _ => Err(Error::type_error(operator, "Invalid unary operator.")),
        }
    }

    fn visit_variable(&mut self, name: &Token) -> ExprResult {
        self.env.borrow().get(name)
    }
}

impl StmtVisitor for Interpreter {
    type Output = StmtResult;

    fn visit_block(&mut self, statements: &[Stmt]) -> StmtResult {
        let env = Rc::new(RefCell::new(Environment::with(Rc::clone(&self.env))));
        self.execute_block_with_env(statements, env)
    }

    fn visit_expression(&mut self, expression: &Expr) -> StmtResult {
        self.visit_expr(expression)?;
        Ok(Flow::Normal)
    }

    fn visit_function(&mut self, declaration: &Rc<FunctionDecl>) -> StmtResult {
        let function = Function::new(Rc::clone(declaration), Rc::clone(&self.env));
        self.env
            .borrow_mut()
            .define(&declaration.name.lexeme, Value::Callable(Rc::new(function)));
        Ok(Flow::Normal)
    }

    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> StmtResult {
        if self.visit_expr(condition)?.is_truthy() {
            self.visit_stmt(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.visit_stmt(else_branch)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn visit_while(&mut self, condition: &Expr, body: &Stmt) -> StmtResult {
        while self.visit_expr(condition)?.is_truthy() {
            if let flow @ Flow::Return(_) = self.visit_stmt(body)? {
                return Ok(flow);
            }
        }

        Ok(Flow::Normal)
    }

    fn visit_print(&mut self, keyword: &Token, expression: &Expr) -> StmtResult {
        let value = self.visit_expr(expression)?;
        writeln!(RefCell::borrow_mut(&self.stdout), "{}", value).map_err(|err| {
            Error::runtime_error(
                FaultKind::Io,
                keyword,
                &format!("Failed to write output: {}.", err),
            )
        })?;
        Ok(Flow::Normal)
    }

    fn visit_return(&mut self, _: &Token, value: Option<&Expr>) -> StmtResult {
        let value = match value {
            Some(expr) => self.visit_expr(expr)?,
            None => Value::Nil,
        };
        Ok(Flow::Return(value))
    }

    fn visit_var(&mut self, name: &Token, init: Option<&Expr>) -> StmtResult {
        let value = match init {
            Some(expr) => self.visit_expr(expr)?,
            None => Value::Nil,
        };
        self.env.borrow_mut().define(&name.lexeme, value);
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::str;

    use losk_core::Scanner;
    use pretty_assertions::assert_eq;

    use crate::error::{Error, FaultKind};
    use crate::interpreter::Interpreter;
    use crate::parser::Parser;

    fn run(interpreter: &mut Interpreter, src: &str) -> Result<(), Error> {
        let (tokens, errors) = Scanner::scan(src);
        assert!(errors.is_empty(), "unexpected scanner errors: {:?}", errors);

        let parsed = Parser::new(&tokens)
            .parse()
            .unwrap_or_else(|errs| panic!("unexpected parser errors: {:?}", errs));
        interpreter.interpret(&parsed)
    }

    fn test_statements(src: &str, out: Option<&str>, err: Option<&str>) {
        println!("Testing source:\n{}", src);

        let output: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::new(output.clone());
        let result = run(&mut interpreter, src);

        match (result, err) {
            (Err(Error::RuntimeError { msg, .. }), Some(err)) => assert_eq!(err, msg),
            (Err(err), None) => panic!("Not expecting any error, found '{}'", err),
            (Ok(_), Some(err)) => panic!("Expecting an error '{}', found none.", err),
            (Err(err), Some(_)) => panic!("Expecting a runtime error, found '{}'", err),
            (Ok(_), None) => {}
        }

        if let Some(out) = out {
            assert_eq!(str::from_utf8(&output.borrow()).unwrap(), out);
        }
    }

    #[test]
    fn test_lox_programs() {
        let tests = [
            // binary and grouping expressions, with precedence
            ("print (1 + 2) * 5 + 2;", "17\n"),
            ("print 1 + 2;", "3\n"),
            ("print 10 / 4 - 1;", "1.5\n"),
            ("print \"a\" + \"b\";", "ab\n"),
            ("print \"hello \" + \"world\";", "hello world\n"),
            // logical expressions return one of their operands
            ("print false or true;", "true\n"),
            ("print nil or \"default\";", "default\n"),
            ("print 1 and 2;", "2\n"),
            ("print nil and 2;", "nil\n"),
            // unary expressions
            ("print !true;", "false\n"),
            ("print !nil;", "true\n"),
            ("print !0;", "false\n"),
            ("print -10.5;", "-10.5\n"),
            ("print --3;", "3\n"),
            // comparisons and equality
            ("print 1 < 2;", "true\n"),
            ("print 2 <= 1;", "false\n"),
            ("print nil == nil;", "true\n"),
            ("print \"a\" == \"a\";", "true\n"),
            ("print 1 == \"1\";", "false\n"),
            ("print 1 != 2;", "true\n"),
            ("print clock == clock;", "true\n"),
            // truthiness
            ("if (nil) print \"a\"; else print \"b\";", "b\n"),
            ("if (0) print \"a\"; else print \"b\";", "a\n"),
            ("if (\"\") print \"empty strings are truthy\";", "empty strings are truthy\n"),
            // variable declaration and assignment
            ("var foo = \"bar\"; print foo;", "bar\n"),
            ("var foo; print foo;", "nil\n"),
            ("var a = 1; var b = a = 2; print a + b;", "4\n"),
            ("var a = 1; var a = 2; print a;", "2\n"),
            // printing functions
            ("print clock;", "<native fn clock>\n"),
            ("fun foo() {} print foo;", "<fn foo>\n"),
            ("print clock() > 0;", "true\n"),
        ];

        for (src, expected) in tests {
            test_statements(src, Some(expected), None);
        }
    }

    #[test]
    fn test_scoping() {
        test_statements(
            "var x = 1; { var x = 2; print x; } print x;",
            Some("2\n1\n"),
            None,
        );

        // assignment inside a block reaches the outer binding
        test_statements(
            "var x = 1; { x = 2; { x = x + 1; } } print x;",
            Some("3\n"),
            None,
        );
    }

    #[test]
    fn test_loops() {
        test_statements(
            "for (var i = 0; i < 3; i = i + 1) print i;",
            Some("0\n1\n2\n"),
            None,
        );

        // the loop variable is scoped to the loop
        test_statements(
            "for (var i = 0; i < 1; i = i + 1) {} print i;",
            Some(""),
            Some("Undefined variable 'i'."),
        );

        test_statements(
            "var i = 3; while (i > 0) { print i; i = i - 1; }",
            Some("3\n2\n1\n"),
            None,
        );

        test_statements(
            "var n = 0; for (; n < 2;) n = n + 1; print n;",
            Some("2\n"),
            None,
        );
    }

    #[test]
    fn test_functions() {
        test_statements(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\
             print fib(15);",
            Some("610\n"),
            None,
        );

        test_statements(
            "fun noop() {} print noop();",
            Some("nil\n"),
            None,
        );

        test_statements(
            "fun early() { return; print \"unreachable\"; } print early();",
            Some("nil\n"),
            None,
        );

        // parameters shadow globals without touching them
        test_statements(
            "var a = \"global\"; fun f(a) { print a; } f(\"param\"); print a;",
            Some("param\nglobal\n"),
            None,
        );
    }

    #[test]
    fn test_return_unwinds_nested_blocks_and_loops() {
        test_statements(
            "fun find() {\
                 for (var i = 0; i < 10; i = i + 1) {\
                     while (true) {\
                         if (i == 3) { return i; }\
                         print i;\
                         i = i + 1;\
                     }\
                 }\
                 print \"unreachable\";\
             }\
             print find();",
            Some("0\n1\n2\n3\n"),
            None,
        );
    }

    #[test]
    fn test_closures() {
        test_statements(
            "fun makeCounter() {\
                 var count = 0;\
                 fun counter() { count = count + 1; return count; }\
                 return counter;\
             }\
             var c1 = makeCounter();\
             var c2 = makeCounter();\
             print c1(); print c1(); print c2();",
            Some("1\n2\n1\n"),
            None,
        );

        // two closures over the same frame share the variable
        test_statements(
            "var get; var set;\
             { var x = \"before\";\
               fun g() { return x; }\
               fun s(v) { x = v; }\
               get = g; set = s; }\
             set(\"after\"); print get();",
            Some("after\n"),
            None,
        );

        // an inner function sees the outer function's parameters after it returned
        test_statements(
            "fun adder(a) { fun add(b) { return a + b; } return add; }\
             print adder(1)(2);",
            Some("3\n"),
            None,
        );
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        test_statements(
            "var called = false;\
             fun touch() { called = true; return true; }\
             print true or touch();\
             print false and touch();\
             print called;",
            Some("true\nfalse\nfalse\n"),
            None,
        );
    }

    #[test]
    fn test_top_level_return_ends_program() {
        test_statements("print 1; return; print 2;", Some("1\n"), None);
    }

    #[test]
    fn test_binary_expression_with_wrong_types() {
        let tests = [
            ("print 1 + false;", "Operands must be two numbers or two strings."),
            ("print true + false;", "Operands must be two numbers or two strings."),
            ("print 1 + \"x\";", "Operands must be two numbers or two strings."),
            ("print \"hello\" + 10;", "Operands must be two numbers or two strings."),
            ("print \"a\" - \"b\";", "Operands must be numbers."),
            ("print \"a\" < \"b\";", "Operands must be numbers."),
            ("print nil * 2;", "Operands must be numbers."),
        ];

        for (src, expected) in tests {
            test_statements(src, None, Some(expected));
        }
    }

    #[test]
    fn test_unary_expression_with_wrong_types() {
        test_statements("-false;", None, Some("Operand must be a number."));
        test_statements("-\"x\";", None, Some("Operand must be a number."));
    }

    #[test]
    fn test_use_of_undefined_variable() {
        test_statements(
            "var foo = \"bar\";\
                 print bar;",
            None,
            Some("Undefined variable 'bar'."),
        );
        test_statements("x = 1;", None, Some("Undefined variable 'x'."));
    }

    #[test]
    fn test_runtime_error_keeps_earlier_output() {
        test_statements(
            "print \"first\"; print nope; print \"never\";",
            Some("first\n"),
            Some("Undefined variable 'nope'."),
        );
    }

    #[test]
    fn test_calling_non_callable() {
        test_statements("\"str\"();", None, Some("Can only call functions."));
        test_statements("var x = 1; x();", None, Some("Can only call functions."));
    }

    #[test]
    fn test_native_functions() {
        test_statements("clock();", None, None);
    }

    #[test]
    fn test_native_functions_with_wrong_argument_number() {
        test_statements("clock(1);", None, Some("Expected 0 arguments but got 1."))
    }

    #[test]
    fn test_arity_error_points_at_call_site() {
        let output = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut interpreter = Interpreter::new(output);
        let err = run(&mut interpreter, "fun f() {}\n\nf(1);").unwrap_err();

        assert_eq!(err.fault_kind(), Some(FaultKind::Type));
        assert_eq!(err.line(), 3);
        assert_eq!(err.to_string(), "at line 3: Expected 0 arguments but got 1.");
    }

    #[test]
    fn test_globals_persist_and_scope_recovers_after_error() {
        let output: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::new(output.clone());

        run(&mut interpreter, "var x = \"global\";").unwrap();
        let err = run(&mut interpreter, "{ var x = \"local\"; print missing; }").unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Name));

        run(&mut interpreter, "print x;").unwrap();
        assert_eq!(str::from_utf8(&output.borrow()).unwrap(), "global\n");
    }

    #[test]
    fn test_runaway_recursion_is_a_runtime_error() {
        test_statements(
            "fun forever(n) { return forever(n + 1); } forever(0);",
            None,
            Some("Stack overflow."),
        );
    }

    #[test]
    fn test_deep_recursion() {
        test_statements(
            "fun count(n) { if (n == 0) return 0; return 1 + count(n - 1); }\
             print count(300);\
             print count(5000);",
            Some("300\n5000\n"),
            None,
        );
    }

    #[test]
    fn test_long_operator_chains() {
        let sum = vec!["1"; 20_000].join(" + ");
        test_statements(&format!("print {};", sum), Some("20000\n"), None);

        let negations = format!("print {}1;", "-".repeat(1000));
        test_statements(&negations, Some("1\n"), None);
    }
}
