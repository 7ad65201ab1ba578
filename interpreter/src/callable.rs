use std::cell::RefCell;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::FunctionDecl;
use crate::env::Environment;
use crate::error::Error;
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

#[derive(Debug, PartialEq)]
pub(crate) enum CallableType {
    Function,
    Native,
}

pub(crate) trait Callable {
    fn ty(&self) -> CallableType;
    fn name(&self) -> &str;
    fn arity(&self) -> usize;

    /// Runs the callable. The interpreter has already checked that `args.len()` equals
    /// `arity()`.
    fn call(self: Rc<Self>, interpreter: &mut Interpreter, args: Vec<Value>)
        -> Result<Value, Error>;
}

impl Debug for dyn Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{:?} {}/{}>", self.ty(), self.name(), self.arity())
    }
}

impl Display for dyn Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.ty() {
            CallableType::Function => write!(f, "<fn {}>", self.name()),
            CallableType::Native => write!(f, "<native fn {}>", self.name()),
        }
    }
}

pub(crate) type BoxedFunction = Box<dyn Fn(&[Value]) -> Value>;

// `Native` bridges the native rust calls and the Losk interpreter environment.
// This implements callable and all of these trait objects will live in the global namespace.
pub(crate) struct Native {
    func: BoxedFunction,
    name: String,
    arity: usize,
}

impl Native {
    pub(crate) fn new(func: BoxedFunction, name: &str, arity: usize) -> Self {
        Self {
            func,
            name: String::from(name),
            arity,
        }
    }

    /// `clock()`: seconds since the Unix epoch, as a number.
    pub(crate) fn clock() -> Self {
        let clock: BoxedFunction = Box::new(|_| {
            let since_epoch = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs_f64())
                .unwrap_or_default();
            Value::Num(since_epoch)
        });

        Native::new(clock, "clock", 0)
    }
}

impl Callable for Native {
    fn ty(&self) -> CallableType {
        CallableType::Native
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(self: Rc<Self>, _: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
        Ok((self.func)(&args))
    }
}

/// A user function together with the environment it was declared in.
pub(crate) struct Function {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
}

impl Function {
    // The declaration is shared with the syntax tree instead of being copied, so declaring the
    // same function many times (e.g. inside a loop) only bumps a reference count.
    pub(crate) fn new(declaration: Rc<FunctionDecl>, closure: Rc<RefCell<Environment>>) -> Self {
        Function {
            declaration,
            closure,
        }
    }
}

impl Callable for Function {
    fn ty(&self) -> CallableType {
        CallableType::Function
    }

    fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        // Each call gets a fresh frame whose parent is the declaring frame, not the caller's
        let mut env = Environment::with(Rc::clone(&self.closure));
        for (param, arg) in self.declaration.params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }

        let flow =
            interpreter.execute_block_with_env(&self.declaration.body, Rc::new(RefCell::new(env)))?;
        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}
