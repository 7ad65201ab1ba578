use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use losk_core::Token;

use crate::error::Error;
use crate::value::Value;

/// One scope frame. Frames are shared through `Rc<RefCell<_>>` because a closure can keep the
/// frame it was declared in alive after the block that created the frame has finished.
#[derive(Debug, Default)]
pub(crate) struct Environment {
    enclosing: Option<Rc<RefCell<Environment>>>,
    values: AHashMap<String, Value>,
}

impl Environment {
    pub(crate) fn new() -> Self {
        Environment {
            enclosing: None,
            values: AHashMap::new(),
        }
    }

    pub(crate) fn with(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            enclosing: Some(enclosing),
            values: AHashMap::new(),
        }
    }

    // Defining an existing name in the same frame simply overwrites it
    pub(crate) fn define(&mut self, key: &str, value: Value) {
        self.values.insert(String::from(key), value);
    }

    pub(crate) fn get(&self, name: &Token) -> Result<Value, Error> {
        if let Some(val) = self.values.get(&name.lexeme) {
            Ok(val.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(Error::undefined_variable(name))
        }
    }

    /// Overwrites the nearest existing binding. Assignment never creates a binding.
    pub(crate) fn assign(&mut self, name: &Token, value: Value) -> Result<(), Error> {
        if let Some(val) = self.values.get_mut(&name.lexeme) {
            *val = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Error::undefined_variable(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use losk_core::{Literal, Token, Type};
    use pretty_assertions::assert_eq;

    use crate::env::Environment;
    use crate::error::FaultKind;
    use crate::value::Value;

    fn name(lexeme: &str) -> Token {
        Token::new(Type::Identifier, String::from(lexeme), 4, 0, 0, Literal::Nil)
    }

    #[test]
    fn test_define_and_get() {
        let mut env = Environment::new();
        env.define("foo", Value::from("bar"));
        env.define("baz", Value::from(false));

        assert_eq!(env.get(&name("foo")), Ok(Value::from("bar")));
        assert_eq!(env.get(&name("baz")), Ok(Value::from(false)));

        env.define("foo", Value::from(1));
        assert_eq!(env.get(&name("foo")), Ok(Value::from(1)));
    }

    #[test]
    fn test_throw_error_if_undefined() {
        let mut env = Environment::new();

        let err = env.assign(&name("foo"), Value::from("bar")).unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Name));
        assert_eq!(err.to_string(), "at line 4: Undefined variable 'foo'.");

        // the failed assignment must not have created a binding
        assert!(env.get(&name("foo")).is_err());
    }

    #[test]
    fn test_multi_level() {
        let env1 = Rc::new(RefCell::new(Environment::new()));
        env1.borrow_mut().define("foo", Value::from("bar"));
        env1.borrow_mut().define("outer", Value::from(1));

        {
            let mut env2 = Environment::with(env1.clone());
            env2.define("foo", Value::from("foofoo"));
            assert_eq!(env2.get(&name("foo")), Ok(Value::from("foofoo")));
            assert_eq!(env2.get(&name("outer")), Ok(Value::from(1)));

            env2.assign(&name("outer"), Value::from(false)).unwrap();
            env2.assign(&name("foo"), Value::Nil).unwrap();
        }

        // the shadowing binding took the assignment, the outer one was left alone
        assert_eq!(env1.borrow().get(&name("foo")), Ok(Value::from("bar")));
        assert_eq!(env1.borrow().get(&name("outer")), Ok(Value::from(false)));
    }
}
