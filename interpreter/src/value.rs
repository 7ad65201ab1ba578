use std::fmt::{Display, Formatter};
use std::ptr;
use std::rc::Rc;

use losk_core::Literal;

use crate::callable::Callable;

#[derive(Debug, Clone)]
pub(crate) enum Value {
    Callable(Rc<dyn Callable>),
    Str(Rc<String>),
    Num(f64),
    Bool(bool),
    Nil,
}

impl Value {
    /// Only `nil` and `false` are falsy. Everything else is truthy, zero and the empty string
    /// included.
    pub(crate) fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl From<Literal> for Value {
    fn from(value: Literal) -> Self {
        match value {
            Literal::Str(val) => Value::Str(Rc::new(val)),
            Literal::Num(val) => Value::Num(val),
            Literal::Bool(val) => Value::Bool(val),
            Literal::Nil => Value::Nil,
        }
    }
}

impl From<&Literal> for Value {
    fn from(value: &Literal) -> Self {
        match value {
            Literal::Str(val) => Value::Str(Rc::new(val.clone())),
            Literal::Num(val) => Value::Num(*val),
            Literal::Bool(val) => Value::Bool(*val),
            Literal::Nil => Value::Nil,
        }
    }
}

// General value equality: values of different types are never equal, callables are equal only
// to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Callable(lhs), Value::Callable(rhs)) => {
                ptr::addr_eq(Rc::as_ptr(lhs), Rc::as_ptr(rhs))
            }
            (Value::Str(lhs), Value::Str(rhs)) => lhs == rhs,
            (Value::Num(lhs), Value::Num(rhs)) => lhs == rhs,
            (Value::Bool(lhs), Value::Bool(rhs)) => lhs == rhs,
            (Value::Nil, Value::Nil) => true,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::new(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::new(String::from(value)))
    }
}

macro_rules! impl_from_num_for_value {
    ( $( $t:ident )* ) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Value {
                    Value::Num(n as f64)
                }
            }
        )*
    }
}

impl_from_num_for_value!(u8 i8 u16 i16 u32 i32 u64 i64 usize isize f32 f64);

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Callable(val) => write!(f, "{}", val),
            Value::Str(val) => write!(f, "{}", val),
            Value::Num(val) if val.is_nan() => write!(f, "NaN"),
            Value::Num(val) if val.is_infinite() => {
                write!(f, "{}Inf", if val.is_sign_positive() { "+" } else { "-" })
            }
            Value::Num(val) => write!(f, "{}", val),
            Value::Bool(val) => write!(f, "{}", val),
            Value::Nil => write!(f, "nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use crate::callable::Native;
    use crate::value::Value;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::from(false).is_truthy());

        assert!(Value::from(true).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(-0.125).to_string(), "-0.125");
        assert_eq!(Value::from("raw \"text\"").to_string(), "raw \"text\"");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::from(true).to_string(), "true");
    }

    #[test]
    fn test_display_non_finite_numbers() {
        assert_eq!(Value::from(f64::INFINITY).to_string(), "+Inf");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_string(), "-Inf");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(-0.0).to_string(), "-0");
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::from("abc"), Value::from(String::from("abc")));
        assert_eq!(Value::from(1), Value::from(1.0));

        assert_ne!(Value::from(0), Value::from(false));
        assert_ne!(Value::Nil, Value::from(false));
        assert_ne!(Value::from("1"), Value::from(1));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
    }

    #[test]
    fn test_callables_compare_by_identity() {
        let clock = Value::Callable(Rc::new(Native::clock()));
        let other = Value::Callable(Rc::new(Native::clock()));

        assert_eq!(clock, clock.clone());
        assert_ne!(clock, other);
        assert_eq!(clock.to_string(), "<native fn clock>");
    }
}
