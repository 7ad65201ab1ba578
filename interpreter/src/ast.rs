use losk_core::{Literal, Token};
use std::mem;
use std::rc::Rc;

use crate::stack::ensure_sufficient_stack;

// Currently tokens are cloned in every creation (stmt or expr) because they are not that
// expensive to do so, and the cloning are done during parsing stage only.

#[derive(Debug, PartialEq, Clone)]
pub(crate) enum Expr {
    Assign {
        name: Token,
        value: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        args: Vec<Expr>,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Literal {
        value: Literal,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Variable {
        name: Token,
    },
}

pub(crate) trait ExprVisitor {
    type Output;

    fn visit_expr(&mut self, expr: &Expr) -> Self::Output {
        ensure_sufficient_stack(|| match expr {
            Expr::Assign { name, value } => self.visit_assign(name, value),
            Expr::Binary {
                left,
                operator,
                right,
            } => self.visit_binary(left, operator, right),
            Expr::Call {
                callee,
                paren,
                args,
            } => self.visit_call(callee, paren, args),
            Expr::Grouping { expression } => self.visit_grouping(expression),
            Expr::Literal { value } => self.visit_literal(value),
            Expr::Logical {
                left,
                operator,
                right,
            } => self.visit_logical(left, operator, right),
            Expr::Unary { operator, right } => self.visit_unary(operator, right),
            Expr::Variable { name } => self.visit_variable(name),
        })
    }

    fn visit_assign(&mut self, name: &Token, value: &Expr) -> Self::Output;
    fn visit_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Self::Output;
    fn visit_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Self::Output;
    fn visit_grouping(&mut self, expression: &Expr) -> Self::Output;
    fn visit_literal(&mut self, value: &Literal) -> Self::Output;
    fn visit_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Self::Output;
    fn visit_unary(&mut self, operator: &Token, right: &Expr) -> Self::Output;
    fn visit_variable(&mut self, name: &Token) -> Self::Output;
}

impl Expr {
    // Creator methods, these could most likely be written as a proc-macro, but I will need
    // a separate crate. So here they go.
    pub(crate) fn assign(name: Token, value: Expr) -> Self {
        Expr::Assign {
            name,
            value: Box::new(value),
        }
    }

    pub(crate) fn binary(left: Expr, operator: Token, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub(crate) fn call(callee: Expr, paren: Token, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            paren,
            args,
        }
    }

    pub(crate) fn grouping(expression: Expr) -> Self {
        Expr::Grouping {
            expression: Box::new(expression),
        }
    }

    pub(crate) fn literal<T>(value: T) -> Self
    where
        Literal: From<T>,
    {
        Expr::Literal {
            value: Literal::from(value),
        }
    }

    pub(crate) fn nil() -> Self {
        Expr::Literal {
            value: Literal::Nil,
        }
    }

    pub(crate) fn logical(left: Expr, operator: Token, right: Expr) -> Self {
        Expr::Logical {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub(crate) fn unary(operator: Token, right: Expr) -> Self {
        Expr::Unary {
            operator,
            right: Box::new(right),
        }
    }

    pub(crate) fn variable(name: Token) -> Self {
        Expr::Variable { name }
    }

    // Moves the direct subexpressions into `out`, leaving `nil` literals behind
    fn take_children(&mut self, out: &mut Vec<Expr>) {
        match self {
            Expr::Assign { value: child, .. }
            | Expr::Grouping { expression: child }
            | Expr::Unary { right: child, .. } => out.push(mem::replace(&mut **child, Expr::nil())),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                out.push(mem::replace(&mut **left, Expr::nil()));
                out.push(mem::replace(&mut **right, Expr::nil()));
            }
            Expr::Call { callee, args, .. } => {
                out.push(mem::replace(&mut **callee, Expr::nil()));
                out.append(args);
            }
            Expr::Literal { .. } | Expr::Variable { .. } => {}
        }
    }
}

// Trees are torn down with a worklist. A long operator chain is as deep as it is long, and the
// derived recursive drop would overflow the stack on it.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.take_children(&mut pending);
        }
    }
}

/// A function declaration. It is reference counted because every closure created from the
/// declaration points at the same parameters and body.
#[derive(Debug, PartialEq)]
pub(crate) struct FunctionDecl {
    pub(crate) name: Token,
    pub(crate) params: Vec<Token>,
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) enum Stmt {
    Block {
        statements: Vec<Stmt>,
    },
    Expression {
        expression: Expr,
    },
    Function(Rc<FunctionDecl>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Print {
        keyword: Token,
        expression: Expr,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Var {
        name: Token,
        init: Option<Expr>,
    },
}

pub(crate) trait StmtVisitor {
    type Output;

    fn visit_stmt(&mut self, stmt: &Stmt) -> Self::Output {
        ensure_sufficient_stack(|| match stmt {
            Stmt::Expression { expression } => self.visit_expression(expression),
            Stmt::Block { statements } => self.visit_block(statements),
            Stmt::Function(declaration) => self.visit_function(declaration),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.visit_if(condition, then_branch, else_branch.as_deref()),
            Stmt::While { condition, body } => self.visit_while(condition, body),
            Stmt::Print {
                keyword,
                expression,
            } => self.visit_print(keyword, expression),
            Stmt::Return { keyword, value } => self.visit_return(keyword, value.as_ref()),
            Stmt::Var { name, init } => self.visit_var(name, init.as_ref()),
        })
    }

    fn visit_block(&mut self, statements: &[Stmt]) -> Self::Output;
    fn visit_expression(&mut self, expression: &Expr) -> Self::Output;
    fn visit_function(&mut self, declaration: &Rc<FunctionDecl>) -> Self::Output;
    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Self::Output;
    fn visit_while(&mut self, condition: &Expr, body: &Stmt) -> Self::Output;
    fn visit_print(&mut self, keyword: &Token, expression: &Expr) -> Self::Output;
    fn visit_return(&mut self, keyword: &Token, value: Option<&Expr>) -> Self::Output;
    fn visit_var(&mut self, name: &Token, init: Option<&Expr>) -> Self::Output;
}

impl Stmt {
    pub(crate) fn block(statements: Vec<Stmt>) -> Self {
        Stmt::Block { statements }
    }

    pub(crate) fn expression(expression: Expr) -> Self {
        Stmt::Expression { expression }
    }

    pub(crate) fn function(name: Token, params: Vec<Token>, body: Vec<Stmt>) -> Self {
        Stmt::Function(Rc::new(FunctionDecl { name, params, body }))
    }

    pub(crate) fn if_(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    pub(crate) fn while_(condition: Expr, body: Stmt) -> Self {
        Stmt::While {
            condition,
            body: Box::new(body),
        }
    }

    pub(crate) fn print(keyword: Token, expression: Expr) -> Self {
        Stmt::Print {
            keyword,
            expression,
        }
    }

    pub(crate) fn return_(keyword: Token, value: Option<Expr>) -> Self {
        Stmt::Return { keyword, value }
    }

    pub(crate) fn var(name: Token, init: Option<Expr>) -> Self {
        Stmt::Var { name, init }
    }

    // Moves nested statements into `out`. A function body is only taken when nothing else, like
    // a closure, still shares the declaration.
    fn take_children(&mut self, out: &mut Vec<Stmt>) {
        match self {
            Stmt::Block { statements } => out.append(statements),
            Stmt::Function(declaration) => {
                if let Some(declaration) = Rc::get_mut(declaration) {
                    out.append(&mut declaration.body);
                }
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                out.push(mem::replace(&mut **then_branch, Stmt::block(Vec::new())));
                if let Some(else_branch) = else_branch {
                    out.push(mem::replace(&mut **else_branch, Stmt::block(Vec::new())));
                }
            }
            Stmt::While { body, .. } => {
                out.push(mem::replace(&mut **body, Stmt::block(Vec::new())));
            }
            Stmt::Expression { .. }
            | Stmt::Print { .. }
            | Stmt::Return { .. }
            | Stmt::Var { .. } => {}
        }
    }
}

impl Drop for Stmt {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut stmt) = pending.pop() {
            stmt.take_children(&mut pending);
        }
    }
}
