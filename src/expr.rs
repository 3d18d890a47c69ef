//! Value expressions and predicates, evaluated against a parse environment.
//!
//! A [`ValueExpr`] evaluates to zero or one [`Value`]: `None` means the expression is
//! inapplicable (no entry with that name yet, division by zero, overflow). Inapplicable
//! values propagate through arithmetic and make every comparison false, so a field gated
//! on them fails to parse instead of erroring out of the whole decode.

use crate::encoding::Encoding;
use crate::environment::Environment;
use crate::numeric;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Truncating division.
    Div,
    Mod,
    BitAnd,
    Shr,
    CeilDiv,
    FloorDiv,
}

#[derive(Debug, Clone)]
pub enum ValueExpr {
    Const(Value),
    /// The most recently appended entry: the value a field predicate is checking.
    Current,
    /// The most recent entry with this name.
    Last(String),
    /// Absolute offset of the most recent entry with this name.
    OffsetOf(String),
    /// Number of enclosing groups opened by tokens with this name.
    Nesting(String),
    Binary(BinOp, Box<ValueExpr>, Box<ValueExpr>),
    IfElse(Box<Expr>, Box<ValueExpr>, Box<ValueExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Byte equality when both sides are slices, numeric equality otherwise.
    Eq,
    EqNum,
    EqStr,
    Lt,
    Gt,
    /// `left & mask == right`.
    MaskedEq { mask: u64 },
}

/// Boolean predicate.
#[derive(Debug, Clone)]
pub enum Expr {
    True,
    /// Compares `left` (the current value when absent) against `right`.
    Cmp {
        op: CmpOp,
        left: Option<ValueExpr>,
        right: ValueExpr,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

pub fn con(v: i128) -> ValueExpr {
    ValueExpr::Const(Value::Int(v))
}

pub fn con_bytes(b: &[u8]) -> ValueExpr {
    ValueExpr::Const(Value::bytes(b, Encoding::default()))
}

pub fn con_str(s: &str) -> ValueExpr {
    ValueExpr::Const(Value::from(s))
}

pub fn last(name: &str) -> ValueExpr {
    ValueExpr::Last(name.to_string())
}

pub fn current() -> ValueExpr {
    ValueExpr::Current
}

pub fn offset_of(name: &str) -> ValueExpr {
    ValueExpr::OffsetOf(name.to_string())
}

pub fn nesting(name: &str) -> ValueExpr {
    ValueExpr::Nesting(name.to_string())
}

pub fn if_else(cond: Expr, then: ValueExpr, otherwise: ValueExpr) -> ValueExpr {
    ValueExpr::IfElse(Box::new(cond), Box::new(then), Box::new(otherwise))
}

impl ValueExpr {
    fn binary(self, op: BinOp, rhs: ValueExpr) -> ValueExpr {
        ValueExpr::Binary(op, Box::new(self), Box::new(rhs))
    }

    pub fn ceil_div(self, rhs: ValueExpr) -> ValueExpr {
        self.binary(BinOp::CeilDiv, rhs)
    }

    pub fn floor_div(self, rhs: ValueExpr) -> ValueExpr {
        self.binary(BinOp::FloorDiv, rhs)
    }

    pub fn eval(&self, env: &Environment<'_>, enc: &Encoding) -> Option<Value> {
        match self {
            ValueExpr::Const(v) => Some(v.clone()),
            ValueExpr::Current => env.history().current().map(|e| e.value()),
            ValueExpr::Last(name) => env.history().last(name).map(|e| e.value()),
            ValueExpr::OffsetOf(name) => env
                .history()
                .last(name)
                .map(|e| Value::Int(e.offset as i128)),
            ValueExpr::Nesting(name) => Some(Value::Int(env.nesting(name) as i128)),
            ValueExpr::Binary(op, l, r) => {
                let a = l.eval(env, enc)?.as_int()?;
                let b = r.eval(env, enc)?.as_int()?;
                apply(*op, a, b).map(Value::Int)
            }
            ValueExpr::IfElse(cond, then, otherwise) => {
                if cond.eval(env, enc) {
                    then.eval(env, enc)
                } else {
                    otherwise.eval(env, enc)
                }
            }
        }
    }

    /// Numeric evaluation; `None` when inapplicable or not a number.
    pub fn eval_int(&self, env: &Environment<'_>, enc: &Encoding) -> Option<i128> {
        self.eval(env, enc)?.as_int()
    }
}

macro_rules! value_expr_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for ValueExpr {
            type Output = ValueExpr;

            fn $method(self, rhs: ValueExpr) -> ValueExpr {
                self.binary($op, rhs)
            }
        }
    };
}

value_expr_op!(Add, add, BinOp::Add);
value_expr_op!(Sub, sub, BinOp::Sub);
value_expr_op!(Mul, mul, BinOp::Mul);
value_expr_op!(Div, div, BinOp::Div);
value_expr_op!(Rem, rem, BinOp::Mod);
value_expr_op!(BitAnd, bitand, BinOp::BitAnd);
value_expr_op!(Shr, shr, BinOp::Shr);

fn apply(op: BinOp, a: i128, b: i128) -> Option<i128> {
    match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => numeric::trunc_div(a, b),
        BinOp::Mod => numeric::trunc_rem(a, b),
        BinOp::BitAnd => Some(a & b),
        BinOp::Shr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
        BinOp::CeilDiv => numeric::ceil_div(a, b),
        BinOp::FloorDiv => numeric::floor_div(a, b),
    }
}

fn cmp(op: CmpOp, right: ValueExpr) -> Expr {
    Expr::Cmp {
        op,
        left: None,
        right,
    }
}

fn cmp2(op: CmpOp, left: ValueExpr, right: ValueExpr) -> Expr {
    Expr::Cmp {
        op,
        left: Some(left),
        right,
    }
}

/// Current value equals `right` (byte-wise for slices).
pub fn eq(right: ValueExpr) -> Expr {
    cmp(CmpOp::Eq, right)
}

pub fn eq_num(right: ValueExpr) -> Expr {
    cmp(CmpOp::EqNum, right)
}

pub fn eq_str(right: ValueExpr) -> Expr {
    cmp(CmpOp::EqStr, right)
}

pub fn gt_num(right: ValueExpr) -> Expr {
    cmp(CmpOp::Gt, right)
}

pub fn lt_num(right: ValueExpr) -> Expr {
    cmp(CmpOp::Lt, right)
}

/// Current value's bits under `mask` equal `target`.
pub fn masked_eq(mask: u64, target: i128) -> Expr {
    cmp(CmpOp::MaskedEq { mask }, con(target))
}

pub fn eq_num_of(left: ValueExpr, right: ValueExpr) -> Expr {
    cmp2(CmpOp::EqNum, left, right)
}

pub fn gt_num_of(left: ValueExpr, right: ValueExpr) -> Expr {
    cmp2(CmpOp::Gt, left, right)
}

pub fn lt_num_of(left: ValueExpr, right: ValueExpr) -> Expr {
    cmp2(CmpOp::Lt, left, right)
}

pub fn eq_of(left: ValueExpr, right: ValueExpr) -> Expr {
    cmp2(CmpOp::Eq, left, right)
}

impl Expr {
    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn eval(&self, env: &Environment<'_>, enc: &Encoding) -> bool {
        match self {
            Expr::True => true,
            Expr::Cmp { op, left, right } => {
                let l = match left {
                    Some(l) => l.eval(env, enc),
                    None => ValueExpr::Current.eval(env, enc),
                };
                let (Some(l), Some(r)) = (l, right.eval(env, enc)) else {
                    return false;
                };
                compare(*op, &l, &r)
            }
            Expr::And(a, b) => a.eval(env, enc) && b.eval(env, enc),
            Expr::Or(a, b) => a.eval(env, enc) || b.eval(env, enc),
            Expr::Not(a) => !a.eval(env, enc),
        }
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> bool {
    match op {
        CmpOp::Eq => match (l.as_bytes(), r.as_bytes()) {
            (Some(a), Some(b)) => a == b,
            _ => int_cmp(l, r, |a, b| a == b),
        },
        CmpOp::EqNum => int_cmp(l, r, |a, b| a == b),
        CmpOp::EqStr => l.as_text() == r.as_text(),
        CmpOp::Lt => int_cmp(l, r, |a, b| a < b),
        CmpOp::Gt => int_cmp(l, r, |a, b| a > b),
        CmpOp::MaskedEq { mask } => match (l.as_u64(), r.as_u64()) {
            (Some(a), Some(b)) => numeric::masked_eq(a, mask, b),
            _ => int_cmp(l, r, |a, b| numeric::masked_eq_i128(a, mask as i128, b)),
        },
    }
}

fn int_cmp(l: &Value, r: &Value, f: impl Fn(i128, i128) -> bool) -> bool {
    match (l.as_int(), r.as_int()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}
