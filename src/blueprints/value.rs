//! Concrete values held by mastered blueprints.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::class::BlueprintClass;
use super::instance::Blueprint;
use super::resolve::ResolveError;

/// Longest string a repetition may build, in bytes
const MAX_TEXT_LEN: usize = 1 << 20;

/// Arithmetic operators understood by operator fields and dice expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// True division, always producing a float
    Div,
    /// Division rounded toward negative infinity
    FloorDiv,
    /// Remainder with the sign of the divisor
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(BinOp::Add),
            "-" => Some(BinOp::Sub),
            "*" => Some(BinOp::Mul),
            "/" => Some(BinOp::Div),
            "//" => Some(BinOp::FloorDiv),
            "%" => Some(BinOp::Mod),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A resolved attribute value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Individual dice results; behaves as their sum in arithmetic and display
    Rolls(Vec<i64>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An unmastered class. Mastered as a nested child when a field resolves to it.
    Class(BlueprintClass),
    Blueprint(Arc<Blueprint>),
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Rolls(_) => "rolls",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Class(_) => "class",
            Value::Blueprint(_) => "blueprint",
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(x) => Some(Number::Float(*x)),
            Value::Rolls(rolls) => Some(Number::Int(rolls.iter().sum())),
            _ => None,
        }
    }

    /// Integer view: ints, bools and roll sums
    pub fn as_i64(&self) -> Option<i64> {
        match self.number()? {
            Number::Int(n) => Some(n),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.number()? {
            Number::Int(n) => Some(n as f64),
            Number::Float(x) => Some(x),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blueprint(&self) -> Option<&Arc<Blueprint>> {
        match self {
            Value::Blueprint(bp) => Some(bp),
            _ => None,
        }
    }

    pub fn to_int(&self) -> Result<i64, ResolveError> {
        self.as_i64().ok_or_else(|| {
            ResolveError::TypeMismatch(format!("expected int, got {}", self.type_name()))
        })
    }

    pub fn to_float(&self) -> Result<f64, ResolveError> {
        self.as_f64().ok_or_else(|| {
            ResolveError::TypeMismatch(format!("expected number, got {}", self.type_name()))
        })
    }

    /// Elements of a collection value; rolls yield their individual results.
    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.clone()),
            Value::Rolls(rolls) => Some(rolls.iter().copied().map(Value::Int).collect()),
            Value::Map(map) => Some(map.keys().cloned().map(Value::Str).collect()),
            _ => None,
        }
    }

    pub fn binary(&self, op: BinOp, rhs: &Value) -> Result<Value, ResolveError> {
        match (op, self, rhs) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            (BinOp::Mul, Value::Str(s), other) | (BinOp::Mul, other, Value::Str(s)) => {
                if let Some(n) = other.as_i64() {
                    let count = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
                    return match s.len().checked_mul(count) {
                        Some(len) if len <= MAX_TEXT_LEN => Ok(Value::Str(s.repeat(count))),
                        _ => Err(ResolveError::Overflow(format!("{:?} * {}", s, n))),
                    };
                }
            }
            _ => {}
        }

        let mismatch = || {
            ResolveError::TypeMismatch(format!(
                "unsupported operands for {}: {} and {}",
                op,
                self.type_name(),
                rhs.type_name()
            ))
        };
        match (self.number().ok_or_else(mismatch)?, rhs.number().ok_or_else(mismatch)?) {
            (Number::Int(a), Number::Int(b)) => int_op(op, a, b),
            (a, b) => float_op(op, a.as_f64(), b.as_f64()),
        }
    }

    pub fn neg(&self) -> Result<Value, ResolveError> {
        match self.number() {
            Some(Number::Int(n)) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| ResolveError::Overflow(format!("-{}", n))),
            Some(Number::Float(x)) => Ok(Value::Float(-x)),
            None => Err(ResolveError::TypeMismatch(format!(
                "bad operand for unary -: {}",
                self.type_name()
            ))),
        }
    }
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> Result<Value, ResolveError> {
    let overflow = || ResolveError::Overflow(format!("{} {} {}", a, op, b));
    if b == 0 && matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) {
        return Err(ResolveError::DivisionByZero);
    }
    let result = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinOp::Div => return Ok(Value::Float(a as f64 / b as f64)),
        BinOp::FloorDiv => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Mod => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
    };
    Ok(Value::Int(result))
}

fn float_op(op: BinOp, a: f64, b: f64) -> Result<Value, ResolveError> {
    if b == 0.0 && matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) {
        return Err(ResolveError::DivisionByZero);
    }
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => a - b * (a / b).floor(),
    }))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Rolls(a), Value::Rolls(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Blueprint(a), Value::Blueprint(b)) => {
                Arc::ptr_eq(a, b) || a.meta().instance_id == b.meta().instance_id
            }
            (a, b) => match (a.number(), b.number()) {
                (Some(Number::Int(x)), Some(Number::Int(y))) => x == y,
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Rolls(rolls) => write!(f, "{}", rolls.iter().sum::<i64>()),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Class(class) => f.write_str(class.name()),
            Value::Blueprint(bp) => f.write_str(&bp.name()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Rolls(rolls) => {
                let mut seq = serializer.serialize_seq(Some(rolls.len()))?;
                for roll in rolls {
                    seq.serialize_element(roll)?;
                }
                seq.end()
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Class(class) => serializer.serialize_str(class.name()),
            Value::Blueprint(bp) => bp.serialize(serializer),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    f32 => Float,
    String => Str,
    &str => Str,
    Vec<Value> => List,
    BTreeMap<String, Value> => Map,
    Arc<Blueprint> => Blueprint,
}

impl From<BlueprintClass> for Value {
    fn from(class: BlueprintClass) -> Self {
        Value::Class(class)
    }
}

impl From<&BlueprintClass> for Value {
    fn from(class: &BlueprintClass) -> Self {
        Value::Class(class.clone())
    }
}

impl From<Blueprint> for Value {
    fn from(bp: Blueprint) -> Self {
        Value::Blueprint(Arc::new(bp))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}
