//! Dice expressions: `NdS` rolls, fudge dice and a little arithmetic.
//!
//! An expression is checked against an allow-list before it is parsed, and
//! parsed before it is ever rolled. Supported syntax:
//!
//! - `3d6` rolls three six-sided dice; `4dF` rolls four fudge dice (-1, 0 or 1)
//! - integer literals, parentheses and unary minus
//! - `+ - * / // %` with the usual precedence
//! - `sum(..)`, `sorted(..)`, `max(..)`, `min(..)`, `abs(..)` and
//!   `random.choice(..)` (or `choice(..)`), each taking one argument
//!
//! A bare roll evaluates to [`Value::Rolls`], which keeps the individual
//! results but acts as their sum in arithmetic.

use std::collections::BTreeMap;
use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, multispace0, one_of};
use nom::combinator::{all_consuming, map, map_res, opt, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};
use rand::Rng;
use thiserror::Error;

use super::field::Field;
use super::value::{BinOp, Value};

/// Most dice a single `NdS` term may roll
pub const MAX_DICE: u64 = 10_000;

const FUNCTIONS: [&str; 7] = [
    "random.choice(",
    "choice(",
    "sorted(",
    "sum(",
    "max(",
    "min(",
    "abs(",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiceError {
    #[error("Invalid dice expression: {0}")]
    Rejected(String),

    #[error("Could not parse dice expression `{expr}`: {reason}")]
    Parse { expr: String, reason: String },

    #[error("Dice evaluation failed: {0}")]
    Eval(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sum,
    Sorted,
    Max,
    Min,
    Abs,
    Choice,
}

#[derive(Debug, Clone, PartialEq)]
enum DiceNode {
    Int(u64),
    Roll { count: u64, sides: u64 },
    Fudge { count: u64 },
    Neg(Box<DiceNode>),
    Bin {
        op: BinOp,
        left: Box<DiceNode>,
        right: Box<DiceNode>,
    },
    Call { func: Func, arg: Box<DiceNode> },
}

/// A validated, parsed dice expression
#[derive(Debug, Clone, PartialEq)]
pub struct DiceExpr {
    source: String,
    root: DiceNode,
}

/// Reject anything outside the dice alphabet before parsing.
fn check_allowed(text: &str) -> Result<(), DiceError> {
    let reject = || DiceError::Rejected(text.to_string());
    if text.trim().is_empty() {
        return Err(reject());
    }

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(func) = FUNCTIONS.iter().find(|f| text[i..].starts_with(*f)) {
            i += func.len();
            continue;
        }
        let c = bytes[i];
        if c.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'd' {
                i += 1;
                if i < bytes.len() && matches!(bytes[i], b'f' | b'F') {
                    i += 1;
                } else if i < bytes.len() && bytes[i].is_ascii_digit() {
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                } else {
                    return Err(reject());
                }
            }
            continue;
        }
        if b"()+-*/% \t\r\n".contains(&c) {
            i += 1;
            continue;
        }
        return Err(reject());
    }
    Ok(())
}

fn number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>).parse(input)
}

fn dice_or_int(input: &str) -> IResult<&str, DiceNode> {
    let (input, count) = number(input)?;
    let (input, sides) = opt(preceded(
        char('d'),
        alt((map(number, Some), value(None, one_of("fF")))),
    ))
    .parse(input)?;
    let node = match sides {
        None => DiceNode::Int(count),
        Some(Some(sides)) => DiceNode::Roll { count, sides },
        Some(None) => DiceNode::Fudge { count },
    };
    Ok((input, node))
}

fn call(input: &str) -> IResult<&str, DiceNode> {
    let (input, func) = alt((
        value(Func::Choice, tag("random.choice")),
        value(Func::Choice, tag("choice")),
        value(Func::Sorted, tag("sorted")),
        value(Func::Sum, tag("sum")),
        value(Func::Max, tag("max")),
        value(Func::Min, tag("min")),
        value(Func::Abs, tag("abs")),
    ))
    .parse(input)?;
    let (input, arg) = delimited(
        char('('),
        expr,
        preceded(multispace0, char(')')),
    )
    .parse(input)?;
    Ok((
        input,
        DiceNode::Call {
            func,
            arg: Box::new(arg),
        },
    ))
}

fn atom(input: &str) -> IResult<&str, DiceNode> {
    preceded(
        multispace0,
        alt((
            call,
            dice_or_int,
            delimited(char('('), expr, preceded(multispace0, char(')'))),
        )),
    )
    .parse(input)
}

fn unary(input: &str) -> IResult<&str, DiceNode> {
    preceded(
        multispace0,
        alt((
            map(preceded(char('-'), unary), |n| DiceNode::Neg(Box::new(n))),
            preceded(char('+'), unary),
            atom,
        )),
    )
    .parse(input)
}

fn fold(first: DiceNode, rest: Vec<(BinOp, DiceNode)>) -> DiceNode {
    rest.into_iter().fold(first, |left, (op, right)| DiceNode::Bin {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn term(input: &str) -> IResult<&str, DiceNode> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        preceded(
            multispace0,
            alt((
                value(BinOp::FloorDiv, tag("//")),
                value(BinOp::Mul, tag("*")),
                value(BinOp::Div, tag("/")),
                value(BinOp::Mod, tag("%")),
            )),
        ),
        unary,
    ))
    .parse(input)?;
    Ok((input, fold(first, rest)))
}

fn expr(input: &str) -> IResult<&str, DiceNode> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        preceded(
            multispace0,
            alt((value(BinOp::Add, tag("+")), value(BinOp::Sub, tag("-")))),
        ),
        term,
    ))
    .parse(input)?;
    Ok((input, fold(first, rest)))
}

impl DiceExpr {
    pub fn parse(text: &str) -> Result<Self, DiceError> {
        check_allowed(text)?;
        let (_, root) = all_consuming(terminated(expr, multispace0))
            .parse(text)
            .map_err(|e| DiceError::Parse {
                expr: text.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: text.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn roll<R: Rng>(&self, rng: &mut R) -> Result<Value, DiceError> {
        eval(&self.root, rng)
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and roll in one go
pub fn roll<R: Rng>(text: &str, rng: &mut R) -> Result<Value, DiceError> {
    DiceExpr::parse(text)?.roll(rng)
}

fn eval<R: Rng>(node: &DiceNode, rng: &mut R) -> Result<Value, DiceError> {
    let arith = |e: super::resolve::ResolveError| DiceError::Eval(e.to_string());
    match node {
        DiceNode::Int(n) => i64::try_from(*n)
            .map(Value::Int)
            .map_err(|_| DiceError::Eval(format!("{} is too large", n))),
        DiceNode::Roll { count, sides } => {
            if *sides == 0 {
                return Err(DiceError::Eval(format!("{}d0 has no sides", count)));
            }
            if *count > MAX_DICE || *sides > i64::MAX as u64 {
                return Err(DiceError::Eval(format!("{}d{} is too large", count, sides)));
            }
            let sides = *sides as i64;
            Ok(Value::Rolls(
                (0..*count).map(|_| rng.gen_range(1..=sides)).collect(),
            ))
        }
        DiceNode::Fudge { count } => {
            if *count > MAX_DICE {
                return Err(DiceError::Eval(format!("{}dF is too large", count)));
            }
            Ok(Value::Rolls(
                (0..*count).map(|_| rng.gen_range(-1..=1)).collect(),
            ))
        }
        DiceNode::Neg(inner) => eval(inner, rng)?.neg().map_err(arith),
        DiceNode::Bin { op, left, right } => {
            let left = eval(left, rng)?;
            let right = eval(right, rng)?;
            left.binary(*op, &right).map_err(arith)
        }
        DiceNode::Call { func, arg } => apply(*func, eval(arg, rng)?, rng),
    }
}

fn apply<R: Rng>(func: Func, arg: Value, rng: &mut R) -> Result<Value, DiceError> {
    let items = match &arg {
        Value::Rolls(_) | Value::List(_) => arg.elements().unwrap_or_default(),
        scalar => vec![scalar.clone()],
    };
    let numeric = |v: &Value| {
        v.as_f64()
            .ok_or_else(|| DiceError::Eval(format!("{} is not a number", v.type_name())))
    };

    match func {
        Func::Sum => items.iter().try_fold(Value::Int(0), |acc, v| {
            acc.binary(BinOp::Add, v)
                .map_err(|e| DiceError::Eval(e.to_string()))
        }),
        Func::Sorted => match arg {
            Value::Rolls(mut rolls) => {
                rolls.sort_unstable();
                Ok(Value::Rolls(rolls))
            }
            _ => {
                let mut keyed = items
                    .into_iter()
                    .map(|v| numeric(&v).map(|k| (k, v)))
                    .collect::<Result<Vec<_>, _>>()?;
                keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
                Ok(Value::List(keyed.into_iter().map(|(_, v)| v).collect()))
            }
        },
        Func::Max | Func::Min => {
            let mut best: Option<(f64, Value)> = None;
            for v in items {
                let k = numeric(&v)?;
                let better = match &best {
                    None => true,
                    Some((b, _)) if func == Func::Max => k > *b,
                    Some((b, _)) => k < *b,
                };
                if better {
                    best = Some((k, v));
                }
            }
            best.map(|(_, v)| v)
                .ok_or_else(|| DiceError::Eval("max/min of an empty sequence".to_string()))
        }
        Func::Abs => match arg.as_i64() {
            Some(n) => Ok(Value::Int(n.saturating_abs())),
            None => Ok(Value::Float(numeric(&arg)?.abs())),
        },
        Func::Choice => {
            if items.is_empty() {
                return Err(DiceError::Eval("choice from an empty sequence".to_string()));
            }
            let idx = rng.gen_range(0..items.len());
            Ok(items[idx].clone())
        }
    }
}

/// A dice roll used to look up an entry in a table.
///
/// Keys are single results (`"4"`), comma lists (`"1, 2"`) or inclusive
/// ranges written `"3..5"` or `"3:5"`. Rolls missing from the table select
/// the default entry.
#[derive(Debug, Clone)]
pub struct DiceTable {
    dice: DiceExpr,
    entries: BTreeMap<String, Field>,
    default: Option<Field>,
}

impl DiceTable {
    pub fn new<K, I>(expr: &str, table: I, default: Option<Field>) -> Result<Self, DiceError>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Field)>,
    {
        let dice = DiceExpr::parse(expr)?;
        let mut entries = BTreeMap::new();
        for (key, field) in table {
            for k in expand_key(key.as_ref())? {
                entries.insert(k, field.clone());
            }
        }
        Ok(Self {
            dice,
            entries,
            default,
        })
    }

    pub fn dice(&self) -> &DiceExpr {
        &self.dice
    }

    /// Every entry, then the default
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.entries.values().chain(self.default.iter())
    }

    /// Entry for a rolled value, falling back to the default
    pub fn lookup(&self, rolled: &Value) -> Option<&Field> {
        self.entries
            .get(&rolled.to_string())
            .or(self.default.as_ref())
    }
}

fn expand_key(key: &str) -> Result<Vec<String>, DiceError> {
    let bad_key = || DiceError::Parse {
        expr: key.to_string(),
        reason: "table keys must be integers or integer ranges".to_string(),
    };
    if key.contains("..") || key.contains(':') {
        let normalized = key.replace("..", ":");
        let parts: Vec<&str> = normalized.split(':').collect();
        let start: i64 = parts[0].trim().parse().map_err(|_| bad_key())?;
        let end: i64 = parts[parts.len() - 1].trim().parse().map_err(|_| bad_key())?;
        Ok((start..=end).map(|n| n.to_string()).collect())
    } else {
        Ok(key.split(',').map(|k| k.trim().to_string()).collect())
    }
}
