use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SqlError, SqlResult};

/// Column data types recognized by the DDL surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Double,
    /// Fixed-width character string.
    Char(u32),
    /// Variable-width character string with a length cap.
    Varchar(u32),
    DateTime,
    Date,
    Time,
    /// Exact numeric with precision and scale.
    Numeric { precision: u8, scale: u8 },
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Double => write!(f, "double"),
            DataType::Char(n) => write!(f, "char({n})"),
            DataType::Varchar(n) => write!(f, "varchar({n})"),
            DataType::DateTime => write!(f, "datetime"),
            DataType::Date => write!(f, "date"),
            DataType::Time => write!(f, "time"),
            DataType::Numeric { precision, scale } => write!(f, "numeric({precision},{scale})"),
        }
    }
}

/// Parse a DDL type name such as `varchar(16)` or `numeric(10,2)`.
///
/// The accepted names are fixed: `int`/`integer`, `double`,
/// `double precision`, `char(n)`, `varchar(n)`, `datetime`, `date`,
/// `time`, `numeric(p[,s])`, `decimal(p[,s])`. Anything else is a
/// semantic error.
pub fn parse_type_name(text: &str) -> SqlResult<DataType> {
    let text = text.trim().to_lowercase();
    let (name, args) = split_type_args(&text)?;
    match (name, args.as_slice()) {
        ("int" | "integer", []) => Ok(DataType::Int),
        ("double" | "double precision", []) => Ok(DataType::Double),
        ("char", [n]) => Ok(DataType::Char(length_arg(*n, &text)?)),
        ("varchar", [n]) => Ok(DataType::Varchar(length_arg(*n, &text)?)),
        ("datetime", []) => Ok(DataType::DateTime),
        ("date", []) => Ok(DataType::Date),
        ("time", []) => Ok(DataType::Time),
        ("numeric" | "decimal", [p]) => Ok(DataType::Numeric {
            precision: precision_arg(*p, &text)?,
            scale: 0,
        }),
        ("numeric" | "decimal", [p, s]) => Ok(DataType::Numeric {
            precision: precision_arg(*p, &text)?,
            scale: precision_arg(*s, &text)?,
        }),
        _ => Err(SqlError::UnknownType(text.to_string())),
    }
}

fn length_arg(value: i64, text: &str) -> SqlResult<u32> {
    u32::try_from(value).map_err(|_| SqlError::UnknownType(text.to_string()))
}

fn precision_arg(value: i64, text: &str) -> SqlResult<u8> {
    u8::try_from(value).map_err(|_| SqlError::UnknownType(text.to_string()))
}

/// Split `name(a, b)` into the bare name and its integer arguments.
fn split_type_args(text: &str) -> SqlResult<(&str, Vec<i64>)> {
    let Some(open) = text.find('(') else {
        return Ok((text, Vec::new()));
    };
    let close = text
        .rfind(')')
        .ok_or_else(|| SqlError::UnknownType(text.to_string()))?;
    if close < open {
        return Err(SqlError::UnknownType(text.to_string()));
    }
    let name = text[..open].trim_end();
    let args = text[open + 1..close]
        .split(',')
        .map(|a| a.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SqlError::UnknownType(text.to_string()))?;
    Ok((name, args))
}

/// A literal value carried by the expression tree.
///
/// The planner never evaluates these; they flow through to downstream
/// phases untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::Text(v) => write!(f, "'{v}'"),
            Datum::Bool(v) => write!(f, "{v}"),
        }
    }
}
