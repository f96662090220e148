use std::sync::Arc;
use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

/// Key under which TOML smuggles datetimes through serde.
pub const TOML_DATETIME_KEY: &str = "$__toml_private_datetime";

pub type Dict<K = Arc<str>, V = Value> = BTreeMap<K, V>;

/// Represents any valid front-matter or configuration value.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Num(Num),
    Float(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
}

impl Value {
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None
        }
    }

    pub fn into_str(self) -> Result<Arc<str>, Value> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self),
        }
    }

    /// The string held by `self`. TOML datetimes are treated as strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Dict(d) if d.len() == 1 => d.get(TOML_DATETIME_KEY)?.as_str(),
            _ => None
        }
    }

    pub fn into_vec(self) -> Result<Arc<Vec<Value>>, Value> {
        match self {
            Value::Array(v) => Ok(v),
            _ => Err(self)
        }
    }

    /// Returns the strings of `self` iff `self` is an array of strings.
    ///
    /// ```rust
    /// use quire::value::Value;
    ///
    /// let tags = Value::from(vec!["a", "b"]);
    /// assert_eq!(tags.as_str_list(), Some(vec!["a", "b"]));
    ///
    /// assert_eq!(Value::from("a").as_str_list(), None);
    /// assert_eq!(Value::from(vec![Value::from("a"), Value::from(1u8)]).as_str_list(), None);
    /// ```
    pub fn as_str_list(&self) -> Option<Vec<&str>> {
        match self {
            Value::Array(v) => v.iter().map(|v| match v {
                Value::String(s) => Some(&**s),
                _ => None,
            }).collect(),
            _ => None
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(d) if d.contains_key(TOML_DATETIME_KEY) => "datetime",
            Value::Dict(_) => "dict",
        }
    }
}

macro_rules! impl_from_primitive {
    ($($T:ty),+ => $E:ident::$kind:ident) => {
        $(
            impl From<$T> for $E {
                fn from(value: $T) -> Self {
                    $E::$kind(value.into())
                }
            }
        )+
    };
}

impl_from_primitive!(bool => Value::Bool);
impl_from_primitive!(f32, f64 => Value::Float);
impl_from_primitive!(&str => Value::String);
impl_from_primitive!(String => Value::String);
impl_from_primitive!(Arc<str> => Value::String);
impl_from_primitive!(Arc<Vec<Value>> => Value::Array);
impl_from_primitive!(Arc<Dict> => Value::Dict);
impl_from_primitive!(u8, u16, u32, u64, u128, usize => Value::Num);
impl_from_primitive!(i8, i16, i32, i64, i128, isize => Value::Num);

impl From<()> for Value  {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T> From<Option<T>> for Value where Value: From<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl<T> From<Vec<T>> for Value where Value: From<T> {
    fn from(value: Vec<T>) -> Self {
        value.into_iter()
            .map(Value::from)
            .collect()
    }
}

impl From<Dict> for Value {
    fn from(value: Dict) -> Self {
        Value::Dict(Arc::new(value))
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let vec = iter.into_iter().collect::<Vec<Value>>();
        Value::Array(Arc::from(vec))
    }
}

/// A signed or unsigned numeric value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Num {
    U64(u64),
    I64(i64),
    U128(u128),
    I128(i128),
}

impl Num {
    /// Converts `self` into a `u128`, or the negative value as an `i128`.
    pub fn to_u128_lossy(self) -> Result<u128, i128> {
        match self {
            Num::U64(v) => Ok(v as u128),
            Num::U128(v) => Ok(v),
            Num::I64(v) if v >= 0 => Ok(v as u128),
            Num::I128(v) if v >= 0 => Ok(v as u128),
            Num::I64(v) => Err(v as i128),
            Num::I128(v) => Err(v),
        }
    }
}

impl PartialEq for Num {
    fn eq(&self, other: &Self) -> bool {
        self.to_u128_lossy() == other.to_u128_lossy()
    }
}

impl Eq for Num { }

macro_rules! impl_from_for_num_value {
    ($($T:ty: $V:ident),* $(,)?) => ($(
        impl From<$T> for Num {
            fn from(value: $T) -> Num {
                Num::$V(value.into())
            }
        }
    )*)
}

impl_from_for_num_value! {
    u8: U64, u16: U64, u32: U64, u64: U64, u128: U128,
    i8: I64, i16: I64, i32: I64, i64: I64, i128: I128,
}

impl From<usize> for Num {
    fn from(value: usize) -> Num {
        Num::U64(value as u64)
    }
}

impl From<isize> for Num {
    fn from(value: isize) -> Num {
        Num::I64(value as i64)
    }
}

macro_rules! impl_try_from_value {
    ($($T:ty),+ => | $v:ident | $e:expr) => {
        $(
            impl TryFrom<$crate::value::Value> for $T {
                type Error = Value;

                fn try_from($v: $crate::value::Value) -> Result<Self, Self::Error> {
                    $e
                }
            }
        )+
    };
}

impl_try_from_value!(Arc<str> => |v| v.into_str());

impl<T: TryFrom<Value, Error = Value>> TryFrom<Value> for Vec<T> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let arc = value.into_vec()?;
        match Arc::try_unwrap(arc) {
            Ok(vec) => vec.into_iter().map(|v| v.try_into()).collect(),
            Err(arc) => arc.iter().cloned().map(|v| v.try_into()).collect()
        }
    }
}
