//! Cache keys built from call arguments
//!
//! A key holds the positional arguments in call order and the keyword
//! arguments sorted by name, so `f(1, a=2, b=3)` and `f(1, b=3, a=2)` produce
//! equal keys with equal hashes.

use std::collections::BTreeMap;
use std::fmt;

/// One argument value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgValue {
    /// Absent / none
    Null,
    /// Boolean
    Bool(bool),
    /// Integer of any width or signedness; `5`, `5u8` and `5usize` are equal
    Int(i128),
    /// UTF-8 text
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered sequence
    List(Vec<ArgValue>),
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(v: $ty) -> Self {
                    ArgValue::Int(i128::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<isize> for ArgValue {
    fn from(v: isize) -> Self {
        ArgValue::Int(v as i128)
    }
}

impl From<usize> for ArgValue {
    fn from(v: usize) -> Self {
        ArgValue::Int(v as i128)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<&[u8]> for ArgValue {
    fn from(v: &[u8]) -> Self {
        ArgValue::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(v: Vec<u8>) -> Self {
        ArgValue::Bytes(v)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ArgValue::Null, Into::into)
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(v: Vec<ArgValue>) -> Self {
        ArgValue::List(v)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => f.write_str("None"),
            ArgValue::Bool(v) => write!(f, "{v}"),
            ArgValue::Int(v) => write!(f, "{v}"),
            ArgValue::Str(v) => write!(f, "{v:?}"),
            ArgValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            ArgValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Key identifying one call signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    positional: Vec<ArgValue>,
    keyword: BTreeMap<String, ArgValue>,
}

impl CacheKey {
    /// Start building a key
    pub fn builder() -> KeyBuilder {
        KeyBuilder::default()
    }

    /// Positional arguments in call order
    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    /// Keyword argument by name
    pub fn keyword(&self, name: &str) -> Option<&ArgValue> {
        self.keyword.get(name)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let mut first = true;
        for arg in &self.positional {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{arg}")?;
        }
        for (name, arg) in &self.keyword {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{name}={arg}")?;
        }
        f.write_str(")")
    }
}

/// Builder for [`CacheKey`]
#[derive(Debug, Default)]
pub struct KeyBuilder {
    key: CacheKey,
}

impl KeyBuilder {
    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.key.positional.push(value.into());
        self
    }

    /// Set a keyword argument; a repeated name keeps the last value
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.key.keyword.insert(name.into(), value.into());
        self
    }

    /// Finish the key
    pub fn build(self) -> CacheKey {
        self.key
    }
}
