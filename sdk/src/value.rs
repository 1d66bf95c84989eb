/*
 * Copyright 2026 Splash core contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The core tagged-union `Value` used on every wire surface: attribute calls,
//! Tree leaves and Seeds, and buffer metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type tag of a `Value`, used both on the wire (one byte) and as the
/// element kind of an [`Attribute`](crate::attribute) type signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Empty,
    Bool,
    Int,
    Real,
    String,
    List,
    Buffer,
}

impl Type {
    /// Single-letter tag as used by the original engine's type signatures
    /// (e.g. a signature of `['n', 'n']` for a two-number attribute).
    pub fn as_char(self) -> char {
        match self {
            Type::Empty => 'e',
            Type::Bool => 'b',
            Type::Int => 'i',
            Type::Real => 'r',
            Type::String => 's',
            Type::List => 'v',
            Type::Buffer => 'd',
        }
    }

    pub fn from_char(c: char) -> Option<Type> {
        Some(match c {
            'e' => Type::Empty,
            'b' => Type::Bool,
            'i' => Type::Int,
            'r' => Type::Real,
            's' => Type::String,
            'v' => Type::List,
            'd' => Type::Buffer,
            _ => return None,
        })
    }

    fn wire_tag(self) -> u8 {
        match self {
            Type::Empty => 0,
            Type::Bool => 1,
            Type::Int => 2,
            Type::Real => 3,
            Type::String => 4,
            Type::List => 5,
            Type::Buffer => 6,
        }
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<Type> {
        Some(match tag {
            0 => Type::Empty,
            1 => Type::Bool,
            2 => Type::Int,
            3 => Type::Real,
            4 => Type::String,
            5 => Type::List,
            6 => Type::Buffer,
            _ => return None,
        })
    }

    /// Numeric-only coercion check used by attribute signature element `'n'`:
    /// matches either an integer or a floating point value.
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Real)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Data {
    Empty,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(String),
    List(Vec<Value>),
    Buffer(Vec<u8>),
}

/// A single wire-level value: a tagged union over
/// `{empty, bool, int64, f64, string, list<Value>, byte-buffer}`, optionally
/// carrying a name (e.g. for keyword-style attribute arguments).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Value {
    name: Option<String>,
    data: Data,
}

impl Default for Value {
    fn default() -> Self {
        Value {
            name: None,
            data: Data::Empty,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data_eq(other)
    }
}

impl Value {
    pub fn empty() -> Self {
        Value::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    pub fn get_type(&self) -> Type {
        match &self.data {
            Data::Empty => Type::Empty,
            Data::Bool(_) => Type::Bool,
            Data::Int(_) => Type::Int,
            Data::Real(_) => Type::Real,
            Data::String(_) => Type::String,
            Data::List(_) => Type::List,
            Data::Buffer(_) => Type::Buffer,
        }
    }

    /// A value of type `self` can be used where `target` is expected: exact
    /// match, or an int/real numeric pair (the only coercion signature
    /// matching allows; string/list coercions are for the value accessors
    /// below, not for signature validation).
    pub fn is_convertible_to(&self, target: Type) -> bool {
        let ty = self.get_type();
        ty == target || (ty.is_numeric() && target.is_numeric())
    }

    fn data_eq(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (Data::Empty, Data::Empty) => true,
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Int(a), Data::Int(b)) => a == b,
            (Data::Real(a), Data::Real(b)) => a == b,
            (Data::String(a), Data::String(b)) => a == b,
            (Data::List(a), Data::List(b)) => a == b,
            (Data::Buffer(a), Data::Buffer(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.data {
            Data::Empty => true,
            Data::Bool(_) | Data::Int(_) | Data::Real(_) => false,
            Data::String(s) => s.is_empty(),
            Data::List(l) => l.is_empty(),
            Data::Buffer(b) => b.is_empty(),
        }
    }

    /// Size of the payload in bytes, computable without serializing (§6.2).
    pub fn byte_size(&self) -> usize {
        match &self.data {
            Data::Empty => 0,
            Data::Bool(_) => std::mem::size_of::<bool>(),
            Data::Int(_) => std::mem::size_of::<i64>(),
            Data::Real(_) => std::mem::size_of::<f64>(),
            Data::String(s) => s.len(),
            Data::List(l) => l.iter().map(Value::byte_size).sum(),
            Data::Buffer(b) => b.len(),
        }
    }

    /// Number of elements held: string/buffer byte count, list length, 1 for
    /// scalars, 0 for empty. Matches the original engine's `Value::size()`.
    pub fn len(&self) -> usize {
        match &self.data {
            Data::Empty => 0,
            Data::Bool(_) | Data::Int(_) | Data::Real(_) => 1,
            Data::String(s) => s.len(),
            Data::List(l) => l.len(),
            Data::Buffer(b) => b.len(),
        }
    }

    // --- constructors -----------------------------------------------------

    pub fn from_bool(v: bool) -> Self {
        Value {
            name: None,
            data: Data::Bool(v),
        }
    }

    pub fn from_i64(v: i64) -> Self {
        Value {
            name: None,
            data: Data::Int(v),
        }
    }

    pub fn from_f64(v: f64) -> Self {
        Value {
            name: None,
            data: Data::Real(v),
        }
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        Value {
            name: None,
            data: Data::String(v.into()),
        }
    }

    pub fn from_list(v: Vec<Value>) -> Self {
        Value {
            name: None,
            data: Data::List(v),
        }
    }

    pub fn from_buffer(v: Vec<u8>) -> Self {
        Value {
            name: None,
            data: Data::Buffer(v),
        }
    }

    // --- coercions ----------------------------------------------------------
    // Mirrors the original engine's `Value::as<T>()` coercion matrix: bool,
    // int and real freely interconvert with each other and with string;
    // list and buffer only convert to/from themselves and a string
    // rendering. See SPEC_FULL.md §12.

    pub fn as_bool(&self) -> Option<bool> {
        match &self.data {
            Data::Empty => Some(false),
            Data::Bool(b) => Some(*b),
            Data::Int(i) => Some(*i != 0),
            Data::Real(r) => Some(*r != 0.0),
            Data::String(s) => Some(s == "true"),
            Data::List(_) | Data::Buffer(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.data {
            Data::Empty => Some(0),
            Data::Bool(b) => Some(*b as i64),
            Data::Int(i) => Some(*i),
            Data::Real(r) => Some(*r as i64),
            Data::String(s) => s.parse().ok(),
            Data::List(_) | Data::Buffer(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.data {
            Data::Empty => Some(0.0),
            Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Data::Int(i) => Some(*i as f64),
            Data::Real(r) => Some(*r),
            Data::String(s) => s.parse().ok(),
            Data::List(_) | Data::Buffer(_) => None,
        }
    }

    /// Stringifies any value; this coercion never fails.
    pub fn as_string(&self) -> String {
        match &self.data {
            Data::Empty => String::new(),
            Data::Bool(b) => b.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Real(r) => r.to_string(),
            Data::String(s) => s.clone(),
            Data::List(l) => {
                let parts: Vec<String> = l.iter().map(Value::as_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Data::Buffer(b) => {
                const MAX_PRINTED: usize = 16;
                let parts: Vec<String> = b.iter().take(MAX_PRINTED).map(|byte| byte.to_string()).collect();
                let ellipsis = if b.len() > MAX_PRINTED { "..." } else { "" };
                format!("({}{})", parts.join(""), ellipsis)
            }
        }
    }

    /// Wraps scalars as a singleton list; an existing list is returned as-is.
    pub fn as_list(&self) -> Vec<Value> {
        match &self.data {
            Data::Empty => Vec::new(),
            Data::List(l) => l.clone(),
            Data::Buffer(_) => Vec::new(),
            _ => vec![self.clone()],
        }
    }

    /// Only a buffer value coerces to a byte buffer.
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match &self.data {
            Data::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_buffer(self) -> Option<Vec<u8>> {
        match self.data {
            Data::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_list(self) -> Vec<Value> {
        match self.data {
            Data::Empty => Vec::new(),
            Data::List(l) => l,
            Data::Buffer(_) => Vec::new(),
            other => vec![Value {
                name: self.name.clone(),
                data: other,
            }],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::from_bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::from_i64(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::from_i64(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::from_f64(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::from_string(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::from_string(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::from_buffer(v)
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::from_list(v)
    }
}

#[cfg(any(test, feature = "arb"))]
pub mod arb {
    use super::*;
    use quickcheck::{Arbitrary, Gen};

    impl Arbitrary for Value {
        fn arbitrary(g: &mut Gen) -> Self {
            let choice = u8::arbitrary(g) % 7;
            let data = match choice {
                0 => Data::Empty,
                1 => Data::Bool(bool::arbitrary(g)),
                2 => Data::Int(i64::arbitrary(g)),
                3 => Data::Real(f64::arbitrary(g)),
                4 => Data::String(String::arbitrary(g)),
                5 => {
                    let len = usize::arbitrary(g) % 4;
                    Data::List((0..len).map(|_| Value::arbitrary(g)).collect())
                }
                _ => Data::Buffer(Vec::arbitrary(g)),
            };
            Value { name: None, data }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_nothing_but_the_wire_contents() {
        let a = Value::from_i64(42);
        let b = Value::from_i64(42);
        assert_eq!(a, b);
        let c = a.clone().named("n");
        assert_ne!(a, c);
    }

    #[test]
    fn coercions_match_the_original_matrix() {
        let v = Value::from_i64(640);
        assert_eq!(v.as_string(), "640");
        assert_eq!(v.as_f64(), Some(640.0));
        assert_eq!(v.as_bool(), Some(true));

        let s = Value::from_string("3.5");
        assert_eq!(s.as_f64(), Some(3.5));
        assert_eq!(s.as_bool(), Some(false));

        let list = Value::from_list(vec![Value::from_i64(1), Value::from_i64(2)]);
        assert!(list.as_buffer().is_none());
        assert_eq!(list.as_bool(), None);
    }

    #[test]
    fn numeric_signature_accepts_int_and_real() {
        assert!(Value::from_i64(1).is_convertible_to(Type::Real));
        assert!(Value::from_f64(1.0).is_convertible_to(Type::Int));
        assert!(!Value::from_string("x").is_convertible_to(Type::Int));
    }

    #[test]
    fn empty_is_empty_but_zero_is_not() {
        assert!(Value::empty().is_empty());
        assert!(!Value::from_i64(0).is_empty());
        assert!(Value::from_string("").is_empty());
    }
}
