use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type DocId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn matches(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _) | (Value::Int(_), FieldType::Int) | (Value::Text(_), FieldType::Text)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Text,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Text => write!(f, "TEXT"),
        }
    }
}

/// Declared fields of an index. Documents may omit fields but never add
/// undeclared ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    fields: HashMap<String, FieldType>,
    unique: Vec<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Declare a field whose values may appear in at most one document.
    pub fn unique_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        if !self.unique.contains(&name) {
            self.unique.push(name.clone());
        }
        self.fields.insert(name, ty);
        self
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    pub fn is_unique(&self, name: &str) -> bool {
        self.unique.iter().any(|u| u == name)
    }

    pub fn unique_fields(&self) -> &[String] {
        &self.unique
    }

    pub(crate) fn check(&self, doc: &Document) -> Result<(), crate::StorageError> {
        for (name, value) in &doc.data {
            let ty = self
                .field_type(name)
                .ok_or_else(|| crate::StorageError::UnknownField(name.clone()))?;
            if !value.matches(ty) {
                return Err(crate::StorageError::TypeMismatch {
                    field: name.clone(),
                    expected: ty,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub data: HashMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: String, value: Value) {
        self.data.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// One query match, carrying only the fields asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: DocId,
    pub fields: HashMap<String, Value>,
}

impl Hit {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    fn schema() -> Schema {
        Schema::new()
            .unique_field("name", FieldType::Text)
            .field("cost", FieldType::Int)
    }

    #[test]
    fn test_schema_accepts_declared_fields() {
        let doc = Document::new().with("name", "admin").with("cost", 12i64);
        assert!(schema().check(&doc).is_ok());
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let doc = Document::new().with("nickname", "pika");
        assert!(matches!(
            schema().check(&doc),
            Err(StorageError::UnknownField(f)) if f == "nickname"
        ));
    }

    #[test]
    fn test_schema_rejects_wrong_type() {
        let doc = Document::new().with("cost", "twelve");
        assert!(matches!(
            schema().check(&doc),
            Err(StorageError::TypeMismatch { expected: FieldType::Int, .. })
        ));
    }

    #[test]
    fn test_null_fits_any_field() {
        let mut doc = Document::new();
        doc.insert("cost".to_string(), Value::Null);
        assert!(schema().check(&doc).is_ok());
    }

    #[test]
    fn test_unique_fields() {
        let s = schema();
        assert!(s.is_unique("name"));
        assert!(!s.is_unique("cost"));
        assert_eq!(s.unique_fields(), &["name".to_string()]);
    }
}
