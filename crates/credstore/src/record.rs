use crate::error::{CredentialError, Result};
use std::fmt;
use std::str::FromStr;
use storage::{Document, FieldType, Hit, Schema, Value};
use thiserror::Error;

/// Fields a lookup may project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Cost,
    PasswordHash,
    Role,
    DisplayName,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Cost,
        Field::PasswordHash,
        Field::Role,
        Field::DisplayName,
    ];

    /// Name of the field in the backing index.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Cost => "cost",
            Field::PasswordHash => "passwordhash",
            Field::Role => "role",
            Field::DisplayName => "display_name",
        }
    }

    fn field_type(self) -> FieldType {
        match self {
            Field::Cost => FieldType::Int,
            _ => FieldType::Text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown field: {0}")]
pub struct ParseFieldError(String);

impl FromStr for Field {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "username" => Ok(Field::Name),
            "cost" => Ok(Field::Cost),
            "passwordhash" | "password_hash" => Ok(Field::PasswordHash),
            "role" => Ok(Field::Role),
            "display_name" | "displayname" => Ok(Field::DisplayName),
            _ => Err(ParseFieldError(s.to_string())),
        }
    }
}

/// Index layout for the password store. `name` is unique.
pub fn schema() -> Schema {
    Field::ALL
        .into_iter()
        .fold(Schema::new(), |schema, field| match field {
            Field::Name => schema.unique_field(field.as_str(), field.field_type()),
            _ => schema.field(field.as_str(), field.field_type()),
        })
}

/// A stored account. The password only ever appears as its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
    pub hash_cost: u32,
    pub role: String,
    pub display_name: String,
}

impl CredentialRecord {
    pub(crate) fn to_document(&self) -> Document {
        Document::new()
            .with(Field::Name.as_str(), self.username.as_str())
            .with(Field::PasswordHash.as_str(), self.password_hash.as_str())
            .with(Field::Cost.as_str(), i64::from(self.hash_cost))
            .with(Field::Role.as_str(), self.role.as_str())
            .with(Field::DisplayName.as_str(), self.display_name.as_str())
    }
}

/// The projected part of a record. Only requested fields are `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialView {
    pub name: Option<String>,
    pub cost: Option<u32>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
    pub display_name: Option<String>,
}

impl CredentialView {
    pub(crate) fn from_hit(username: &str, hit: &Hit, fields: &[Field]) -> Result<Self> {
        let corrupt = |field: Field| CredentialError::CorruptRecord {
            username: username.to_string(),
            field: field.as_str(),
        };
        let text = |field: Field| -> Result<Option<String>> {
            match hit.get(field.as_str()) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Text(s)) => Ok(Some(s.clone())),
                Some(_) => Err(corrupt(field)),
            }
        };

        let mut view = CredentialView::default();
        for &field in fields {
            match field {
                Field::Name => view.name = text(field)?,
                Field::PasswordHash => view.password_hash = text(field)?,
                Field::Role => view.role = text(field)?,
                Field::DisplayName => view.display_name = text(field)?,
                Field::Cost => {
                    view.cost = match hit.get(field.as_str()) {
                        None | Some(Value::Null) => None,
                        Some(Value::Int(n)) => {
                            Some(u32::try_from(*n).map_err(|_| corrupt(field))?)
                        }
                        Some(_) => return Err(corrupt(field)),
                    }
                }
            }
        }
        Ok(view)
    }

    /// Value of `field` rendered as text, for display.
    pub fn get(&self, field: Field) -> Option<String> {
        match field {
            Field::Name => self.name.clone(),
            Field::Cost => self.cost.map(|c| c.to_string()),
            Field::PasswordHash => self.password_hash.clone(),
            Field::Role => self.role.clone(),
            Field::DisplayName => self.display_name.clone(),
        }
    }
}
