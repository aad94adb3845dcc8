//! Synthetic value generators for obfuscated columns.
//!
//! Each configured column carries a rule such as `{ type: email }` or
//! `{ type: string, length: 12 }`. The rule is decoded once into a
//! [`Generator`], which is then invoked once per row.
//!
//! Catalogue:
//! - `fixed`: the configured `string`, unchanged on every row
//! - `string`: random alphanumeric string of `length` characters
//! - `first_name`, `last_name`, `name`
//! - `phone`, `email`, `company`
//! - `address`, `street_address`, `city`, `zip_code`
//! - `ipv4`, `url`, `lorem`

mod generate;

use serde_yaml_ng::Value;
use std::fmt;
use std::str::FromStr;

/// Declared semantic type of a column rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Fixed,
    String,
    FirstName,
    LastName,
    Name,
    Phone,
    Email,
    Company,
    Address,
    StreetAddress,
    City,
    ZipCode,
    Ipv4,
    Url,
    Lorem,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 15] = [
        GeneratorKind::Fixed,
        GeneratorKind::String,
        GeneratorKind::FirstName,
        GeneratorKind::LastName,
        GeneratorKind::Name,
        GeneratorKind::Phone,
        GeneratorKind::Email,
        GeneratorKind::Company,
        GeneratorKind::Address,
        GeneratorKind::StreetAddress,
        GeneratorKind::City,
        GeneratorKind::ZipCode,
        GeneratorKind::Ipv4,
        GeneratorKind::Url,
        GeneratorKind::Lorem,
    ];

    /// Name used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Fixed => "fixed",
            GeneratorKind::String => "string",
            GeneratorKind::FirstName => "first_name",
            GeneratorKind::LastName => "last_name",
            GeneratorKind::Name => "name",
            GeneratorKind::Phone => "phone",
            GeneratorKind::Email => "email",
            GeneratorKind::Company => "company",
            GeneratorKind::Address => "address",
            GeneratorKind::StreetAddress => "street_address",
            GeneratorKind::City => "city",
            GeneratorKind::ZipCode => "zip_code",
            GeneratorKind::Ipv4 => "ipv4",
            GeneratorKind::Url => "url",
            GeneratorKind::Lorem => "lorem",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeneratorKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| RuleError::UnknownKind(s.to_string()))
    }
}

/// Why a column rule could not be turned into a generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Rule is not a mapping (e.g. `email: email`)
    NotAMapping,
    /// Mapping has no `type` key
    MissingKind,
    /// `type` names no catalogue entry
    UnknownKind(String),
    /// A parameter is missing or has the wrong type
    InvalidParam {
        param: &'static str,
        expected: &'static str,
    },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::NotAMapping => write!(f, "rule must be a mapping with a 'type' key"),
            RuleError::MissingKind => write!(f, "rule has no 'type'"),
            RuleError::UnknownKind(kind) => write!(f, "unknown generator type '{}'", kind),
            RuleError::InvalidParam { param, expected } => {
                write!(f, "parameter '{}' must be {}", param, expected)
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// A stateless producer of replacement values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generator {
    Fixed(String),
    RandomString { length: usize },
    FirstName,
    LastName,
    Name,
    Phone,
    Email,
    Company,
    Address,
    StreetAddress,
    City,
    ZipCode,
    Ipv4,
    Url,
    Lorem,
}

impl Generator {
    /// Build a generator of `kind`, reading its parameters from `rule`
    pub fn construct(kind: GeneratorKind, rule: &Value) -> Result<Self, RuleError> {
        Ok(match kind {
            GeneratorKind::Fixed => Generator::Fixed(scalar_param(rule, "string")?),
            GeneratorKind::String => Generator::RandomString {
                length: length_param(rule)?,
            },
            GeneratorKind::FirstName => Generator::FirstName,
            GeneratorKind::LastName => Generator::LastName,
            GeneratorKind::Name => Generator::Name,
            GeneratorKind::Phone => Generator::Phone,
            GeneratorKind::Email => Generator::Email,
            GeneratorKind::Company => Generator::Company,
            GeneratorKind::Address => Generator::Address,
            GeneratorKind::StreetAddress => Generator::StreetAddress,
            GeneratorKind::City => Generator::City,
            GeneratorKind::ZipCode => Generator::ZipCode,
            GeneratorKind::Ipv4 => Generator::Ipv4,
            GeneratorKind::Url => Generator::Url,
            GeneratorKind::Lorem => Generator::Lorem,
        })
    }

    /// Decode a whole rule mapping (`{ type: ..., <params> }`)
    pub fn from_rule(rule: &Value) -> Result<Self, RuleError> {
        let mapping = rule.as_mapping().ok_or(RuleError::NotAMapping)?;
        let kind = match mapping.get("type") {
            None | Some(Value::Null) => return Err(RuleError::MissingKind),
            Some(Value::String(s)) => s.parse::<GeneratorKind>()?,
            Some(_) => {
                return Err(RuleError::InvalidParam {
                    param: "type",
                    expected: "a string",
                })
            }
        };
        Self::construct(kind, rule)
    }

    pub fn kind(&self) -> GeneratorKind {
        match self {
            Generator::Fixed(_) => GeneratorKind::Fixed,
            Generator::RandomString { .. } => GeneratorKind::String,
            Generator::FirstName => GeneratorKind::FirstName,
            Generator::LastName => GeneratorKind::LastName,
            Generator::Name => GeneratorKind::Name,
            Generator::Phone => GeneratorKind::Phone,
            Generator::Email => GeneratorKind::Email,
            Generator::Company => GeneratorKind::Company,
            Generator::Address => GeneratorKind::Address,
            Generator::StreetAddress => GeneratorKind::StreetAddress,
            Generator::City => GeneratorKind::City,
            Generator::ZipCode => GeneratorKind::ZipCode,
            Generator::Ipv4 => GeneratorKind::Ipv4,
            Generator::Url => GeneratorKind::Url,
            Generator::Lorem => GeneratorKind::Lorem,
        }
    }

    /// Produce the next replacement value
    pub fn next_value(&self) -> String {
        match self {
            Generator::Fixed(value) => value.clone(),
            Generator::RandomString { length } => generate::random_string(*length),
            Generator::FirstName => generate::first_name(),
            Generator::LastName => generate::last_name(),
            Generator::Name => generate::full_name(),
            Generator::Phone => generate::phone(),
            Generator::Email => generate::email(),
            Generator::Company => generate::company(),
            Generator::Address => generate::address(),
            Generator::StreetAddress => generate::street_address(),
            Generator::City => generate::city(),
            Generator::ZipCode => generate::zip_code(),
            Generator::Ipv4 => generate::ipv4(),
            Generator::Url => generate::url(),
            Generator::Lorem => generate::sentence(),
        }
    }
}

/// A scalar parameter rendered as text; numbers and booleans are accepted
fn scalar_param(rule: &Value, param: &'static str) -> Result<String, RuleError> {
    let invalid = RuleError::InvalidParam {
        param,
        expected: "a scalar value",
    };
    match rule.get(param) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(invalid),
    }
}

/// Longest random string a `string` rule may ask for (the VARCHAR limit)
pub const MAX_STRING_LENGTH: usize = 65_535;

fn length_param(rule: &Value) -> Result<usize, RuleError> {
    rule.get("length")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| (1..=MAX_STRING_LENGTH).contains(n))
        .ok_or(RuleError::InvalidParam {
            param: "length",
            expected: "an integer between 1 and 65535",
        })
}
