// src/utils/id_generator.rs
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::RideError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    Ride,
    Driver,
}

impl IdType {
    pub fn to_prefix(&self) -> &'static str {
        match self {
            IdType::Ride => "rid",
            IdType::Driver => "drv",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "rid" => Some(IdType::Ride),
            "drv" => Some(IdType::Driver),
            _ => None,
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefix())
    }
}

pub struct IdGenerator;

impl IdGenerator {
    /// Generate a unique ID with format: {prefix}-{date}-{random_suffix}
    /// Where random_suffix is 5 characters: 3 hexchars + 2 alphanumeric or 3 alphanumeric + 2 hexchars
    pub fn generate(id_type: IdType) -> String {
        Self::generate_with_timestamp(id_type, Utc::now())
    }

    /// Generate ID with a specific timestamp (useful for testing)
    pub fn generate_with_timestamp(id_type: IdType, timestamp: DateTime<Utc>) -> String {
        let date_part = timestamp.format("%y%m%d").to_string(); // YYMMDD format
        let random_suffix = Self::generate_random_suffix();

        format!("{}-{}-{}", id_type.to_prefix(), date_part, random_suffix)
    }

    fn generate_random_suffix() -> String {
        if rand::random::<bool>() {
            format!(
                "{}{}",
                Self::generate_from_chars(HEX_CHARS, 3),
                Self::generate_from_chars(ALPHANUMERIC_CHARS, 2)
            )
        } else {
            format!(
                "{}{}",
                Self::generate_from_chars(ALPHANUMERIC_CHARS, 3),
                Self::generate_from_chars(HEX_CHARS, 2)
            )
        }
    }

    fn generate_from_chars(charset: &[u8], n: usize) -> String {
        let mut rng = rand::rng();
        (0..n)
            .map(|_| charset[rng.random_range(0..charset.len())] as char)
            .collect()
    }

    /// Parse an ID to extract its components
    pub fn parse_id(id: &str) -> Result<ParsedId, IdError> {
        let parts: Vec<&str> = id.split('-').collect();
        let [prefix, date_part, random_suffix] = parts.as_slice() else {
            return Err(IdError::InvalidFormat);
        };

        if date_part.len() != 6
            || random_suffix.len() != 5
            || !random_suffix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(IdError::InvalidFormat);
        }

        let id_type = IdType::from_prefix(prefix)
            .ok_or_else(|| IdError::UnknownType(prefix.to_string()))?;

        let created_on = NaiveDate::parse_from_str(&format!("20{}", date_part), "%Y%m%d")
            .map_err(|_| IdError::InvalidDate)?;

        Ok(ParsedId {
            id_type,
            created_on,
            random_suffix: random_suffix.to_string(),
        })
    }

    /// Validate if an ID matches the expected format and type
    pub fn validate_id(id: &str, expected_type: Option<IdType>) -> bool {
        match Self::parse_id(id) {
            Ok(parsed) => expected_type.is_none_or(|expected| parsed.id_type == expected),
            Err(_) => false,
        }
    }

    /// Rejects malformed ride ids before they reach the store.
    pub fn check_ride_id(id: &str) -> Result<(), RideError> {
        if Self::validate_id(id, Some(IdType::Ride)) {
            Ok(())
        } else {
            Err(RideError::InvalidRideId(id.to_string()))
        }
    }

    pub fn check_driver_id(id: &str) -> Result<(), RideError> {
        if Self::validate_id(id, Some(IdType::Driver)) {
            Ok(())
        } else {
            Err(RideError::InvalidDriverId(id.to_string()))
        }
    }
}

const HEX_CHARS: &[u8] = b"0123456789abcdef";
const ALPHANUMERIC_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedId {
    pub id_type: IdType,
    pub created_on: NaiveDate,
    pub random_suffix: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdError {
    #[error("Invalid ID format")]
    InvalidFormat,

    #[error("Unknown ID type: {0}")]
    UnknownType(String),

    #[error("Invalid date component in ID")]
    InvalidDate,
}

impl From<IdError> for RideError {
    fn from(err: IdError) -> Self {
        RideError::InvalidFormat(err.to_string())
    }
}

pub trait WithGeneratedId {
    fn set_generated_id(&mut self, id_type: IdType);

    fn with_generated_id(mut self, id_type: IdType) -> Self
    where
        Self: Sized,
    {
        self.set_generated_id(id_type);
        self
    }
}

impl WithGeneratedId for crate::models::ride::RideRequest {
    fn set_generated_id(&mut self, id_type: IdType) {
        self.id = IdGenerator::generate_with_timestamp(id_type, self.created_at);
    }
}

impl WithGeneratedId for crate::models::driver::Driver {
    fn set_generated_id(&mut self, id_type: IdType) {
        self.id = IdGenerator::generate_with_timestamp(id_type, self.created_at);
    }
}
