//! The transaction form the operator edits, and the request body it
//! serializes into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::{
    coerce_integer, coerce_number, validate_enum, validate_required, CoercionError,
    CoercionErrorKind, LOCATION_CODES,
};

/// Which shape of form the operator is filling in.
///
/// `Numeric` sends integer device and location codes and no transaction
/// type. `Categorical` adds the transaction type, sends the device id as
/// text and restricts the location to a country code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormVariant {
    #[default]
    Numeric,
    Categorical,
}

impl FromStr for FormVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "numeric" => Ok(FormVariant::Numeric),
            "categorical" => Ok(FormVariant::Categorical),
            other => Err(format!(
                "unknown form variant '{}', expected numeric or categorical",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Payment,
    Transfer,
    Cashout,
    Deposit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Transfer => "transfer",
            TransactionType::Cashout => "cashout",
            TransactionType::Deposit => "deposit",
        }
    }
}

impl FromStr for TransactionType {
    type Err = CoercionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = validate_required(QueryField::TransactionType.as_str(), s)?;
        match value.as_str() {
            "payment" => Ok(TransactionType::Payment),
            "transfer" => Ok(TransactionType::Transfer),
            "cashout" => Ok(TransactionType::Cashout),
            "deposit" => Ok(TransactionType::Deposit),
            _ => Err(CoercionError::new(
                QueryField::TransactionType.as_str(),
                CoercionErrorKind::UnknownTransactionType(value),
            )),
        }
    }
}

/// Device ids and locations are integers in one form variant and text in
/// the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(i64),
    Text(String),
}

impl fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrText::Number(n) => write!(f, "{}", n),
            NumberOrText::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryField {
    UserId,
    TransactionType,
    Amount,
    Timestamp,
    DeviceId,
    Location,
}

impl QueryField {
    pub const ALL: [QueryField; 6] = [
        QueryField::UserId,
        QueryField::TransactionType,
        QueryField::Amount,
        QueryField::Timestamp,
        QueryField::DeviceId,
        QueryField::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryField::UserId => "user_id",
            QueryField::TransactionType => "transaction_type",
            QueryField::Amount => "amount",
            QueryField::Timestamp => "timestamp",
            QueryField::DeviceId => "device_id",
            QueryField::Location => "location",
        }
    }
}

impl FromStr for QueryField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryField::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| s.trim().to_string())
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canned forms that overwrite every field at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    HighRisk,
    Normal,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high-risk" | "high_risk" | "high" => Ok(Preset::HighRisk),
            "normal" => Ok(Preset::Normal),
            other => Err(other.to_string()),
        }
    }
}

/// Raw, unvalidated form state. Every field holds the text the operator
/// typed; nothing is coerced until [`QueryForm::to_request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryForm {
    variant: FormVariant,
    user_id: String,
    transaction_type: String,
    amount: String,
    timestamp: String,
    device_id: String,
    location: String,
}

impl QueryForm {
    pub fn new(variant: FormVariant) -> Self {
        let (transaction_type, location) = match variant {
            FormVariant::Numeric => ("", "20"),
            FormVariant::Categorical => ("payment", "IN"),
        };

        Self {
            variant,
            user_id: "10".to_string(),
            transaction_type: transaction_type.to_string(),
            amount: "1200".to_string(),
            timestamp: "2024-01-12T03:14:00".to_string(),
            device_id: "99".to_string(),
            location: location.to_string(),
        }
    }

    pub fn preset(variant: FormVariant, preset: Preset) -> Self {
        let (amount, timestamp, device_id) = match preset {
            Preset::HighRisk => ("20000", "2024-01-12T03:14:00", "99"),
            Preset::Normal => ("200", "2024-01-12T14:30:00", "5"),
        };
        let (transaction_type, location) = match (variant, preset) {
            (FormVariant::Numeric, Preset::HighRisk) => ("", "20"),
            (FormVariant::Numeric, Preset::Normal) => ("", "3"),
            (FormVariant::Categorical, Preset::HighRisk) => ("cashout", "US"),
            (FormVariant::Categorical, Preset::Normal) => ("payment", "IN"),
        };

        Self {
            variant,
            user_id: "10".to_string(),
            transaction_type: transaction_type.to_string(),
            amount: amount.to_string(),
            timestamp: timestamp.to_string(),
            device_id: device_id.to_string(),
            location: location.to_string(),
        }
    }

    pub fn variant(&self) -> FormVariant {
        self.variant
    }

    pub fn get(&self, field: QueryField) -> &str {
        match field {
            QueryField::UserId => &self.user_id,
            QueryField::TransactionType => &self.transaction_type,
            QueryField::Amount => &self.amount,
            QueryField::Timestamp => &self.timestamp,
            QueryField::DeviceId => &self.device_id,
            QueryField::Location => &self.location,
        }
    }

    /// Replaces exactly one field with new raw text. No validation happens here.
    pub fn set(&mut self, field: QueryField, raw: impl Into<String>) {
        let slot = match field {
            QueryField::UserId => &mut self.user_id,
            QueryField::TransactionType => &mut self.transaction_type,
            QueryField::Amount => &mut self.amount,
            QueryField::Timestamp => &mut self.timestamp,
            QueryField::DeviceId => &mut self.device_id,
            QueryField::Location => &mut self.location,
        };
        *slot = raw.into();
    }

    /// Fields that take part in serialization for this variant.
    pub fn fields(&self) -> impl Iterator<Item = QueryField> + '_ {
        QueryField::ALL.into_iter().filter(move |field| {
            *field != QueryField::TransactionType || self.variant == FormVariant::Categorical
        })
    }

    /// Coerces every field into its wire type, stopping at the first field
    /// that does not convert.
    pub fn to_request(&self) -> Result<AnalyzeRequest, CoercionError> {
        let user_id = coerce_integer(QueryField::UserId.as_str(), &self.user_id)?;
        let amount = coerce_number(QueryField::Amount.as_str(), &self.amount)?;
        let timestamp = validate_required(QueryField::Timestamp.as_str(), &self.timestamp)?;

        let (transaction_type, device_id, location) = match self.variant {
            FormVariant::Numeric => (
                None,
                NumberOrText::Number(coerce_integer(
                    QueryField::DeviceId.as_str(),
                    &self.device_id,
                )?),
                NumberOrText::Number(coerce_integer(
                    QueryField::Location.as_str(),
                    &self.location,
                )?),
            ),
            FormVariant::Categorical => {
                let transaction_type = self.transaction_type.parse::<TransactionType>()?;
                let device_id =
                    validate_required(QueryField::DeviceId.as_str(), &self.device_id)?;
                let location = validate_required(QueryField::Location.as_str(), &self.location)?;
                if validate_enum(&location, LOCATION_CODES).is_none() {
                    return Err(CoercionError::new(
                        QueryField::Location.as_str(),
                        CoercionErrorKind::UnknownLocation(location),
                    ));
                }
                (
                    Some(transaction_type),
                    NumberOrText::Text(device_id),
                    NumberOrText::Text(location),
                )
            }
        };

        Ok(AnalyzeRequest {
            user_id,
            transaction_type,
            amount,
            timestamp,
            device_id,
            location,
        })
    }
}

impl Default for QueryForm {
    fn default() -> Self {
        Self::new(FormVariant::default())
    }
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    pub amount: f64,
    pub timestamp: String,
    pub device_id: NumberOrText,
    pub location: NumberOrText,
}
