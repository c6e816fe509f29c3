use std::{fmt::Display, sync::OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, newtype};

/// Тип записи, которой принадлежит акт.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    enum_iterator::Sequence,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    /// Выдача оборудования сотруднику.
    #[display(fmt = "assignment")]
    Assignment,

    /// Увольнение (возврат оборудования).
    #[display(fmt = "termination")]
    Termination,

    /// Продажа оборудования.
    #[display(fmt = "sale")]
    Sale,
}

/// Категория оборудования, к которой относится акт.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    enum_iterator::Sequence,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Ноутбуки, мониторы и периферия.
    #[display(fmt = "computer")]
    Computer,

    /// Телефоны, сим-карты, зарядки.
    #[display(fmt = "mobile")]
    Mobile,

    /// Акт без категории (продажи).
    #[display(fmt = "none")]
    None,
}

pub const DEVICE_TYPE_LAPTOP: &str = "laptop";
pub const DEVICE_TYPE_MONITOR: &str = "monitor";
pub const DEVICE_STATUS_AVAILABLE: &str = "available";

/// Устройство из инвентаря.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,

    #[serde(default)]
    pub device_type: String,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub serial_number: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}

impl Device {
    pub fn is_available(&self) -> bool {
        self.status.as_deref() == Some(DEVICE_STATUS_AVAILABLE)
    }

    pub fn is_sellable_type(&self) -> bool {
        self.device_type == DEVICE_TYPE_LAPTOP || self.device_type == DEVICE_TYPE_MONITOR
    }

    /// Проверяет, что марка, модель, серийный номер или имя хоста содержат
    /// подстроку без учёта регистра.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [&self.brand, &self.model, &self.serial_number, &self.hostname]
            .into_iter()
            .flatten()
            .any(|v| v.to_lowercase().contains(&needle))
    }

    /// Короткое описание для вывода пользователю.
    pub fn label(&self) -> String {
        let name = [&self.brand, &self.model]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        match &self.serial_number {
            Some(sn) => format!("#{} {} {} (S/N {})", self.id, self.device_type, name, sn),
            None => format!("#{} {} {}", self.id, self.device_type, name),
        }
    }
}

newtype!(BuyerName, String, buyer_name_validate);

fn buyer_name_validate(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty("buyer name"));
    }

    Ok(())
}

newtype!(BuyerDni, String, buyer_dni_validate);

fn buyer_dni_validate(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty("buyer dni"));
    }

    Ok(())
}

newtype!(Email, String, email_validate);

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_validate(value: &str) -> Result<(), ValidationError> {
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    });

    if !re.is_match(value) {
        return Err(ValidationError::MalformedEmail(value.to_owned()));
    }

    Ok(())
}

newtype!(Price, u32);

pub type AccessToken = Token;

/// Токен доступа к АПИ.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Token {
    /// Значение токена.
    pub(crate) value: String,

    /// Дата и время когда токен станет не валидным.
    expire_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Создаёт новый инстанс токена.
    pub fn new(value: String, expire_at: Option<DateTime<Utc>>) -> TokenNewResult {
        let value = value.trim().to_owned();
        if value.is_empty() {
            return Err(TokenNewError::EmptyValue);
        }

        let token = Self { value, expire_at };

        if token.is_expired() {
            return Err(TokenNewError::AlreadyExpired);
        }

        Ok(token)
    }

    /// Проверяет что токен уже протух.
    pub fn is_expired(&self) -> bool {
        matches!(self.expire_at, Some(date) if date < Utc::now())
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

pub type TokenNewResult = std::result::Result<Token, TokenNewError>;

#[derive(Debug, thiserror::Error)]
pub enum TokenNewError {
    #[error("value is empty")]
    EmptyValue,

    #[error("already expired")]
    AlreadyExpired,
}
