use std::{io, path::PathBuf};

use crate::{
    api,
    model::{Category, OwnerType},
    slot::SlotId,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Любая ошибка операций над актами и продажами.
///
/// Ни одна из ошибок не фатальна для приложения: каждая относится только к
/// вызвавшей её операции и лечится повтором действия.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] api::Error),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("access acta file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Сообщение для пользователя.
    /// Предпочитаем текст от бэкенда, иначе используем `generic`.
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            Self::Api(e) => match e.detail() {
                Some(detail) => detail.to_owned(),
                None => generic.to_owned(),
            },
            Self::Validation(e) => e.to_string(),
            Self::Resolution(e) => e.to_string(),
            Self::Io { source, .. } => format!("{}: {}", generic, source),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Нарушение локальных предусловий.
/// Такие ошибки возникают до любого сетевого запроса.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("only PDF files are allowed, got {0}")]
    NotPdf(String),

    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("{0} already holds a signed acta, delete it before uploading a new one")]
    SlotLocked(SlotId),

    #[error("{0} holds no signed acta")]
    SlotEmpty(SlotId),

    #[error("category {category} is not applicable to {owner} actas")]
    CategoryNotApplicable { owner: OwnerType, category: Category },

    #[error("{0} shouldn't be empty")]
    Empty(&'static str),

    #[error("malformed email \"{0}\"")]
    MalformedEmail(String),

    #[error("at least one device should be selected")]
    NoDevices,

    #[error("device {0} is not available for sale")]
    DeviceUnavailable(i64),

    #[error("device {0} is already selected")]
    DuplicateDevice(i64),

    #[error("device {0} is not selected")]
    DeviceNotSelected(i64),

    #[error("total price is too large")]
    PriceOverflow,

    #[error("sale is already registered")]
    AlreadySubmitted,
}

/// Не удалось определить, к какой записи бэкенда относится акт.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("no addressable record could be determined for {0}")]
    NoAddressableRecord(String),

    #[error("{0} has neither computer nor mobile devices")]
    NoApplicableCategory(String),

    #[error("no {category} acta slot is available for {reference}")]
    SlotNotOffered { reference: String, category: Category },

    #[error("{0} is missing from the backend list")]
    NotListed(String),
}
