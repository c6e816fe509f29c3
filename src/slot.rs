use std::{fmt::Display, fs, path::Path};

use log::debug;
use reqwest::Method;

use crate::{
    error::{Error, Result, ValidationError},
    model::{Category, OwnerType},
};

/// Максимальный размер загружаемого акта.
pub const MAX_ACTA_SIZE: u64 = 10 * 1024 * 1024;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Адрес слота для подписанного акта.
///
/// Слот однозначно определяется тройкой (владелец, идентификатор владельца,
/// категория). В слоте может лежать не больше одного файла.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    owner: OwnerType,
    owner_id: i64,
    category: Category,
}

impl SlotId {
    /// Создаёт адрес слота, проверяя что категория допустима для владельца.
    ///
    /// У выдач идентификатор уже привязан к категории, поэтому подходит любая.
    /// У увольнений два слота: для компьютера и для телефона. У продажи слот
    /// один и без категории.
    pub fn new(
        owner: OwnerType,
        owner_id: i64,
        category: Category,
    ) -> std::result::Result<Self, ValidationError> {
        let valid = match owner {
            OwnerType::Assignment => true,
            OwnerType::Termination => category != Category::None,
            OwnerType::Sale => category == Category::None,
        };

        if !valid {
            return Err(ValidationError::CategoryNotApplicable { owner, category });
        }

        Ok(Self {
            owner,
            owner_id,
            category,
        })
    }

    pub fn assignment(owner_id: i64, category: Category) -> Self {
        Self {
            owner: OwnerType::Assignment,
            owner_id,
            category,
        }
    }

    pub fn sale(owner_id: i64) -> Self {
        Self {
            owner: OwnerType::Sale,
            owner_id,
            category: Category::None,
        }
    }

    pub fn owner(&self) -> OwnerType {
        self.owner
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub(crate) fn upload_path(&self) -> String {
        self.verb_path("upload")
    }

    pub(crate) fn download_path(&self) -> String {
        self.verb_path("download")
    }

    pub(crate) fn delete_path(&self) -> String {
        self.verb_path("delete")
    }

    fn verb_path(&self, verb: &str) -> String {
        match self.owner {
            OwnerType::Assignment => format!("/assignments/{}/{}-acta", self.owner_id, verb),
            OwnerType::Termination => format!(
                "/terminations/{}/{}-{}-acta",
                self.owner_id, verb, self.category
            ),
            OwnerType::Sale => format!("/sales/{}/{}-acta", self.owner_id, verb),
        }
    }

    /// Имя файла, под которым скачанный акт сохраняется локально.
    pub fn file_name(&self) -> String {
        match self.category {
            Category::None => format!("acta_{}_{}.pdf", self.owner, self.owner_id),
            c => format!("acta_{}_{}_{}.pdf", self.owner, self.owner_id, c),
        }
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.category {
            Category::None => write!(f, "{} #{}", self.owner, self.owner_id),
            c => write!(f, "{} #{} ({})", self.owner, self.owner_id, c),
        }
    }
}

/// Состояние слота.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Подписанного акта нет.
    #[default]
    Absent,

    /// Акт загружен.
    /// Путь выдаёт бэкенд и для нас он непрозрачен.
    Present { storage_path: String },
}

/// Операции над слотом.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Upload,
    Download,
    Delete,
}

impl SlotState {
    /// Строит состояние по пути из ответа бэкенда.
    pub fn from_path(path: Option<String>) -> Self {
        match path {
            Some(p) if !p.trim().is_empty() => Self::Present { storage_path: p },
            _ => Self::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    pub fn storage_path(&self) -> Option<&str> {
        match self {
            Self::Present { storage_path } => Some(storage_path),
            Self::Absent => None,
        }
    }

    /// Проверяет что операция допустима в текущем состоянии.
    ///
    /// Загрузка поверх существующего акта запрещена: заменить подписанный
    /// документ можно только удалив его.
    pub fn check(
        &self,
        slot: SlotId,
        transition: Transition,
    ) -> std::result::Result<(), ValidationError> {
        match (self, transition) {
            (Self::Absent, Transition::Upload) => Ok(()),
            (Self::Present { .. }, Transition::Upload) => Err(ValidationError::SlotLocked(slot)),
            (Self::Present { .. }, _) => Ok(()),
            (Self::Absent, _) => Err(ValidationError::SlotEmpty(slot)),
        }
    }
}

/// Локальный PDF файл, прошедший проверки перед загрузкой.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFile {
    name: String,
    bytes: Vec<u8>,
}

impl PdfFile {
    /// Читает файл с диска.
    ///
    /// Тип определяется по имени файла, размер проверяется до чтения
    /// содержимого.
    pub fn open(path: &Path) -> Result<Self> {
        let content_type = mime_guess::from_path(path).first_or_octet_stream();

        let metadata = fs::metadata(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;

        Self::check(content_type.essence_str(), metadata.len())?;

        let bytes = fs::read(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "acta.pdf".to_owned());

        debug!("Файл {:?} прошёл проверки, {} байт", path, bytes.len());

        Ok(Self::from_parts(name, content_type.essence_str(), bytes)?)
    }

    pub fn from_parts(
        name: String,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> std::result::Result<Self, ValidationError> {
        Self::check(content_type, bytes.len() as u64)?;
        Ok(Self { name, bytes })
    }

    /// Тип должен быть ровно application/pdf, размер не больше 10 МиБ.
    pub fn check(content_type: &str, size: u64) -> std::result::Result<(), ValidationError> {
        if content_type != PDF_CONTENT_TYPE {
            return Err(ValidationError::NotPdf(content_type.to_owned()));
        }

        if size > MAX_ACTA_SIZE {
            return Err(ValidationError::TooLarge {
                size,
                limit: MAX_ACTA_SIZE,
            });
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<u8>) {
        (self.name, self.bytes)
    }
}

/// Акт, сгенерированный системой для печати и подписи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedActa {
    owner: OwnerType,
    owner_id: i64,
    category: Category,
}

impl GeneratedActa {
    pub fn new(
        owner: OwnerType,
        owner_id: i64,
        category: Category,
    ) -> std::result::Result<Self, ValidationError> {
        // Правила те же, что и у слотов подписанных актов.
        let slot = SlotId::new(owner, owner_id, category)?;
        Ok(Self {
            owner: slot.owner,
            owner_id: slot.owner_id,
            category: slot.category,
        })
    }

    pub fn owner(&self) -> OwnerType {
        self.owner
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }

    /// HTTP метод и путь, по которым бэкенд отдаёт сгенерированный акт.
    pub(crate) fn endpoint(&self) -> (Method, String) {
        match self.owner {
            OwnerType::Assignment => (Method::GET, format!("/assignments/{}/acta", self.owner_id)),
            OwnerType::Termination => (
                Method::GET,
                format!("/terminations/{}/acta-{}", self.owner_id, self.category),
            ),
            OwnerType::Sale => (
                Method::POST,
                format!("/sales/{}/generate-acta", self.owner_id),
            ),
        }
    }

    pub fn file_name(&self) -> String {
        match self.category {
            Category::None => format!("acta_generada_{}_{}.pdf", self.owner, self.owner_id),
            c => format!("acta_generada_{}_{}_{}.pdf", self.owner, self.owner_id, c),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn upload_allowed_only_for_pdf_within_limit() {
        let cases = [
            (PDF_CONTENT_TYPE, 0, true),
            (PDF_CONTENT_TYPE, MAX_ACTA_SIZE, true),
            (PDF_CONTENT_TYPE, MAX_ACTA_SIZE + 1, false),
            ("application/octet-stream", 100, false),
            ("image/png", 100, false),
            ("application/pdf; charset=binary", 100, false),
        ];

        for (content_type, size, ok) in cases {
            assert_eq!(
                PdfFile::check(content_type, size).is_ok(),
                ok,
                "{} / {}",
                content_type,
                size
            );
        }
    }

    #[test]
    fn open_rejects_non_pdf_by_name() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"not a pdf").unwrap();

        let err = PdfFile::open(file.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NotPdf(ref t)) if t == "image/png"
        ));
    }

    #[test]
    fn open_reads_pdf() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4 signed").unwrap();

        let pdf = PdfFile::open(file.path()).unwrap();
        assert_eq!(pdf.len(), 15);
        assert!(pdf.name().ends_with(".pdf"));
    }

    #[test]
    fn present_slot_is_locked_for_upload() {
        let slot = SlotId::assignment(42, Category::Computer);
        let state = SlotState::from_path(Some("actas/asignaciones/42.pdf".to_owned()));

        // Сколько ни пытайся, пока акт не удалён, загрузка запрещена.
        for _ in 0..3 {
            assert_eq!(
                state.check(slot, Transition::Upload),
                Err(ValidationError::SlotLocked(slot))
            );
        }
        assert_eq!(state.check(slot, Transition::Download), Ok(()));
        assert_eq!(state.check(slot, Transition::Delete), Ok(()));
    }

    #[test]
    fn absent_slot_allows_only_upload() {
        let slot = SlotId::sale(3);
        let state = SlotState::from_path(Some("  ".to_owned()));

        assert_eq!(state, SlotState::Absent);
        assert_eq!(state.check(slot, Transition::Upload), Ok(()));
        assert_eq!(
            state.check(slot, Transition::Delete),
            Err(ValidationError::SlotEmpty(slot))
        );
    }

    #[test]
    fn slot_paths() {
        assert_eq!(
            SlotId::assignment(42, Category::Mobile).upload_path(),
            "/assignments/42/upload-acta"
        );

        let t = SlotId::new(OwnerType::Termination, 7, Category::Mobile).unwrap();
        assert_eq!(t.delete_path(), "/terminations/7/delete-mobile-acta");
        assert_eq!(t.file_name(), "acta_termination_7_mobile.pdf");

        assert_eq!(SlotId::sale(9).download_path(), "/sales/9/download-acta");
    }

    #[test]
    fn invalid_category_for_owner() {
        assert_eq!(
            SlotId::new(OwnerType::Termination, 1, Category::None),
            Err(ValidationError::CategoryNotApplicable {
                owner: OwnerType::Termination,
                category: Category::None,
            })
        );
        assert!(SlotId::new(OwnerType::Sale, 1, Category::Computer).is_err());
    }

    #[test]
    fn generated_acta_endpoints() {
        let a = GeneratedActa::new(OwnerType::Assignment, 42, Category::None).unwrap();
        assert_eq!(a.endpoint(), (Method::GET, "/assignments/42/acta".to_owned()));

        let t = GeneratedActa::new(OwnerType::Termination, 5, Category::Computer).unwrap();
        assert_eq!(t.endpoint(), (Method::GET, "/terminations/5/acta-computer".to_owned()));

        let s = GeneratedActa::new(OwnerType::Sale, 8, Category::None).unwrap();
        assert_eq!(s.endpoint(), (Method::POST, "/sales/8/generate-acta".to_owned()));
    }
}
