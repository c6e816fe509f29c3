use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    model::{BuyerDni, BuyerName, Device, Email, Price},
    sale::PaymentMethod,
};

/// Тело ответа с ошибкой.
/// `detail` бывает строкой, а бывает списком ошибок валидации.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(self) -> Option<String> {
        match self.detail {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,
}

/// Сводка по актам сотрудника в разрезе категорий оборудования.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActaInfo {
    #[serde(default)]
    pub employee_id: Option<i64>,

    #[serde(default)]
    pub employee_name: Option<String>,

    #[serde(default)]
    pub has_computer_devices: bool,

    #[serde(default)]
    pub has_mobile_devices: bool,

    #[serde(default)]
    pub computer_assignment_id: Option<i64>,

    #[serde(default)]
    pub mobile_assignment_id: Option<i64>,

    #[serde(default)]
    pub computer_acta_path: Option<String>,

    #[serde(default)]
    pub mobile_acta_path: Option<String>,
}

/// Сотрудник в составе записи об увольнении.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerminatedEmployee {
    pub id: i64,

    pub full_name: String,

    #[serde(default)]
    pub dni: Option<String>,
}

/// Ответ `GET /terminations/{id}`.
/// Флагов по категориям здесь нет, они есть только в строках списка.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerminationDetail {
    pub id: i64,

    pub employee_id: i64,

    pub employee: TerminatedEmployee,

    pub equipment_returned_count: u32,

    #[serde(default)]
    pub computer_acta_path: Option<String>,

    #[serde(default)]
    pub mobile_acta_path: Option<String>,
}

impl TerminationDetail {
    /// Строка для поиска увольнения в списке.
    pub fn search_key(&self) -> &str {
        match self.employee.dni.as_deref().map(str::trim) {
            Some(dni) if !dni.is_empty() => dni,
            _ => &self.employee.full_name,
        }
    }
}

/// Строка списка `GET /terminations/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerminationRow {
    pub id: i64,

    pub employee_id: i64,

    pub computer_acta_available: bool,

    pub mobile_acta_available: bool,

    #[serde(default)]
    pub computer_acta_path: Option<String>,

    #[serde(default)]
    pub mobile_acta_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerminationPage {
    pub items: Vec<TerminationRow>,

    pub total: u32,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaleInfo {
    pub id: i64,

    #[serde(default)]
    pub buyer_name: Option<String>,

    #[serde(default)]
    pub acta_path: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub path: Option<String>,
}

/// Сотрудник из поиска покупателей вместе с его текущим оборудованием.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmployeeMatch {
    pub employee_id: i64,

    pub full_name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub dni: Option<String>,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub laptop: Option<Device>,

    #[serde(default)]
    pub monitors: Option<Vec<Device>>,
}

impl EmployeeMatch {
    pub fn monitors(&self) -> &[Device] {
        self.monitors.as_deref().unwrap_or_default()
    }
}

/// Покупатель из прошлых продаж.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuyerMatch {
    pub buyer_name: String,

    #[serde(default)]
    pub buyer_dni: Option<String>,

    #[serde(default)]
    pub buyer_email: Option<String>,

    #[serde(default)]
    pub buyer_phone: Option<String>,
}

/// Список устройств приходит либо массивом, либо страницей.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum DeviceList {
    Page { items: Vec<Device> },
    Plain(Vec<Device>),
}

impl From<DeviceList> for Vec<Device> {
    fn from(value: DeviceList) -> Self {
        match value {
            DeviceList::Page { items } => items,
            DeviceList::Plain(items) => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRequest {
    pub buyer_name: BuyerName,
    pub buyer_dni: BuyerDni,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<Email>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_phone: Option<String>,

    pub buyer_address: String,
    pub sale_price: Price,
    pub payment_method: PaymentMethod,
    pub notes: String,
    pub device_ids: Vec<i64>,
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleItemRequest {
    pub device_id: i64,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaleCreated {
    pub id: i64,
}

/// Сводное состояние подписанных и ожидающих подписи актов.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActasStatus {
    #[serde(default)]
    pub assignment_computer: Vec<StatusEntry>,

    #[serde(default)]
    pub assignment_mobile: Vec<StatusEntry>,

    #[serde(default)]
    pub sales: Vec<StatusEntry>,

    #[serde(default)]
    pub terminations: Vec<StatusEntry>,

    #[serde(default)]
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[display(fmt = "выдача, компьютер")]
    AssignmentComputer,
    #[display(fmt = "выдача, телефон")]
    AssignmentMobile,
    #[display(fmt = "продажа")]
    Sale,
    #[display(fmt = "увольнение, компьютер")]
    TerminationComputer,
    #[display(fmt = "увольнение, телефон")]
    TerminationMobile,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,

    #[serde(default)]
    pub employee_id: Option<i64>,

    #[serde(default)]
    pub employee_name: String,

    #[serde(default)]
    pub employee_email: Option<String>,

    #[serde(default)]
    pub employee_location: Option<String>,

    #[serde(default)]
    pub assignment_id: Option<i64>,

    #[serde(default)]
    pub sale_id: Option<i64>,

    #[serde(default)]
    pub termination_id: Option<i64>,

    #[serde(default)]
    pub assignment_date: Option<String>,

    #[serde(default)]
    pub sale_date: Option<String>,

    #[serde(default)]
    pub termination_date: Option<String>,

    #[serde(default)]
    pub has_acta: bool,

    #[serde(default)]
    pub acta_path: Option<String>,

    #[serde(default)]
    pub days_pending: Option<i64>,
}

impl StatusEntry {
    /// Дата события, к которому относится акт.
    /// Бэкенд отдаёт то дату, то дату со временем, поэтому берём только дату.
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self
            .assignment_date
            .as_deref()
            .or(self.sale_date.as_deref())
            .or(self.termination_date.as_deref())?;

        NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusSummary {
    pub assignment_computer_signed: u32,
    pub assignment_computer_total: u32,
    pub assignment_computer_pending: u32,
    pub assignment_mobile_signed: u32,
    pub assignment_mobile_total: u32,
    pub assignment_mobile_pending: u32,
    pub sales_signed: u32,
    pub sales_total: u32,
    pub sales_pending: u32,
    pub terminations_signed: u32,
    pub terminations_total: u32,
    pub terminations_pending: u32,
    pub total_signed: u32,
    pub total: u32,
    pub total_pending: u32,
}
