//! Составление продажи оборудования.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        models::{BuyerMatch, EmployeeMatch, SaleItemRequest, SaleRequest},
        ActaClient,
    },
    attachment::AttachmentClient,
    error::{Result, ValidationError},
    model::{BuyerDni, BuyerName, Device, Email, Price, DEVICE_TYPE_LAPTOP, DEVICE_TYPE_MONITOR},
    search::{SearchField, Suggestion},
    slot::{SlotId, SlotState},
};

/// Цены по-умолчанию, которые подставляются при выборе устройства.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultPrices {
    pub laptop: u32,
    pub monitor: u32,
}

impl Default for DefaultPrices {
    fn default() -> Self {
        Self {
            laptop: 400,
            monitor: 50,
        }
    }
}

impl DefaultPrices {
    pub fn for_device_type(&self, device_type: &str) -> Price {
        match device_type {
            DEVICE_TYPE_LAPTOP => Price::new(self.laptop),
            DEVICE_TYPE_MONITOR => Price::new(self.monitor),
            _ => Price::new(0),
        }
    }
}

/// Способ оплаты.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    enum_iterator::Sequence,
)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "Efectivo")]
    #[display(fmt = "наличные")]
    Cash,

    #[serde(rename = "Transferencia")]
    #[display(fmt = "перевод")]
    Transfer,

    #[serde(rename = "Tarjeta")]
    #[display(fmt = "карта")]
    Card,

    #[serde(rename = "Otro")]
    #[display(fmt = "другое")]
    Other,
}

/// Поля покупателя в том виде, в котором их ввёл оператор.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuyerForm {
    pub name: String,
    pub dni: String,
    pub email: String,
    pub phone: String,
}

impl BuyerForm {
    pub fn get(&self, field: SearchField) -> &str {
        match field {
            SearchField::Name => &self.name,
            SearchField::Dni => &self.dni,
            SearchField::Email => &self.email,
            SearchField::Phone => &self.phone,
        }
    }

    fn set(&mut self, field: SearchField, value: String) {
        match field {
            SearchField::Name => self.name = value,
            SearchField::Dni => self.dni = value,
            SearchField::Email => self.email = value,
            SearchField::Phone => self.phone = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedDevice {
    pub device: Device,
    pub price: Price,
}

/// Итог зарегистрированной продажи.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleSummary {
    pub buyer_name: String,
    pub total_price: Price,
    pub device_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    pub sale_id: i64,
    pub summary: SaleSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Editing,
    Submitted(SaleReceipt),
}

/// Черновик продажи.
///
/// Пул доступных устройств читается один раз при открытии и дальше не
/// синхронизируется. После успешной регистрации черновик не меняется.
pub struct SaleComposer {
    pool: Vec<Device>,
    prices: DefaultPrices,
    buyer: BuyerForm,
    payment_method: PaymentMethod,
    notes: String,
    devices: Vec<SelectedDevice>,
    phase: Phase,
}

impl SaleComposer {
    /// Создаёт черновик над уже загруженным пулом.
    /// В пул попадают только доступные ноутбуки и мониторы.
    pub fn new(pool: Vec<Device>, prices: DefaultPrices) -> Self {
        let pool: Vec<_> = pool
            .into_iter()
            .filter(|d| d.is_available() && d.is_sellable_type())
            .collect();

        debug!("В пуле продажи {} устройств", pool.len());

        Self {
            pool,
            prices,
            buyer: BuyerForm::default(),
            payment_method: PaymentMethod::default(),
            notes: String::new(),
            devices: Vec::new(),
            phase: Phase::Editing,
        }
    }

    pub fn open(api: &ActaClient, prices: DefaultPrices) -> Result<Self> {
        let pool = api.devices()?;
        Ok(Self::new(pool, prices))
    }

    pub fn buyer(&self) -> &BuyerForm {
        &self.buyer
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn devices(&self) -> &[SelectedDevice] {
        &self.devices
    }

    pub fn receipt(&self) -> Option<&SaleReceipt> {
        match &self.phase {
            Phase::Submitted(r) => Some(r),
            Phase::Editing => None,
        }
    }

    fn ensure_editing(&self) -> std::result::Result<(), ValidationError> {
        match self.phase {
            Phase::Editing => Ok(()),
            Phase::Submitted(_) => Err(ValidationError::AlreadySubmitted),
        }
    }

    pub fn set_buyer_field(
        &mut self,
        field: SearchField,
        value: &str,
    ) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;
        self.buyer.set(field, value.to_owned());
        Ok(())
    }

    pub fn set_payment_method(
        &mut self,
        method: PaymentMethod,
    ) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;
        self.payment_method = method;
        Ok(())
    }

    pub fn set_notes(&mut self, notes: &str) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;
        self.notes = notes.to_owned();
        Ok(())
    }

    /// Заполняет черновик из подсказки.
    ///
    /// Сотрудник заменяет и покупателя, и весь список устройств: его ноутбук
    /// и все мониторы по ценам по-умолчанию. Прошлый покупатель меняет только
    /// поля покупателя.
    pub fn apply_suggestion(
        &mut self,
        suggestion: &Suggestion,
    ) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;

        match suggestion {
            Suggestion::Employee(e) => self.apply_employee(e),
            Suggestion::Buyer(b) => self.apply_buyer(b),
        }

        Ok(())
    }

    fn apply_employee(&mut self, employee: &EmployeeMatch) {
        self.buyer = BuyerForm {
            name: employee.full_name.clone(),
            dni: employee.dni.clone().unwrap_or_default(),
            email: employee.email.clone().unwrap_or_default(),
            phone: String::new(),
        };

        // Оборудование сотрудника выдано ему, а не свободно, поэтому пул
        // тут не проверяется.
        let laptop = employee
            .laptop
            .iter()
            .map(|d| (d, Price::new(self.prices.laptop)));
        let monitors = employee
            .monitors()
            .iter()
            .map(|d| (d, Price::new(self.prices.monitor)));

        let mut devices: Vec<SelectedDevice> = Vec::new();
        for (device, price) in laptop.chain(monitors) {
            if devices.iter().any(|s| s.device.id == device.id) {
                continue;
            }
            devices.push(SelectedDevice {
                device: device.clone(),
                price,
            });
        }

        info!(
            "Выбран сотрудник {}, устройств в продаже: {}",
            employee.employee_id,
            devices.len()
        );

        self.devices = devices;
    }

    fn apply_buyer(&mut self, buyer: &BuyerMatch) {
        self.buyer = BuyerForm {
            name: buyer.buyer_name.clone(),
            dni: buyer.buyer_dni.clone().unwrap_or_default(),
            email: buyer.buyer_email.clone().unwrap_or_default(),
            phone: buyer.buyer_phone.clone().unwrap_or_default(),
        };
    }

    /// Добавляет устройство из пула с ценой по-умолчанию для его типа.
    /// Повторное добавление ничего не меняет.
    pub fn add_device(&mut self, device_id: i64) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;

        if self.devices.iter().any(|s| s.device.id == device_id) {
            warn!("Устройство {} уже выбрано", device_id);
            return Err(ValidationError::DuplicateDevice(device_id));
        }

        let device = self
            .pool
            .iter()
            .find(|d| d.id == device_id)
            .ok_or(ValidationError::DeviceUnavailable(device_id))?;

        let price = self.prices.for_device_type(&device.device_type);
        self.total_with(price)?;

        self.devices.push(SelectedDevice {
            device: device.clone(),
            price,
        });

        Ok(())
    }

    pub fn remove_device(&mut self, device_id: i64) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;

        let pos = self.position(device_id)?;
        self.devices.remove(pos);

        Ok(())
    }

    pub fn set_price(
        &mut self,
        device_id: i64,
        price: Price,
    ) -> std::result::Result<(), ValidationError> {
        self.ensure_editing()?;

        let pos = self.position(device_id)?;

        let old = self.devices[pos].price;
        self.devices[pos].price = price;
        if let Err(e) = self.total_price() {
            self.devices[pos].price = old;
            return Err(e);
        }

        Ok(())
    }

    fn position(&self, device_id: i64) -> std::result::Result<usize, ValidationError> {
        self.devices
            .iter()
            .position(|s| s.device.id == device_id)
            .ok_or(ValidationError::DeviceNotSelected(device_id))
    }

    /// Сумма цен выбранных устройств.
    pub fn total_price(&self) -> std::result::Result<Price, ValidationError> {
        self.total_with(Price::new(0))
    }

    fn total_with(&self, extra: Price) -> std::result::Result<Price, ValidationError> {
        self.devices
            .iter()
            .try_fold(extra.get(), |sum, s| sum.checked_add(s.price.get()))
            .map(Price::new)
            .ok_or(ValidationError::PriceOverflow)
    }

    /// Ещё не выбранные устройства пула, подходящие под текст.
    pub fn filter_available(&self, text: &str) -> Vec<&Device> {
        self.pool
            .iter()
            .filter(|d| !self.devices.iter().any(|s| s.device.id == d.id))
            .filter(|d| d.matches(text))
            .collect()
    }

    /// Собирает запрос на создание продажи.
    /// Все проверки выполняются здесь, до обращения к бэкенду.
    pub fn to_request(&self) -> std::result::Result<SaleRequest, ValidationError> {
        self.ensure_editing()?;

        if self.devices.is_empty() {
            return Err(ValidationError::NoDevices);
        }

        let buyer_name = BuyerName::new(&self.buyer.name)?;
        let buyer_dni = BuyerDni::new(&self.buyer.dni)?;

        let buyer_email = match self.buyer.email.trim() {
            "" => None,
            email => Some(Email::new(email)?),
        };

        let buyer_phone = match self.buyer.phone.trim() {
            "" => None,
            phone => Some(phone.to_owned()),
        };

        Ok(SaleRequest {
            buyer_name,
            buyer_dni,
            buyer_email,
            buyer_phone,
            buyer_address: String::new(),
            sale_price: self.total_price()?,
            payment_method: self.payment_method,
            notes: self.notes.clone(),
            device_ids: self.devices.iter().map(|s| s.device.id).collect(),
            items: self
                .devices
                .iter()
                .map(|s| SaleItemRequest {
                    device_id: s.device.id,
                    price: s.price,
                })
                .collect(),
        })
    }

    /// Регистрирует продажу.
    ///
    /// Доступность устройств здесь повторно не проверяется: конфликт с
    /// параллельной продажей должен отклонить бэкенд.
    pub fn submit(&mut self, api: &ActaClient) -> Result<SaleReceipt> {
        let req = self.to_request()?;

        let created = api.create_sale(&req)?;

        let receipt = SaleReceipt {
            sale_id: created.id,
            summary: SaleSummary {
                buyer_name: req.buyer_name.into(),
                total_price: req.sale_price,
                device_count: req.device_ids.len(),
            },
        };

        info!(
            "Продажа {} зарегистрирована на сумму {}",
            receipt.sale_id, receipt.summary.total_price
        );

        self.phase = Phase::Submitted(receipt.clone());

        Ok(receipt)
    }

    /// Слот подписанного акта зарегистрированной продажи.
    pub fn acta_slot(&self) -> Option<SlotId> {
        self.receipt().map(|r| SlotId::sale(r.sale_id))
    }

    /// Клиент для загрузки акта продажи. Новая продажа акта не имеет.
    pub fn attachment<'a>(&self, api: &'a ActaClient) -> Option<AttachmentClient<'a>> {
        let slot = self.acta_slot()?;
        let sale_id = slot.owner_id();

        let client = AttachmentClient::new(api, slot, SlotState::Absent)
            .with_refresh(move || Ok(SlotState::from_path(api.sale(sale_id)?.acta_path)));

        Some(client)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server};

    use super::*;
    use crate::{error::Error, model::DEVICE_STATUS_AVAILABLE};

    fn device(id: i64, device_type: &str) -> Device {
        Device {
            id,
            device_type: device_type.to_owned(),
            brand: Some("Dell".to_owned()),
            model: Some(format!("Modelo {}", id)),
            serial_number: Some(format!("SN{:04}", id)),
            hostname: None,
            status: Some(DEVICE_STATUS_AVAILABLE.to_owned()),
        }
    }

    fn pool() -> Vec<Device> {
        vec![
            device(1, DEVICE_TYPE_LAPTOP),
            device(2, DEVICE_TYPE_MONITOR),
            device(3, DEVICE_TYPE_MONITOR),
            device(4, DEVICE_TYPE_LAPTOP),
        ]
    }

    fn composer() -> SaleComposer {
        SaleComposer::new(pool(), DefaultPrices::default())
    }

    fn employee() -> EmployeeMatch {
        EmployeeMatch {
            employee_id: 17,
            full_name: "Lucía Gómez".to_owned(),
            email: Some("lucia@example.com".to_owned()),
            dni: Some("30111222".to_owned()),
            position: None,
            location: None,
            laptop: Some(device(10, DEVICE_TYPE_LAPTOP)),
            monitors: Some(vec![device(11, DEVICE_TYPE_MONITOR), device(12, DEVICE_TYPE_MONITOR)]),
        }
    }

    fn fill_buyer(c: &mut SaleComposer) {
        c.set_buyer_field(SearchField::Name, "Ana Díaz").unwrap();
        c.set_buyer_field(SearchField::Dni, "28999111").unwrap();
    }

    #[test]
    fn pool_keeps_only_available_laptops_and_monitors() {
        let mut sold = device(5, DEVICE_TYPE_LAPTOP);
        sold.status = Some("sold".to_owned());
        let mut items = pool();
        items.push(sold);
        items.push(device(6, "celular"));

        let c = SaleComposer::new(items, DefaultPrices::default());

        let ids: Vec<_> = c.filter_available("").iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn total_follows_price_edits() {
        let mut c = composer();
        c.add_device(1).unwrap();
        c.add_device(2).unwrap();
        c.add_device(3).unwrap();

        assert_eq!(c.total_price(), Ok(Price::new(500)));

        c.set_price(3, Price::new(0)).unwrap();
        assert_eq!(c.total_price(), Ok(Price::new(450)));

        c.remove_device(1).unwrap();
        assert_eq!(c.total_price(), Ok(Price::new(50)));
    }

    #[test]
    fn overflowing_price_is_rejected() {
        let mut c = composer();
        c.add_device(1).unwrap();
        c.add_device(2).unwrap();

        c.set_price(1, Price::new(3_000_000_000)).unwrap();
        assert_eq!(
            c.set_price(2, Price::new(3_000_000_000)),
            Err(ValidationError::PriceOverflow)
        );

        assert_eq!(c.devices()[1].price, Price::new(50));
        assert_eq!(c.total_price(), Ok(Price::new(3_000_000_050)));
    }

    #[test]
    fn employee_suggestion_replaces_devices() {
        let mut c = composer();
        c.add_device(4).unwrap();
        c.set_buyer_field(SearchField::Phone, "11-5555-0000").unwrap();

        c.apply_suggestion(&Suggestion::Employee(employee())).unwrap();

        let ids: Vec<_> = c.devices().iter().map(|s| s.device.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(c.total_price(), Ok(Price::new(500)));
        assert_eq!(c.buyer().name, "Lucía Gómez");
        assert_eq!(c.buyer().dni, "30111222");
        assert_eq!(c.buyer().phone, "");
    }

    #[test]
    fn buyer_suggestion_keeps_devices() {
        let mut c = composer();
        c.add_device(4).unwrap();

        c.apply_suggestion(&Suggestion::Buyer(BuyerMatch {
            buyer_name: "Pedro Ruiz".to_owned(),
            buyer_dni: Some("20333444".to_owned()),
            buyer_email: None,
            buyer_phone: Some("11-4444-2222".to_owned()),
        }))
        .unwrap();

        assert_eq!(c.devices().len(), 1);
        assert_eq!(c.buyer().phone, "11-4444-2222");
        assert_eq!(c.buyer().email, "");
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut c = composer();
        c.add_device(2).unwrap();

        assert_eq!(c.add_device(2), Err(ValidationError::DuplicateDevice(2)));
        assert_eq!(c.devices().len(), 1);
        assert!(c.filter_available("").iter().all(|d| d.id != 2));
    }

    #[test]
    fn device_outside_pool_is_rejected() {
        let mut c = composer();

        assert_eq!(c.add_device(99), Err(ValidationError::DeviceUnavailable(99)));
        assert!(c.devices().is_empty());
    }

    #[test]
    fn filter_matches_serial_number() {
        let c = composer();

        let found: Vec<_> = c.filter_available("sn0003").iter().map(|d| d.id).collect();
        assert_eq!(found, vec![3]);
    }

    #[test]
    fn request_validation_order() {
        let mut c = composer();
        assert_eq!(c.to_request().unwrap_err(), ValidationError::NoDevices);

        c.add_device(1).unwrap();
        assert_eq!(c.to_request().unwrap_err(), ValidationError::Empty("buyer name"));

        c.set_buyer_field(SearchField::Name, "Ana").unwrap();
        assert_eq!(c.to_request().unwrap_err(), ValidationError::Empty("buyer dni"));

        c.set_buyer_field(SearchField::Dni, "1").unwrap();
        c.set_buyer_field(SearchField::Email, "ana").unwrap();
        assert_eq!(
            c.to_request().unwrap_err(),
            ValidationError::MalformedEmail("ana".to_owned())
        );

        c.set_buyer_field(SearchField::Email, " ").unwrap();
        let req = c.to_request().unwrap();
        assert_eq!(req.buyer_email, None);
        assert_eq!(req.sale_price, Price::new(400));
    }

    #[test]
    fn submit_without_devices_sends_nothing() {
        let mut server = Server::new();
        let m = server.mock("POST", "/sales/").expect(0).create();
        let api = ActaClient::new(&server.url(), Duration::from_secs(5), None).unwrap();

        let mut c = composer();
        fill_buyer(&mut c);

        let err = c.submit(&api).unwrap_err();

        m.assert();
        assert!(matches!(err, Error::Validation(ValidationError::NoDevices)));
        assert!(c.receipt().is_none());
    }

    #[test]
    fn submit_sends_itemized_sale_and_locks_draft() {
        let mut server = Server::new();
        let m = server
            .mock("POST", "/sales/")
            .match_body(Matcher::Json(serde_json::json!({
                "buyer_name": "Ana Díaz",
                "buyer_dni": "28999111",
                "buyer_address": "",
                "sale_price": 450,
                "payment_method": "Transferencia",
                "notes": "",
                "device_ids": [1, 2],
                "items": [
                    {"device_id": 1, "price": 400},
                    {"device_id": 2, "price": 50},
                ],
            })))
            .with_status(201)
            .with_body(r#"{"id": 77}"#)
            .create();
        let api = ActaClient::new(&server.url(), Duration::from_secs(5), None).unwrap();

        let mut c = composer();
        fill_buyer(&mut c);
        c.set_payment_method(PaymentMethod::Transfer).unwrap();
        c.add_device(1).unwrap();
        c.add_device(2).unwrap();

        let receipt = c.submit(&api).unwrap();

        m.assert();
        assert_eq!(receipt.sale_id, 77);
        assert_eq!(receipt.summary.total_price, Price::new(450));
        assert_eq!(receipt.summary.device_count, 2);
        assert_eq!(c.acta_slot(), Some(SlotId::sale(77)));
        assert_eq!(c.add_device(3), Err(ValidationError::AlreadySubmitted));
    }

    #[test]
    fn backend_rejection_keeps_draft_editable() {
        let mut server = Server::new();
        server
            .mock("POST", "/sales/")
            .with_status(400)
            .with_body(r#"{"detail": "Device 1 is not available"}"#)
            .create();
        let api = ActaClient::new(&server.url(), Duration::from_secs(5), None).unwrap();

        let mut c = composer();
        fill_buyer(&mut c);
        c.add_device(1).unwrap();

        let err = c.submit(&api).unwrap_err();

        assert_eq!(err.user_message("sale failed"), "Device 1 is not available");
        assert!(c.receipt().is_none());
        assert!(c.add_device(2).is_ok());
    }
}
