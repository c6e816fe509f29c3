use std::time::Duration;

use log::debug;
use reqwest::{
    blocking::{multipart, RequestBuilder, Response},
    header::CONTENT_TYPE,
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    model::{AccessToken, Device},
    slot::{GeneratedActa, PdfFile, SlotId, PDF_CONTENT_TYPE},
};

use super::models::{
    ActaInfo, ActasStatus, BuyerMatch, DeviceList, EmployeeMatch, ErrorBody, SaleCreated,
    SaleInfo, SaleRequest, TerminationDetail, TerminationPage, UploadResponse,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("send request")]
    Transport(#[from] reqwest::Error),

    #[error("backend responded with {status}")]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("decode response")]
    Decode(#[from] serde_json::Error),

    #[error("expected a PDF document, backend sent {0}")]
    NotPdf(String),
}

impl Error {
    /// Человекочитаемое описание ошибки от бэкенда, если он его прислал.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

pub(super) const USER_AGENT: &str = concat!("actas/", env!("CARGO_PKG_VERSION"));

/// Внутренний клиент.
pub(super) struct InnerClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl InnerClient {
    /// Создаёт новый инстанс внутреннего клиента.
    pub(super) fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub(super) fn get<R: DeserializeOwned>(
        &self,
        api_method: &str,
        query: &[(&str, &str)],
        access_token: Option<&AccessToken>,
    ) -> Result<R> {
        let req = self.request(Method::GET, api_method, access_token).query(query);
        Self::decode(self.execute(req)?)
    }

    pub(super) fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        api_method: &str,
        payload: Option<&B>,
        access_token: Option<&AccessToken>,
    ) -> Result<R> {
        let mut req = self.request(Method::POST, api_method, access_token);

        if let Some(b) = payload {
            req = req.json(b)
        }

        Self::decode(self.execute(req)?)
    }

    pub(super) fn post_multipart<R: DeserializeOwned>(
        &self,
        api_method: &str,
        form: multipart::Form,
        access_token: Option<&AccessToken>,
    ) -> Result<R> {
        let req = self
            .request(Method::POST, api_method, access_token)
            .multipart(form);

        Self::decode(self.execute(req)?)
    }

    pub(super) fn bytes(
        &self,
        http_method: Method,
        api_method: &str,
        access_token: Option<&AccessToken>,
    ) -> Result<Vec<u8>> {
        let req = self.request(http_method, api_method, access_token);
        let resp = self.execute(req)?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        debug!("Тип содержимого ответа: {:?}", content_type);

        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if !essence.eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
            let got = if essence.is_empty() { "nothing" } else { essence };
            return Err(Error::NotPdf(got.to_owned()));
        }

        Ok(resp.bytes()?.to_vec())
    }

    pub(super) fn delete(
        &self,
        api_method: &str,
        access_token: Option<&AccessToken>,
    ) -> Result<()> {
        let req = self.request(Method::DELETE, api_method, access_token);
        let resp = self.execute(req)?;

        debug!("Тело ответа на DELETE {}: {}", api_method, resp.text()?);

        Ok(())
    }

    fn request(
        &self,
        http_method: Method,
        api_method: &str,
        access_token: Option<&AccessToken>,
    ) -> RequestBuilder {
        let url = self.build_url(api_method);

        debug!("Запрос в АПИ: {} {}", http_method, url);
        let mut req_builder = self.client.request(http_method, &url);

        if let Some(t) = access_token {
            req_builder = req_builder.bearer_auth(&t.value)
        }

        req_builder
    }

    fn execute(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text()?;
            debug!("Бэкенд ответил {}: {}", status, text);

            let detail = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(ErrorBody::message);

            return Err(Error::Status { status, detail });
        }

        Ok(resp)
    }

    fn decode<R: DeserializeOwned>(resp: Response) -> Result<R> {
        let url = resp.url().to_string();
        let body = resp.text()?;

        debug!("Тело ответа на {}: {}", url, body);

        let data = serde_json::from_str(&body)?;

        Ok(data)
    }

    fn build_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method.trim_start_matches('/'))
    }
}

/// Клиент бэкенда инвентаря.
///
/// Токен берётся из сессии и передаётся в каждый запрос, если он есть.
pub struct ActaClient {
    client: InnerClient,
    access_token: Option<AccessToken>,
}

impl ActaClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        access_token: Option<AccessToken>,
    ) -> Result<Self> {
        Ok(Self {
            client: InnerClient::new(base_url, timeout)?,
            access_token,
        })
    }

    fn token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Сводка по актам сотрудника: есть ли у него оборудование каждой
    /// категории и какие выдачи отвечают за акты.
    pub fn employee_acta_info(&self, employee_id: i64) -> Result<ActaInfo> {
        self.client
            .get(&format!("/employees/{}/acta-info", employee_id), &[], self.token())
    }

    pub fn termination(&self, termination_id: i64) -> Result<TerminationDetail> {
        self.client
            .get(&format!("/terminations/{}", termination_id), &[], self.token())
    }

    /// Страница списка увольнений.
    /// Только здесь бэкенд считает, какие акты применимы к увольнению.
    pub fn terminations(&self, search: &str, skip: u32, limit: u32) -> Result<TerminationPage> {
        let skip = skip.to_string();
        let limit = limit.to_string();

        self.client.get(
            "/terminations/",
            &[("search", search), ("skip", &skip), ("limit", &limit)],
            self.token(),
        )
    }

    pub fn sale(&self, sale_id: i64) -> Result<SaleInfo> {
        self.client.get(&format!("/sales/{}", sale_id), &[], self.token())
    }

    /// Загружает подписанный акт в слот. Поле формы называется "file".
    pub fn upload_acta(&self, slot: &SlotId, file: PdfFile) -> Result<UploadResponse> {
        let (name, bytes) = file.into_parts();

        let part = multipart::Part::bytes(bytes)
            .file_name(name)
            .mime_str(PDF_CONTENT_TYPE)?;
        let form = multipart::Form::new().part("file", part);

        self.client
            .post_multipart(&slot.upload_path(), form, self.token())
    }

    pub fn download_acta(&self, slot: &SlotId) -> Result<Vec<u8>> {
        self.client
            .bytes(Method::GET, &slot.download_path(), self.token())
    }

    pub fn delete_acta(&self, slot: &SlotId) -> Result<()> {
        self.client.delete(&slot.delete_path(), self.token())
    }

    /// Скачивает акт, сгенерированный системой для печати.
    pub fn download_generated(&self, acta: &GeneratedActa) -> Result<Vec<u8>> {
        let (method, path) = acta.endpoint();
        self.client.bytes(method, &path, self.token())
    }

    pub fn search_employees(&self, query: &str) -> Result<Vec<EmployeeMatch>> {
        self.client
            .get("/sales/employees/search", &[("q", query)], self.token())
    }

    pub fn search_buyers(&self, query: &str) -> Result<Vec<BuyerMatch>> {
        self.client
            .get("/sales/buyers/search", &[("q", query)], self.token())
    }

    pub fn devices(&self) -> Result<Vec<Device>> {
        let list: DeviceList = self
            .client
            .get("/devices/", &[("limit", "1000")], self.token())?;
        Ok(list.into())
    }

    pub fn create_sale(&self, sale: &SaleRequest) -> Result<SaleCreated> {
        self.client.post("/sales/", Some(sale), self.token())
    }

    pub fn actas_status(&self, status_filter: &str, search: Option<&str>) -> Result<ActasStatus> {
        let mut query = vec![("status_filter", status_filter)];
        if let Some(s) = search {
            query.push(("search", s));
        }

        self.client.get("/actas-status/", &query, self.token())
    }
}
