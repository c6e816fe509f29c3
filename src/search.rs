//! Поиск покупателя по сотрудникам и прошлым продажам.
//!
//! Время передаётся явно, поэтому задержки и устаревание ответов проверяются
//! без реальных таймеров.

use std::{
    panic,
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    api::{
        models::{BuyerMatch, EmployeeMatch},
        ActaClient,
    },
    error::Result,
};

/// Пауза после ввода, через которую запускается поиск.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Минимальная длина запроса.
pub const MIN_QUERY_LEN: usize = 2;

/// Сколько подсказки остаются видны после потери фокуса.
pub const BLUR_GRACE: Duration = Duration::from_millis(200);

/// Поле покупателя, из которого запускается поиск.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, enum_iterator::Sequence,
)]
pub enum SearchField {
    #[display(fmt = "имя")]
    Name,

    #[display(fmt = "DNI")]
    Dni,

    #[display(fmt = "email")]
    Email,

    #[display(fmt = "телефон")]
    Phone,
}

/// Подсказка с пометкой источника.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    Employee(EmployeeMatch),
    Buyer(BuyerMatch),
}

impl Suggestion {
    /// Склеивает результаты: сначала сотрудники, потом покупатели.
    /// Порядок внутри каждой группы сохраняется как пришёл.
    pub fn merge(employees: Vec<EmployeeMatch>, buyers: Vec<BuyerMatch>) -> Vec<Self> {
        employees
            .into_iter()
            .map(Self::Employee)
            .chain(buyers.into_iter().map(Self::Buyer))
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Employee(e) => &e.full_name,
            Self::Buyer(b) => &b.buyer_name,
        }
    }
}

impl std::fmt::Display for Suggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Employee(e) => {
                write!(f, "[сотрудник] {}", e.full_name)?;
                if let Some(dni) = &e.dni {
                    write!(f, ", DNI {}", dni)?;
                }
                if let Some(position) = &e.position {
                    write!(f, ", {}", position)?;
                }
                Ok(())
            }
            Self::Buyer(b) => {
                write!(f, "[покупатель] {}", b.buyer_name)?;
                if let Some(dni) = &b.buyer_dni {
                    write!(f, ", DNI {}", dni)?;
                }
                Ok(())
            }
        }
    }
}

/// Запрашивает оба источника параллельно и склеивает ответы.
/// Если упал хотя бы один запрос, весь поиск считается неудачным.
pub fn search_people(api: &ActaClient, query: &str) -> Result<Vec<Suggestion>> {
    let (employees, buyers) = thread::scope(|s| {
        let employees = s.spawn(|| api.search_employees(query));
        let buyers = s.spawn(|| api.search_buyers(query));

        (
            employees.join().unwrap_or_else(|e| panic::resume_unwind(e)),
            buyers.join().unwrap_or_else(|e| panic::resume_unwind(e)),
        )
    });

    let merged = Suggestion::merge(employees?, buyers?);

    debug!("По запросу {:?} найдено подсказок: {}", query, merged.len());

    Ok(merged)
}

/// Запланированный поиск.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    field: SearchField,
    query: String,
}

impl SearchTicket {
    pub fn field(&self) -> SearchField {
        self.field
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug)]
struct Pending {
    due: Instant,
    ticket: SearchTicket,
}

/// Состояние подсказок для формы покупателя.
///
/// Каждый ввод увеличивает поколение. Ответ на поиск принимается, только если
/// его поколение последнее, так что устаревший ответ не может затереть
/// свежий.
#[derive(Debug, Default)]
pub struct SearchSession {
    generation: u64,
    active: Option<SearchField>,
    hide_at: Option<Instant>,
    pending: Option<Pending>,
    suggestions: Vec<Suggestion>,
    origin: Option<SearchField>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<SearchField> {
        self.active
    }

    /// Ввод в поле делает его активным и откладывает поиск на [`DEBOUNCE`].
    /// Предыдущий отложенный поиск отменяется.
    pub fn input(&mut self, field: SearchField, text: &str, now: Instant) {
        self.generation += 1;
        self.active = Some(field);
        self.hide_at = None;

        let query = text.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            self.pending = None;
            self.clear();
            return;
        }

        self.pending = Some(Pending {
            due: now + DEBOUNCE,
            ticket: SearchTicket {
                generation: self.generation,
                field,
                query: query.to_owned(),
            },
        });
    }

    pub fn focus(&mut self, field: SearchField) {
        if self.active != Some(field) {
            self.clear();
        }
        self.active = Some(field);
        self.hide_at = None;
    }

    /// Потеря фокуса. Подсказки прячутся через [`BLUR_GRACE`], чтобы клик
    /// по подсказке успел сработать.
    pub fn blur(&mut self, now: Instant) {
        if self.active.is_some() {
            self.hide_at = Some(now + BLUR_GRACE);
        }
    }

    /// Когда нужно будет вызвать [`Self::poll`].
    pub fn next_due(&self) -> Option<Instant> {
        match (self.pending.as_ref().map(|p| p.due), self.hide_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Продвигает таймеры. Возвращает поиск, который пора выполнить.
    pub fn poll(&mut self, now: Instant) -> Option<SearchTicket> {
        if matches!(self.hide_at, Some(t) if t <= now) {
            self.active = None;
            self.hide_at = None;
        }

        if self.pending.as_ref().is_some_and(|p| p.due <= now) {
            return self.pending.take().map(|p| p.ticket);
        }

        None
    }

    /// Принимает результаты поиска.
    /// Возвращает `false`, если ответ устарел и был отброшен.
    pub fn complete(&mut self, ticket: &SearchTicket, results: Vec<Suggestion>) -> bool {
        if ticket.generation != self.generation {
            warn!(
                "Отброшен устаревший ответ на {:?} (поколение {}, текущее {})",
                ticket.query, ticket.generation, self.generation
            );
            return false;
        }

        self.suggestions = results;
        self.origin = Some(ticket.field);

        true
    }

    fn is_visible(&self, now: Instant) -> bool {
        self.active.is_some() && self.hide_at.map_or(true, |t| now < t)
    }

    /// Подсказки видны только у поля, из которого запущен поиск, пока оно
    /// активно.
    pub fn suggestions_for(&self, field: SearchField, now: Instant) -> &[Suggestion] {
        if self.is_visible(now) && self.active == Some(field) && self.origin == Some(field) {
            &self.suggestions
        } else {
            &[]
        }
    }

    /// Выбор подсказки. Список очищается, поле перестаёт быть активным.
    pub fn choose(&mut self, field: SearchField, index: usize, now: Instant) -> Option<Suggestion> {
        let chosen = self.suggestions_for(field, now).get(index).cloned()?;

        self.generation += 1;
        self.active = None;
        self.hide_at = None;
        self.pending = None;
        self.clear();

        Some(chosen)
    }

    fn clear(&mut self) {
        self.suggestions.clear();
        self.origin = None;
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    fn employee(id: i64, name: &str) -> EmployeeMatch {
        EmployeeMatch {
            employee_id: id,
            full_name: name.to_owned(),
            email: None,
            dni: None,
            position: None,
            location: None,
            laptop: None,
            monitors: None,
        }
    }

    fn buyer(name: &str) -> BuyerMatch {
        BuyerMatch {
            buyer_name: name.to_owned(),
            buyer_dni: None,
            buyer_email: None,
            buyer_phone: None,
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn merge_puts_employees_first_in_arrival_order() {
        let merged = Suggestion::merge(
            vec![employee(2, "Zoe"), employee(1, "Abel")],
            vec![buyer("Bruno"), buyer("Ana")],
        );

        let names: Vec<_> = merged.iter().map(Suggestion::name).collect();
        assert_eq!(names, vec!["Zoe", "Abel", "Bruno", "Ana"]);
        assert!(matches!(merged[1], Suggestion::Employee(_)));
        assert!(matches!(merged[2], Suggestion::Buyer(_)));
    }

    #[test]
    fn only_last_input_fires() {
        let t0 = Instant::now();
        let mut s = SearchSession::new();

        s.input(SearchField::Name, "lu", t0);
        s.input(SearchField::Name, "luc", t0 + ms(300));

        assert_eq!(s.poll(t0 + ms(500)), None);

        let ticket = s.poll(t0 + ms(800)).unwrap();
        assert_eq!(ticket.query(), "luc");
        assert_eq!(ticket.field(), SearchField::Name);
        assert_eq!(s.poll(t0 + ms(2000)), None);
    }

    #[test]
    fn short_query_clears_and_schedules_nothing() {
        let t0 = Instant::now();
        let mut s = SearchSession::new();

        s.input(SearchField::Dni, "30", t0);
        let ticket = s.poll(t0 + DEBOUNCE).unwrap();
        assert!(s.complete(&ticket, vec![Suggestion::Buyer(buyer("Ana"))]));
        assert_eq!(s.suggestions_for(SearchField::Dni, t0 + DEBOUNCE).len(), 1);

        s.input(SearchField::Dni, "3", t0 + ms(600));

        assert!(s.suggestions_for(SearchField::Dni, t0 + ms(600)).is_empty());
        assert_eq!(s.next_due(), None);
    }

    #[test]
    fn stale_response_is_discarded() {
        let t0 = Instant::now();
        let mut s = SearchSession::new();

        s.input(SearchField::Name, "ana", t0);
        let old = s.poll(t0 + DEBOUNCE).unwrap();

        s.input(SearchField::Name, "anab", t0 + ms(600));
        let new = s.poll(t0 + ms(1100)).unwrap();

        assert!(s.complete(&new, vec![Suggestion::Buyer(buyer("Anabel"))]));
        assert!(!s.complete(&old, vec![Suggestion::Buyer(buyer("Ana"))]));

        let shown = s.suggestions_for(SearchField::Name, t0 + ms(1100));
        assert_eq!(shown, &[Suggestion::Buyer(buyer("Anabel"))]);
    }

    #[test]
    fn suggestions_belong_to_active_field() {
        let t0 = Instant::now();
        let mut s = SearchSession::new();

        s.input(SearchField::Email, "ana@", t0);
        let ticket = s.poll(t0 + DEBOUNCE).unwrap();
        s.complete(&ticket, vec![Suggestion::Buyer(buyer("Ana"))]);

        assert!(s.suggestions_for(SearchField::Name, t0 + DEBOUNCE).is_empty());

        s.focus(SearchField::Phone);
        assert!(s.suggestions_for(SearchField::Email, t0 + DEBOUNCE).is_empty());
    }

    #[test]
    fn blur_hides_after_grace() {
        let t0 = Instant::now();
        let mut s = SearchSession::new();

        s.input(SearchField::Name, "pedro", t0);
        let ticket = s.poll(t0 + DEBOUNCE).unwrap();
        s.complete(&ticket, vec![Suggestion::Buyer(buyer("Pedro"))]);

        s.blur(t0 + ms(600));
        assert_eq!(s.suggestions_for(SearchField::Name, t0 + ms(700)).len(), 1);

        // Клик в пределах паузы успевает сработать.
        let chosen = s.choose(SearchField::Name, 0, t0 + ms(750)).unwrap();
        assert_eq!(chosen.name(), "Pedro");
        assert_eq!(s.active(), None);
        assert!(s.suggestions_for(SearchField::Name, t0 + ms(750)).is_empty());
    }

    #[test]
    fn blur_grace_expires() {
        let t0 = Instant::now();
        let mut s = SearchSession::new();

        s.input(SearchField::Name, "pedro", t0);
        let ticket = s.poll(t0 + DEBOUNCE).unwrap();
        s.complete(&ticket, vec![Suggestion::Buyer(buyer("Pedro"))]);

        s.blur(t0 + ms(600));
        assert_eq!(s.next_due(), Some(t0 + ms(800)));
        assert_eq!(s.poll(t0 + ms(800)), None);

        assert_eq!(s.active(), None);
        assert_eq!(s.choose(SearchField::Name, 0, t0 + ms(900)), None);
    }

    #[test]
    fn search_people_queries_both_sources() {
        let mut server = Server::new();
        let employees = server
            .mock("GET", "/sales/employees/search")
            .match_query(Matcher::UrlEncoded("q".into(), "go".into()))
            .with_body(r#"[{"employee_id": 1, "full_name": "Lucía Gómez"}]"#)
            .create();
        let buyers = server
            .mock("GET", "/sales/buyers/search")
            .match_query(Matcher::UrlEncoded("q".into(), "go".into()))
            .with_body(r#"[{"buyer_name": "Hugo Godoy", "buyer_dni": "1"}]"#)
            .create();

        let api = ActaClient::new(&server.url(), Duration::from_secs(5), None).unwrap();
        let found = search_people(&api, "go").unwrap();

        employees.assert();
        buyers.assert();
        let names: Vec<_> = found.iter().map(Suggestion::name).collect();
        assert_eq!(names, vec!["Lucía Gómez", "Hugo Godoy"]);
    }

    #[test]
    fn search_fails_if_one_source_fails() {
        let mut server = Server::new();
        server
            .mock("GET", "/sales/employees/search")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create();
        server
            .mock("GET", "/sales/buyers/search")
            .match_query(Matcher::Any)
            .with_status(500)
            .create();

        let api = ActaClient::new(&server.url(), Duration::from_secs(5), None).unwrap();

        assert!(search_people(&api, "go").is_err());
    }
}
