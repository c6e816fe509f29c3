use std::{
    path::PathBuf,
    thread,
    time::Instant,
};

use actas::{
    api::{models::ActasStatus, ActaClient},
    attachment::{ConfirmationGate, DeleteOutcome},
    model::Price,
    resolver::Resolution,
    sale::{DefaultPrices, PaymentMethod, SaleComposer, SaleReceipt},
    search::{search_people, SearchField, SearchSession},
};
use enum_iterator::all;
use inquire::{validator::Validation, Confirm, CustomType, InquireError, Select, Text};
use log::{debug, warn};

/// Подтверждение удаления через интерактивный вопрос.
/// Если спросить не получилось, удаление считается отклонённым.
pub struct InquireGate;

impl ConfirmationGate for InquireGate {
    fn confirm(&mut self, title: &str, details: &str) -> bool {
        match Confirm::new(title)
            .with_help_message(details)
            .with_default(false)
            .prompt()
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Не удалось получить подтверждение: {}", e);
                false
            }
        }
    }
}

/// Запрашивает логин и пароль.
/// Имя из прошлой сессии подставляется как начальное значение.
pub fn ask_credentials(last_username: Option<&str>) -> anyhow::Result<(String, String)> {
    let username = Text::new("Имя пользователя")
        .with_initial_value(last_username.unwrap_or_default())
        .with_validator(required)
        .prompt()?;

    let password = inquire::Password::new("Пароль")
        .without_confirmation()
        .prompt()?;

    Ok((username, password))
}

fn required(s: &str) -> Result<Validation, inquire::CustomUserError> {
    if s.trim().is_empty() {
        return Ok(Validation::Invalid("required".into()));
    }
    Ok(Validation::Valid)
}

pub fn print_resolution(resolution: &Resolution) {
    println!("{}", resolution.reference());
    println!(
        "  компьютерное оборудование: {}",
        yes_no(resolution.has_computer_devices())
    );
    println!(
        "  мобильное оборудование: {}",
        yes_no(resolution.has_mobile_devices())
    );

    let slots = resolution.offered_slots();
    if slots.is_empty() {
        println!("  слотов для подписанных актов нет");
    }

    for (slot, state) in slots {
        match state.storage_path() {
            Some(path) => println!("  {}: подписан ({})", slot, path),
            None => println!("  {}: не загружен", slot),
        }
    }

    match resolution.generic_target() {
        Ok(target) => println!("  сгенерированный акт: {}", target.file_name()),
        Err(e) => println!("  сгенерированный акт недоступен: {}", e),
    }
}

pub fn print_status(status: &ActasStatus) {
    for entry in status.entries() {
        let slot = entry
            .slot()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_owned());
        let date = entry
            .date()
            .map(|d| d.to_string())
            .unwrap_or_default();

        let state = match (entry.state().storage_path(), entry.days_pending) {
            (Some(_), _) => "подписан".to_owned(),
            (None, Some(days)) => format!("ждёт подписи {} дн.", days),
            (None, None) => "не подписан".to_owned(),
        };

        println!(
            "{:<22} {:<30} {:<28} {:<10} {}",
            entry.kind.to_string(),
            entry.employee_name,
            slot,
            date,
            state
        );
    }

    let s = &status.summary;
    println!();
    println!(
        "Подписано {} из {}, ожидают подписи {}",
        s.total_signed, s.total, s.total_pending
    );
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "да"
    } else {
        "нет"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, enum_iterator::Sequence)]
enum SaleAction {
    #[display(fmt = "Найти покупателя")]
    Search,

    #[display(fmt = "Изменить данные покупателя")]
    EditBuyer,

    #[display(fmt = "Добавить устройство")]
    AddDevice,

    #[display(fmt = "Убрать устройство")]
    RemoveDevice,

    #[display(fmt = "Изменить цену")]
    EditPrice,

    #[display(fmt = "Способ оплаты")]
    Payment,

    #[display(fmt = "Примечание")]
    Notes,

    #[display(fmt = "Зарегистрировать продажу")]
    Submit,

    #[display(fmt = "Отмена")]
    Cancel,
}

/// Интерактивно составляет и регистрирует продажу.
/// Возвращает `None`, если оператор передумал.
pub fn compose_sale(
    api: &ActaClient,
    prices: DefaultPrices,
) -> anyhow::Result<Option<(SaleComposer, SaleReceipt)>> {
    let mut composer = SaleComposer::open(api, prices)
        .map_err(|e| anyhow::anyhow!(e.user_message("failed to load devices")))?;

    loop {
        print_draft(&composer);

        let action = Select::new("Что делаем?", all::<SaleAction>().collect()).prompt()?;

        let res = match action {
            SaleAction::Search => search_buyer(api, &mut composer),
            SaleAction::EditBuyer => edit_buyer(&mut composer),
            SaleAction::AddDevice => add_device(&mut composer),
            SaleAction::RemoveDevice => remove_device(&mut composer),
            SaleAction::EditPrice => edit_price(&mut composer),
            SaleAction::Payment => {
                let method =
                    Select::new("Способ оплаты", all::<PaymentMethod>().collect()).prompt()?;
                composer.set_payment_method(method).map_err(Into::into)
            }
            SaleAction::Notes => {
                let notes = Text::new("Примечание")
                    .with_initial_value(composer.notes())
                    .prompt()?;
                composer.set_notes(&notes).map_err(Into::into)
            }
            SaleAction::Submit => match composer.submit(api) {
                Ok(receipt) => return Ok(Some((composer, receipt))),
                Err(e) => Err(anyhow::anyhow!(e.user_message("failed to register sale"))),
            },
            SaleAction::Cancel => return Ok(None),
        };

        if let Err(e) = res {
            eprintln!("Ошибка: {}", e);
        }
    }
}

fn print_draft(composer: &SaleComposer) {
    let buyer = composer.buyer();

    println!();
    println!("Покупатель: {} (DNI {})", buyer.name, buyer.dni);
    if !buyer.email.is_empty() || !buyer.phone.is_empty() {
        println!("Контакты: {} {}", buyer.email, buyer.phone);
    }
    println!("Оплата: {}", composer.payment_method());

    for s in composer.devices() {
        println!("  {}: {}", s.device.label(), s.price);
    }
    match composer.total_price() {
        Ok(total) => println!("Итого: {}", total),
        Err(e) => println!("Итого: {}", e),
    }
    println!();
}

/// Поиск покупателя по любому из четырёх полей.
fn search_buyer(api: &ActaClient, composer: &mut SaleComposer) -> anyhow::Result<()> {
    let field = Select::new("Искать по", all::<SearchField>().collect()).prompt()?;
    let text = Text::new("Запрос").prompt()?;

    let mut session = SearchSession::new();
    session.input(field, &text, Instant::now());

    let Some(due) = session.next_due() else {
        println!("Нужно хотя бы 2 символа");
        return Ok(());
    };

    thread::sleep(due.saturating_duration_since(Instant::now()));

    let Some(ticket) = session.poll(Instant::now()) else {
        return Ok(());
    };

    debug!("Ищем {:?} по полю {}", ticket.query(), ticket.field());

    let found = search_people(api, ticket.query())
        .map_err(|e| anyhow::anyhow!(e.user_message("search failed")))?;
    session.complete(&ticket, found);

    let now = Instant::now();
    let suggestions = session.suggestions_for(field, now);
    if suggestions.is_empty() {
        println!("Ничего не найдено");
        return composer
            .set_buyer_field(field, &text)
            .map_err(Into::into);
    }

    let labels: Vec<String> = suggestions.iter().map(ToString::to_string).collect();
    let index = match Select::new("Подсказки", labels).raw_prompt() {
        Ok(chosen) => chosen.index,
        Err(InquireError::OperationCanceled) => {
            return composer
                .set_buyer_field(field, &text)
                .map_err(Into::into);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(suggestion) = session.choose(field, index, Instant::now()) {
        composer.apply_suggestion(&suggestion)?;
    }

    Ok(())
}

fn edit_buyer(composer: &mut SaleComposer) -> anyhow::Result<()> {
    for field in all::<SearchField>() {
        let current = composer.buyer().get(field).to_owned();
        let value = Text::new(&field.to_string())
            .with_initial_value(&current)
            .prompt()?;
        composer.set_buyer_field(field, &value)?;
    }

    Ok(())
}

fn add_device(composer: &mut SaleComposer) -> anyhow::Result<()> {
    let filter = Text::new("Фильтр (марка, модель, серийный номер)").prompt()?;

    let options: Vec<(i64, String)> = composer
        .filter_available(&filter)
        .into_iter()
        .map(|d| (d.id, d.label()))
        .collect();

    if options.is_empty() {
        println!("Подходящих свободных устройств нет");
        return Ok(());
    }

    let labels = options.iter().map(|(_, l)| l.clone()).collect();
    let chosen = Select::new("Устройство", labels).raw_prompt()?;

    composer.add_device(options[chosen.index].0)?;

    Ok(())
}

fn pick_selected(composer: &SaleComposer, title: &str) -> anyhow::Result<Option<i64>> {
    let options: Vec<(i64, String)> = composer
        .devices()
        .iter()
        .map(|s| (s.device.id, format!("{}: {}", s.device.label(), s.price)))
        .collect();

    if options.is_empty() {
        println!("Устройства не выбраны");
        return Ok(None);
    }

    let labels = options.iter().map(|(_, l)| l.clone()).collect();
    let chosen = Select::new(title, labels).raw_prompt()?;

    Ok(Some(options[chosen.index].0))
}

fn remove_device(composer: &mut SaleComposer) -> anyhow::Result<()> {
    if let Some(id) = pick_selected(composer, "Какое устройство убрать")? {
        composer.remove_device(id)?;
    }
    Ok(())
}

fn edit_price(composer: &mut SaleComposer) -> anyhow::Result<()> {
    let Some(id) = pick_selected(composer, "Цену какого устройства изменить")? else {
        return Ok(());
    };

    let price = CustomType::<u32>::new("Цена")
        .with_error_message("нужно целое неотрицательное число")
        .prompt()?;

    composer.set_price(id, Price::new(price))?;

    Ok(())
}

/// Предлагает сразу загрузить подписанный акт продажи.
pub fn offer_sale_acta(api: &ActaClient, composer: &SaleComposer) -> anyhow::Result<()> {
    let Some(mut attachment) = composer.attachment(api) else {
        return Ok(());
    };

    let upload = Confirm::new("Загрузить подписанный акт продажи сейчас?")
        .with_default(false)
        .prompt()?;
    if !upload {
        return Ok(());
    }

    let path: PathBuf = Text::new("Путь до PDF").with_validator(required).prompt()?.into();

    match attachment.upload(&path) {
        Ok(()) => println!("Акт загружен в {}", attachment.slot()),
        Err(e) => eprintln!("Ошибка: {}", e.user_message("failed to upload acta")),
    }

    Ok(())
}

pub fn print_delete_outcome(outcome: DeleteOutcome) {
    match outcome {
        DeleteOutcome::Deleted => println!("Акт удалён"),
        DeleteOutcome::Declined => println!("Удаление отменено"),
    }
}
