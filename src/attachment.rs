//! Управление одним слотом подписанного акта.
//!
//! Клиент проводит слот через его жизненный цикл: загрузка возможна только в
//! пустой слот, удаление только после явного подтверждения, скачивание
//! состояние не меняет. После каждой успешной мутации состояние берётся у
//! бэкенда, а не выводится из факта успеха.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    api::ActaClient,
    error::{Error, Result},
    slot::{GeneratedActa, PdfFile, SlotId, SlotState, Transition},
};

pub const DELETE_TITLE: &str = "Удалить подписанный акт?";
pub const DELETE_DETAILS: &str =
    "Действие необратимо: файл будет удалён с сервера без возможности восстановления.";

/// Шаг подтверждения перед удалением.
pub trait ConfirmationGate {
    /// Возвращает `true` только если пользователь явно согласился.
    fn confirm(&mut self, title: &str, details: &str) -> bool;
}

impl<F> ConfirmationGate for F
where
    F: FnMut(&str, &str) -> bool,
{
    fn confirm(&mut self, title: &str, details: &str) -> bool {
        self(title, details)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

type Refresh<'a> = Box<dyn FnMut() -> Result<SlotState> + 'a>;

pub struct AttachmentClient<'a> {
    api: &'a ActaClient,
    slot: SlotId,
    state: SlotState,
    refresh: Option<Refresh<'a>>,
}

impl<'a> AttachmentClient<'a> {
    pub fn new(api: &'a ActaClient, slot: SlotId, state: SlotState) -> Self {
        Self {
            api,
            slot,
            state,
            refresh: None,
        }
    }

    /// Функция, которая перечитывает состояние слота у бэкенда.
    /// Вызывается после каждой успешной загрузки или удаления.
    pub fn with_refresh(mut self, refresh: impl FnMut() -> Result<SlotState> + 'a) -> Self {
        self.refresh = Some(Box::new(refresh));
        self
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    /// Слот заблокирован для загрузки, пока в нём лежит акт.
    pub fn is_locked(&self) -> bool {
        self.state.is_present()
    }

    /// Проверяет файл без обращения к бэкенду.
    pub fn check_file(&self, path: &Path) -> Result<PdfFile> {
        self.state.check(self.slot, Transition::Upload)?;
        PdfFile::open(path)
    }

    pub fn upload(&mut self, path: &Path) -> Result<()> {
        let file = self.check_file(path)?;
        self.upload_file(file)
    }

    pub fn upload_file(&mut self, file: PdfFile) -> Result<()> {
        self.state.check(self.slot, Transition::Upload)?;

        debug!("Загружаем {} ({} байт) в {}", file.name(), file.len(), self.slot);
        let resp = self.api.upload_acta(&self.slot, file)?;

        info!("Акт загружен в {}", self.slot);

        let locator = resp
            .path
            .filter(|p| !p.trim().is_empty())
            .or(resp.filename);
        self.state = SlotState::from_path(locator);

        if !self.state.is_present() {
            debug!("Бэкенд не сообщил, где лежит акт {}", self.slot);
        }

        self.reconcile();

        Ok(())
    }

    /// Скачивает акт в указанную директорию и возвращает путь до файла.
    pub fn download(&self, dir: &Path) -> Result<PathBuf> {
        self.state.check(self.slot, Transition::Download)?;

        let bytes = self.api.download_acta(&self.slot)?;

        let path = dir.join(self.slot.file_name());
        save_pdf(&path, &bytes)?;

        info!("Акт из {} сохранён в {:?}", self.slot, path);

        Ok(path)
    }

    /// Удаляет акт после подтверждения.
    /// Без согласия пользователя запрос на удаление не отправляется.
    pub fn delete(&mut self, gate: &mut dyn ConfirmationGate) -> Result<DeleteOutcome> {
        self.state.check(self.slot, Transition::Delete)?;

        if !gate.confirm(DELETE_TITLE, DELETE_DETAILS) {
            info!("Удаление акта из {} отменено", self.slot);
            return Ok(DeleteOutcome::Declined);
        }

        self.api.delete_acta(&self.slot)?;

        info!("Акт удалён из {}", self.slot);

        self.state = SlotState::Absent;

        self.reconcile();

        Ok(DeleteOutcome::Deleted)
    }

    fn reconcile(&mut self) {
        let Some(refresh) = self.refresh.as_mut() else {
            return;
        };

        match refresh() {
            Ok(state) => {
                debug!("Актуальное состояние {}: {:?}", self.slot, state);
                self.state = state;
            }
            // Сама операция прошла, поэтому оставляем состояние из ответа бэкенда.
            Err(e) => warn!("Не удалось обновить состояние {}: {}", self.slot, e),
        }
    }
}

/// Скачивает сгенерированный системой акт для печати.
pub fn download_generated(
    api: &ActaClient,
    acta: &GeneratedActa,
    dir: &Path,
) -> Result<PathBuf> {
    let bytes = api.download_generated(acta)?;

    let path = dir.join(acta.file_name());
    save_pdf(&path, &bytes)?;

    info!("Сгенерированный акт сохранён в {:?}", path);

    Ok(path)
}

fn save_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_owned(),
            source,
        })?;
    }

    fs::write(path, bytes).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}
