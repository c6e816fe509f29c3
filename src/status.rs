use log::debug;

use crate::{
    api::{
        models::{ActasStatus, EntryKind, StatusEntry},
        ActaClient,
    },
    error::Result,
    model::Category,
    slot::{SlotId, SlotState},
};

/// Какие акты показывать.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, derive_more::Display, clap::ValueEnum,
)]
pub enum StatusFilter {
    #[default]
    #[display(fmt = "all")]
    All,

    #[display(fmt = "signed")]
    Signed,

    #[display(fmt = "pending")]
    Pending,
}

/// Загружает сводку по подписанным и ожидающим подписи актам.
pub fn fetch(api: &ActaClient, filter: StatusFilter, search: Option<&str>) -> Result<ActasStatus> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());

    let status = api.actas_status(&filter.to_string(), search)?;

    debug!(
        "Сводка по актам: подписано {} из {}",
        status.summary.total_signed, status.summary.total
    );

    Ok(status)
}

impl ActasStatus {
    /// Все записи подряд: выдачи, продажи, увольнения.
    pub fn entries(&self) -> impl Iterator<Item = &StatusEntry> {
        self.assignment_computer
            .iter()
            .chain(&self.assignment_mobile)
            .chain(&self.sales)
            .chain(&self.terminations)
    }
}

impl StatusEntry {
    /// Слот, к которому относится запись.
    pub fn slot(&self) -> Option<SlotId> {
        match self.kind {
            EntryKind::AssignmentComputer => self
                .assignment_id
                .map(|id| SlotId::assignment(id, Category::Computer)),
            EntryKind::AssignmentMobile => self
                .assignment_id
                .map(|id| SlotId::assignment(id, Category::Mobile)),
            EntryKind::Sale => self.sale_id.map(SlotId::sale),
            EntryKind::TerminationComputer => self.termination_id.and_then(|id| {
                SlotId::new(crate::model::OwnerType::Termination, id, Category::Computer).ok()
            }),
            EntryKind::TerminationMobile => self.termination_id.and_then(|id| {
                SlotId::new(crate::model::OwnerType::Termination, id, Category::Mobile).ok()
            }),
        }
    }

    pub fn state(&self) -> SlotState {
        if !self.has_acta {
            return SlotState::Absent;
        }

        SlotState::from_path(self.acta_path.clone())
    }
}
