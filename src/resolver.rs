//! Определение слотов актов по ссылке на запись бэкенда.
//!
//! Ссылка может прийти в разном виде: выдача со своим id или без него, только
//! id сотрудника, увольнение, продажа. Сначала ссылка приводится к одной
//! канонической записи, и вся дальнейшая логика работает только с ней.

use std::fmt::Display;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        models::{ActaInfo, TerminationRow},
        ActaClient,
    },
    error::{ResolutionError, Result},
    model::{Category, OwnerType},
    slot::{GeneratedActa, SlotId, SlotState},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRef {
    pub id: i64,

    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRef {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub assignment_id: Option<i64>,

    #[serde(default)]
    pub employee_id: Option<i64>,

    #[serde(default)]
    pub employee: Option<EmployeeRef>,
}

/// Ссылка на запись, которой принадлежат акты.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    Assignment(AssignmentRef),
    Employee(EmployeeRef),
    Termination {
        id: i64,
        #[serde(default)]
        employee_id: Option<i64>,
    },
    Sale {
        id: i64,
    },
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assignment(a) => match (a.id.or(a.assignment_id), &a.employee) {
                (Some(id), _) => write!(f, "assignment #{}", id),
                (None, Some(e)) => write!(f, "assignment of employee #{}", e.id),
                (None, None) => match a.employee_id {
                    Some(id) => write!(f, "assignment of employee #{}", id),
                    None => write!(f, "assignment"),
                },
            },
            Self::Employee(e) => match &e.full_name {
                Some(name) => write!(f, "employee #{} ({})", e.id, name),
                None => write!(f, "employee #{}", e.id),
            },
            Self::Termination { id, .. } => write!(f, "termination #{}", id),
            Self::Sale { id } => write!(f, "sale #{}", id),
        }
    }
}

/// Каноническая форма ссылки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonical {
    pub owner: OwnerType,

    /// Id самой записи, если ссылка его несёт.
    pub direct_id: Option<i64>,

    pub assignment_id: Option<i64>,

    pub employee_id: Option<i64>,
}

impl EntityRef {
    pub fn normalize(&self) -> Canonical {
        match self {
            Self::Assignment(a) => Canonical {
                owner: OwnerType::Assignment,
                direct_id: a.id,
                assignment_id: a.assignment_id,
                employee_id: a.employee.as_ref().map(|e| e.id).or(a.employee_id),
            },
            // Сотрудник не является владельцем слота, его id годится только
            // для запроса сводки по актам.
            Self::Employee(e) => Canonical {
                owner: OwnerType::Assignment,
                direct_id: None,
                assignment_id: None,
                employee_id: Some(e.id),
            },
            Self::Termination { id, employee_id } => Canonical {
                owner: OwnerType::Termination,
                direct_id: Some(*id),
                assignment_id: None,
                employee_id: *employee_id,
            },
            Self::Sale { id } => Canonical {
                owner: OwnerType::Sale,
                direct_id: Some(*id),
                assignment_id: None,
                employee_id: None,
            },
        }
    }
}

/// Результат разбора одной категории.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryResolution {
    /// Есть ли у записи оборудование этой категории.
    pub applicable: bool,

    /// Id записи, которой принадлежит слот.
    pub owner_id: Option<i64>,

    pub state: SlotState,
}

impl CategoryResolution {
    fn from_parts(applicable: bool, owner_id: Option<i64>, path: Option<String>) -> Self {
        Self {
            applicable,
            owner_id,
            state: SlotState::from_path(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    reference: String,
    canonical: Canonical,
    categories: Vec<(Category, CategoryResolution)>,
}

impl Resolution {
    fn new(reference: &EntityRef, categories: Vec<(Category, CategoryResolution)>) -> Self {
        Self {
            reference: reference.to_string(),
            canonical: reference.normalize(),
            categories,
        }
    }

    /// Разбор сводки по актам сотрудника.
    pub fn from_acta_info(reference: &EntityRef, info: ActaInfo) -> Self {
        Self::new(
            reference,
            vec![
                (
                    Category::Computer,
                    CategoryResolution::from_parts(
                        info.has_computer_devices,
                        info.computer_assignment_id,
                        info.computer_acta_path,
                    ),
                ),
                (
                    Category::Mobile,
                    CategoryResolution::from_parts(
                        info.has_mobile_devices,
                        info.mobile_assignment_id,
                        info.mobile_acta_path,
                    ),
                ),
            ],
        )
    }

    pub fn canonical(&self) -> &Canonical {
        &self.canonical
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn category(&self, category: Category) -> Option<&CategoryResolution> {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, r)| r)
    }

    pub fn has_computer_devices(&self) -> bool {
        self.category(Category::Computer)
            .is_some_and(|r| r.applicable)
    }

    pub fn has_mobile_devices(&self) -> bool {
        self.category(Category::Mobile).is_some_and(|r| r.applicable)
    }

    pub fn owner_id(&self, category: Category) -> Option<i64> {
        self.category(category).and_then(|r| r.owner_id)
    }

    /// Слоты, с которыми можно работать.
    /// Категория попадает сюда, только если оборудование есть и известен
    /// id владельца слота.
    pub fn offered_slots(&self) -> Vec<(SlotId, &SlotState)> {
        self.categories
            .iter()
            .filter(|(_, r)| r.applicable)
            .filter_map(|(c, r)| {
                let owner_id = r.owner_id?;
                let slot = SlotId::new(self.canonical.owner, owner_id, *c).ok()?;
                Some((slot, &r.state))
            })
            .collect()
    }

    /// Слот указанной категории, если он предлагается.
    pub fn offered_slot(
        &self,
        category: Category,
    ) -> std::result::Result<(SlotId, SlotState), ResolutionError> {
        self.offered_slots()
            .into_iter()
            .find(|(slot, _)| slot.category() == category)
            .map(|(slot, state)| (slot, state.clone()))
            .ok_or_else(|| ResolutionError::SlotNotOffered {
                reference: self.reference.clone(),
                category,
            })
    }

    pub fn slot_state(&self, slot: SlotId) -> Option<&SlotState> {
        self.offered_slots()
            .into_iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, state)| state)
    }

    /// Куда обращаться за сгенерированным актом.
    ///
    /// Id выбирается в порядке: id самой записи, `assignment_id`, владелец
    /// компьютерного слота, владелец мобильного слота.
    pub fn generic_target(&self) -> Result<GeneratedActa> {
        let c = &self.canonical;

        let id = c
            .direct_id
            .or(c.assignment_id)
            .or_else(|| self.owner_id(Category::Computer))
            .or_else(|| self.owner_id(Category::Mobile))
            .ok_or_else(|| ResolutionError::NoAddressableRecord(self.reference.clone()))?;

        let category = match c.owner {
            OwnerType::Assignment | OwnerType::Sale => Category::None,
            OwnerType::Termination => {
                if self.has_computer_devices() {
                    Category::Computer
                } else if self.has_mobile_devices() {
                    Category::Mobile
                } else {
                    let reference = self.reference.clone();
                    return Err(ResolutionError::NoApplicableCategory(reference).into());
                }
            }
        };

        Ok(GeneratedActa::new(c.owner, id, category)?)
    }
}

const TERMINATIONS_PAGE: u32 = 50;

/// Разрешает ссылки через бэкенд.
///
/// Сводку нужно запрашивать заново после каждой операции, которая могла
/// изменить состав оборудования или состояние слотов.
pub struct Resolver<'a> {
    api: &'a ActaClient,
}

impl<'a> Resolver<'a> {
    pub fn new(api: &'a ActaClient) -> Self {
        Self { api }
    }

    pub fn resolve(&self, reference: &EntityRef) -> Result<Resolution> {
        let canonical = reference.normalize();

        debug!("Разбираем {}: {:?}", reference, canonical);

        let resolution = match (canonical.owner, canonical.direct_id) {
            (OwnerType::Assignment, _) => match canonical.employee_id {
                Some(employee_id) => {
                    let info = self.api.employee_acta_info(employee_id)?;
                    Resolution::from_acta_info(reference, info)
                }
                None => {
                    warn!("У {} нет id сотрудника, слоты не предлагаются", reference);
                    Resolution::new(reference, Vec::new())
                }
            },
            (OwnerType::Termination, Some(id)) => {
                let row = self.termination_row(id)?;
                Resolution::new(
                    reference,
                    vec![
                        (
                            Category::Computer,
                            CategoryResolution::from_parts(
                                row.computer_acta_available,
                                Some(id),
                                row.computer_acta_path,
                            ),
                        ),
                        (
                            Category::Mobile,
                            CategoryResolution::from_parts(
                                row.mobile_acta_available,
                                Some(id),
                                row.mobile_acta_path,
                            ),
                        ),
                    ],
                )
            }
            (OwnerType::Sale, Some(id)) => {
                let info = self.api.sale(id)?;
                Resolution::new(
                    reference,
                    vec![(
                        Category::None,
                        CategoryResolution::from_parts(true, Some(id), info.acta_path),
                    )],
                )
            }
            (_, None) => {
                return Err(ResolutionError::NoAddressableRecord(reference.to_string()).into())
            }
        };

        debug!(
            "{}: компьютер {}, телефон {}",
            reference,
            resolution.has_computer_devices(),
            resolution.has_mobile_devices()
        );

        Ok(resolution)
    }

    /// Строка списка увольнений с флагами категорий.
    ///
    /// Карточка увольнения флагов не содержит, поэтому увольнение ищется в
    /// списке по DNI сотрудника (или по имени, если DNI нет).
    fn termination_row(&self, id: i64) -> Result<TerminationRow> {
        let detail = self.api.termination(id)?;

        if detail.equipment_returned_count == 0 {
            debug!("По увольнению #{} оборудование не возвращалось", id);
            return Ok(TerminationRow {
                id,
                employee_id: detail.employee_id,
                computer_acta_available: false,
                mobile_acta_available: false,
                computer_acta_path: detail.computer_acta_path,
                mobile_acta_path: detail.mobile_acta_path,
            });
        }

        let search = detail.search_key();
        let mut skip = 0;

        loop {
            let page = self.api.terminations(search, skip, TERMINATIONS_PAGE)?;

            if let Some(row) = page.items.into_iter().find(|r| r.id == id) {
                return Ok(row);
            }

            skip += TERMINATIONS_PAGE;
            if skip >= page.total {
                break;
            }
        }

        warn!("Увольнение #{} не нашлось в списке по {:?}", id, search);

        Err(ResolutionError::NotListed(format!("termination #{}", id)).into())
    }

    /// Актуальное состояние одного слота.
    /// Используется как обновление после загрузки или удаления.
    pub fn refresh_slot(&self, reference: &EntityRef, slot: SlotId) -> Result<SlotState> {
        let resolution = self.resolve(reference)?;

        Ok(resolution.slot_state(slot).cloned().unwrap_or_default())
    }
}
