// src/catalog.rs
//! Каталожный движок: фильтрация и сортировка списка врачей.
//!
//! Чистая функция над снимком каталога — без I/O, без мутации входа.
//! Все фильтры конъюнктивны; сортировка стабильная, ровно один ключ.

use serde::{Deserialize, Serialize};

use crate::models::{Doctor, WorkplaceType};

// ==================== SELECTION ====================

/// Типизированная замена строкового сентинеля "all": либо фильтр выключен,
/// либо точное совпадение со значением.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    Any,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::Any
    }
}

impl<T: PartialEq> Selection<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Selection::Any => true,
            Selection::Only(wanted) => wanted == value,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Selection::Any)
    }
}

// ==================== SORT KEY ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Сравнение по нижнему регистру в порядке кодовых точек, без
    /// полноценной коллации: «ё» встаёт после «я».
    #[default]
    Alphabet,
    PriceAsc,
    PriceDesc,
    #[serde(rename = "experience")]
    ExperienceDesc,
}

impl SortKey {
    /// Неизвестный ключ — не ошибка: откат на сортировку по алфавиту.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "alphabet" => SortKey::Alphabet,
            "price-asc" => SortKey::PriceAsc,
            "price-desc" => SortKey::PriceDesc,
            "experience" => SortKey::ExperienceDesc,
            _ => SortKey::Alphabet,
        }
    }
}

// ==================== QUERY ====================

/// Состояние фильтров каталога. `Default` — это же и состояние сброса:
/// пустой поиск, оба фильтра выключены, сортировка по алфавиту.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    pub search: String,
    pub specialty: Selection<String>,
    pub workplace_type: Selection<WorkplaceType>,
    pub sort: SortKey,
}

/// Результат применения запроса: отфильтрованный упорядоченный список,
/// счётчик для UI и флаг «есть активные фильтры» (показывать ли сброс).
#[derive(Debug, Serialize)]
pub struct CatalogPage {
    pub doctors: Vec<Doctor>,
    pub total: usize,
    pub filters_active: bool,
}

impl CatalogQuery {
    /// Собирает запрос из сырых query-параметров. Пустые строки и "all"
    /// трактуются как отсутствие фильтра, мусорный sort — как дефолт.
    pub fn from_params(
        search: Option<&str>,
        specialty: Option<&str>,
        workplace_type: Option<&str>,
        sort: Option<&str>,
    ) -> Self {
        let specialty = match specialty.map(str::trim) {
            None | Some("") | Some("all") => Selection::Any,
            Some(s) => Selection::Only(s.to_string()),
        };
        let workplace_type = match workplace_type.map(str::trim) {
            Some("federal") => Selection::Only(WorkplaceType::Federal),
            Some("private") => Selection::Only(WorkplaceType::Private),
            _ => Selection::Any,
        };
        Self {
            search: search.unwrap_or_default().trim().to_string(),
            specialty,
            workplace_type,
            sort: sort.map(SortKey::parse).unwrap_or_default(),
        }
    }

    pub fn matches(&self, doctor: &Doctor) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            if !doctor.full_name.to_lowercase().contains(&needle) {
                return false;
            }
        }
        self.specialty.admits(&doctor.specialty)
            && self.workplace_type.admits(&doctor.workplace_type)
    }

    pub fn has_active_state(&self) -> bool {
        !self.search.is_empty()
            || !self.specialty.is_any()
            || !self.workplace_type.is_any()
            || self.sort != SortKey::Alphabet
    }

    /// Применяет фильтры и сортировку к снимку каталога.
    /// Вход не изменяется; `sort_by` у Vec стабильная.
    pub fn apply(&self, doctors: &[Doctor]) -> CatalogPage {
        let mut result: Vec<Doctor> = doctors.iter().filter(|d| self.matches(d)).cloned().collect();

        match self.sort {
            SortKey::Alphabet => {
                result.sort_by(|a, b| a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()))
            }
            SortKey::PriceAsc => result.sort_by(|a, b| a.prepayment.cmp(&b.prepayment)),
            SortKey::PriceDesc => result.sort_by(|a, b| b.prepayment.cmp(&a.prepayment)),
            SortKey::ExperienceDesc => {
                result.sort_by(|a, b| b.experience_years.cmp(&a.experience_years))
            }
        }

        CatalogPage {
            total: result.len(),
            filters_active: self.has_active_state(),
            doctors: result,
        }
    }

    pub fn reset(&mut self) {
        *self = CatalogQuery::default();
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DoctorStatus;
    use chrono::Utc;

    fn doctor(name: &str, specialty: &str, wt: WorkplaceType, exp: i64, price: i64) -> Doctor {
        Doctor {
            id: format!("id-{}", name),
            full_name: name.to_string(),
            specialty: specialty.to_string(),
            workplace: "НМИЦ".to_string(),
            workplace_type: wt,
            experience_years: exp,
            prepayment: price,
            photo_url: None,
            description: None,
            education: None,
            skills: None,
            achievements: None,
            services_provided: None,
            available_dates: None,
            status: DoctorStatus::Active,
            rating: None,
            successful_visits_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample() -> Vec<Doctor> {
        vec![
            doctor("Иванов Иван", "Кардиолог", WorkplaceType::Federal, 15, 49000),
            doctor("Петрова Анна", "Нейрохирург", WorkplaceType::Federal, 13, 45000),
            doctor("Морозов Алексей", "ЛОР", WorkplaceType::Private, 14, 38000),
            doctor("Волкова Ольга", "Кардиолог", WorkplaceType::Federal, 12, 45000),
        ]
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let page = CatalogQuery::default().apply(&[]);
        assert!(page.doctors.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.filters_active);
    }

    #[test]
    fn test_default_query_returns_all_sorted_alphabetically() {
        let page = CatalogQuery::default().apply(&sample());
        assert_eq!(page.total, 4);
        let names: Vec<&str> = page.doctors.iter().map(|d| d.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Волкова Ольга", "Иванов Иван", "Морозов Алексей", "Петрова Анна"]
        );
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let query = CatalogQuery::from_params(Some("иВаН"), None, None, None);
        let page = query.apply(&sample());
        assert_eq!(page.total, 1);
        assert_eq!(page.doctors[0].full_name, "Иванов Иван");
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let query = CatalogQuery::from_params(None, Some("Кардиолог"), Some("federal"), None);
        let page = query.apply(&sample());
        assert_eq!(page.total, 2);
        assert!(page
            .doctors
            .iter()
            .all(|d| d.specialty == "Кардиолог" && d.workplace_type == WorkplaceType::Federal));
    }

    #[test]
    fn test_result_is_subset_satisfying_predicates() {
        let input = sample();
        let query = CatalogQuery::from_params(Some("о"), None, Some("private"), Some("price-asc"));
        let page = query.apply(&input);
        for d in &page.doctors {
            assert!(input.iter().any(|orig| orig.id == d.id));
            assert!(query.matches(d));
        }
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let query = CatalogQuery::from_params(Some("о"), None, None, Some("experience"));
        let first = query.apply(&sample());
        let second = query.apply(&first.doctors);
        assert_eq!(first.total, second.total);
        let a: Vec<&str> = first.doctors.iter().map(|d| d.id.as_str()).collect();
        let b: Vec<&str> = second.doctors.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_price_sort_is_stable_on_ties() {
        // Петрова и Волкова стоят одинаково; исходный порядок сохраняется
        let query = CatalogQuery::from_params(None, None, None, Some("price-asc"));
        let page = query.apply(&sample());
        let names: Vec<&str> = page.doctors.iter().map(|d| d.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Морозов Алексей", "Петрова Анна", "Волкова Ольга", "Иванов Иван"]
        );
    }

    #[test]
    fn test_price_desc_and_experience_sorts() {
        let desc = CatalogQuery::from_params(None, None, None, Some("price-desc")).apply(&sample());
        assert_eq!(desc.doctors[0].prepayment, 49000);
        assert_eq!(desc.doctors[3].prepayment, 38000);

        let exp = CatalogQuery::from_params(None, None, None, Some("experience")).apply(&sample());
        let years: Vec<i64> = exp.doctors.iter().map(|d| d.experience_years).collect();
        assert_eq!(years, vec![15, 14, 13, 12]);
    }

    #[test]
    fn test_unknown_sort_key_falls_back_to_alphabet() {
        assert_eq!(SortKey::parse("by-rating"), SortKey::Alphabet);
        let query = CatalogQuery::from_params(None, None, None, Some("garbage"));
        assert_eq!(query.sort, SortKey::Alphabet);
        assert!(!query.has_active_state());
    }

    #[test]
    fn test_all_sentinel_and_blank_values_mean_no_filter() {
        let query = CatalogQuery::from_params(Some("  "), Some("all"), Some(""), None);
        assert_eq!(query, CatalogQuery::default());
        assert!(!query.has_active_state());
    }

    #[test]
    fn test_active_state_flag() {
        assert!(CatalogQuery::from_params(Some("x"), None, None, None).has_active_state());
        assert!(CatalogQuery::from_params(None, Some("ЛОР"), None, None).has_active_state());
        assert!(CatalogQuery::from_params(None, None, Some("federal"), None).has_active_state());
        assert!(CatalogQuery::from_params(None, None, None, Some("experience")).has_active_state());
    }

    #[test]
    fn test_reset_restores_defaults_exactly() {
        let mut query = CatalogQuery::from_params(
            Some("Иванов"),
            Some("Кардиолог"),
            Some("federal"),
            Some("price-desc"),
        );
        query.reset();
        assert_eq!(query, CatalogQuery::default());

        // после сброса — полный список по алфавиту
        let page = query.apply(&sample());
        assert_eq!(page.total, 4);
        assert_eq!(page.doctors[0].full_name, "Волкова Ольга");
        assert!(!page.filters_active);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = sample();
        let before: Vec<&str> = input.iter().map(|d| d.full_name.as_str()).collect();
        let _ = CatalogQuery::from_params(None, None, None, Some("price-desc")).apply(&input);
        let after: Vec<&str> = input.iter().map(|d| d.full_name.as_str()).collect();
        assert_eq!(before, after);
    }
}
