//! The query pipeline: search, then filters, then sort, in that order.
//!
//! `derive` is pure. It never mutates the input set and always produces the
//! same ordered subset for the same inputs, so callers can re-run it on every
//! input change.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{FilterSet, Norma, SortDirection, SortField, SortSpec};

/// Derive the displayed subset of `records` for the given inputs.
pub fn derive(records: &[Norma], search: &str, filters: &FilterSet, sort: SortSpec) -> Vec<Norma> {
    let query = search.to_lowercase();
    let mut results: Vec<Norma> = records
        .iter()
        .filter(|norma| matches_search(norma, &query))
        .filter(|norma| matches_filters(norma, filters))
        .cloned()
        .collect();
    results.sort_by(|a, b| compare(a, b, sort));
    results
}

/// Substring match on `nome`, `pais` and (when present) `categoria`.
/// An empty query keeps everything.
fn matches_search(norma: &Norma, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    norma.nome.to_lowercase().contains(query)
        || norma.pais.to_lowercase().contains(query)
        || norma
            .categoria
            .as_deref()
            .is_some_and(|categoria| categoria.to_lowercase().contains(query))
}

/// Case-insensitive exact match on every active filter. A record missing the
/// attribute is dropped while that filter is active.
fn matches_filters(norma: &Norma, filters: &FilterSet) -> bool {
    filters.iter().all(|(field, selected)| {
        field
            .value_of(norma)
            .is_some_and(|value| value.to_lowercase() == selected.to_lowercase())
    })
}

/// The sortable value of a record, with empty strings treated as absent.
enum SortKey<'a> {
    Text(&'a str),
    Time(DateTime<Utc>),
}

fn sort_key(norma: &Norma, field: SortField) -> Option<SortKey<'_>> {
    let text = match field {
        SortField::Nome => Some(norma.nome.as_str()),
        SortField::Pais => Some(norma.pais.as_str()),
        SortField::Categoria => norma.categoria.as_deref(),
        SortField::Ano => norma.ano.as_deref(),
        SortField::Autor => norma.autor.as_deref(),
        SortField::CreatedAt => return Some(SortKey::Time(norma.created_at)),
    };
    text.filter(|value| !value.is_empty()).map(SortKey::Text)
}

/// Case-insensitive lexical comparison with the raw strings as tiebreak.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Records missing the sort field order last regardless of direction; the
/// direction flips only the comparison of two present values.
fn compare(a: &Norma, b: &Norma, sort: SortSpec) -> Ordering {
    let key_a = sort_key(a, sort.field);
    let key_b = sort_key(b, sort.field);
    match (key_a, key_b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = match (a, b) {
                (SortKey::Text(a), SortKey::Text(b)) => collate(a, b),
                (SortKey::Time(a), SortKey::Time(b)) => a.cmp(&b),
                // A field always yields the same key variant.
                (SortKey::Text(_), SortKey::Time(_)) | (SortKey::Time(_), SortKey::Text(_)) => {
                    Ordering::Equal
                }
            };
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterField;
    use chrono::Duration;

    fn norma(id: &str, nome: &str, pais: &str, categoria: Option<&str>, ano: Option<&str>) -> Norma {
        Norma {
            id: id.to_string(),
            nome: nome.to_string(),
            pais: pais.to_string(),
            categoria: categoria.map(str::to_string),
            ano: ano.map(str::to_string),
            imagem_url: format!("https://cdn.example.com/{id}.png"),
            pdf_url: format!("https://cdn.example.com/{id}.pdf"),
            autor: None,
            created_at: Utc::now() - Duration::days(id.len() as i64),
        }
    }

    fn sample() -> Vec<Norma> {
        vec![
            norma("a", "Manual CTT", "Portugal", Some("Empresa"), Some("1990")),
            norma("bb", "Petrobras", "Brasil", Some("Empresa"), Some("1972")),
            norma("ccc", "NASA Graphics Standards", "Estados Unidos", None, Some("1975")),
            norma("dddd", "Metro do Porto", "portugal", Some("Transporte"), None),
        ]
    }

    fn ids(normas: &[Norma]) -> Vec<&str> {
        normas.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn empty_inputs_keep_every_record() {
        let records = sample();
        let result = derive(&records, "", &FilterSet::new(), SortSpec::default());
        assert_eq!(result.len(), records.len());
        let mut sorted = ids(&result);
        sorted.sort();
        assert_eq!(sorted, vec!["a", "bb", "ccc", "dddd"]);
    }

    #[test]
    fn search_matches_nome_pais_and_categoria() {
        let records = sample();
        let by_nome = derive(&records, "ctt", &FilterSet::new(), SortSpec::default());
        assert_eq!(ids(&by_nome), vec!["a"]);

        let by_pais = derive(&records, "brasil", &FilterSet::new(), SortSpec::default());
        assert_eq!(ids(&by_pais), vec!["bb"]);

        let by_categoria = derive(&records, "transporte", &FilterSet::new(), SortSpec::default());
        assert_eq!(ids(&by_categoria), vec!["dddd"]);
    }

    #[test]
    fn search_only_narrows() {
        let records = sample();
        let everything = derive(&records, "", &FilterSet::new(), SortSpec::default());
        let narrowed = derive(&records, "port", &FilterSet::new(), SortSpec::default());
        assert!(narrowed.len() <= everything.len());
        for norma in &narrowed {
            assert!(everything.iter().any(|n| n.id == norma.id));
        }
    }

    #[test]
    fn filter_is_case_insensitive_exact_match() {
        let records = sample();
        let filters = FilterSet::new().with(FilterField::Pais, "Portugal");
        let result = derive(&records, "", &filters, SortSpec::default());
        // "Portugal" and "portugal" match, "Brasil" and "Estados Unidos" do not.
        let mut matched = ids(&result);
        matched.sort();
        assert_eq!(matched, vec!["a", "dddd"]);
    }

    #[test]
    fn filter_is_not_a_substring_match() {
        let records = sample();
        let filters = FilterSet::new().with(FilterField::Pais, "Port");
        let result = derive(&records, "", &filters, SortSpec::default());
        assert!(result.is_empty());
    }

    #[test]
    fn filter_drops_records_missing_the_attribute() {
        let records = sample();
        let filters = FilterSet::new().with(FilterField::Categoria, "Empresa");
        let result = derive(&records, "", &filters, SortSpec::default());
        let mut matched = ids(&result);
        matched.sort();
        // "ccc" has no categoria and is dropped while the filter is active.
        assert_eq!(matched, vec!["a", "bb"]);
    }

    #[test]
    fn missing_sort_values_order_last_regardless_of_direction() {
        let records = sample();
        let asc = derive(
            &records,
            "",
            &FilterSet::new(),
            SortSpec::new(SortField::Ano, SortDirection::Asc),
        );
        let anos: Vec<Option<&str>> = asc.iter().map(|n| n.ano.as_deref()).collect();
        assert_eq!(anos, vec![Some("1972"), Some("1975"), Some("1990"), None]);

        let desc = derive(
            &records,
            "",
            &FilterSet::new(),
            SortSpec::new(SortField::Ano, SortDirection::Desc),
        );
        let anos: Vec<Option<&str>> = desc.iter().map(|n| n.ano.as_deref()).collect();
        assert_eq!(anos, vec![Some("1990"), Some("1975"), Some("1972"), None]);
    }

    #[test]
    fn empty_string_counts_as_missing_for_sort() {
        let mut records = sample();
        records[1].ano = Some(String::new());
        let asc = derive(
            &records,
            "",
            &FilterSet::new(),
            SortSpec::new(SortField::Ano, SortDirection::Asc),
        );
        let last = asc.last().unwrap();
        assert!(last.ano.as_deref().unwrap_or("").is_empty());
    }

    #[test]
    fn newest_sort_orders_by_created_at_descending() {
        let records = sample();
        let result = derive(&records, "", &FilterSet::new(), SortSpec::newest());
        // created_at decreases with id length in the fixture.
        assert_eq!(ids(&result), vec!["a", "bb", "ccc", "dddd"]);
    }

    #[test]
    fn alphabetical_sort_ignores_case() {
        let records = vec![
            norma("1", "zebra", "Portugal", None, None),
            norma("2", "Abelha", "Portugal", None, None),
            norma("3", "mosca", "Portugal", None, None),
        ];
        let result = derive(&records, "", &FilterSet::new(), SortSpec::alphabetical());
        let nomes: Vec<&str> = result.iter().map(|n| n.nome.as_str()).collect();
        assert_eq!(nomes, vec!["Abelha", "mosca", "zebra"]);
    }

    #[test]
    fn derive_is_idempotent() {
        let records = sample();
        let filters = FilterSet::new().with(FilterField::Categoria, "empresa");
        let sort = SortSpec::new(SortField::Nome, SortDirection::Desc);
        let first = derive(&records, "a", &filters, sort);
        let second = derive(&records, "a", &filters, sort);
        assert_eq!(first, second);
    }

    #[test]
    fn derive_never_mutates_the_input() {
        let records = sample();
        let before = records.clone();
        let _ = derive(&records, "manual", &FilterSet::new(), SortSpec::newest());
        assert_eq!(records, before);
    }
}
