//! Tests for the catalog store: load, derived snapshots, and the
//! last-input-wins guarantee on overlapping loads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use normadeck::backend::{BackendError, RecordStore};
use normadeck::catalog::CatalogStore;
use normadeck::models::{
    FilterField, Norma, NormaDraft, SortDirection, SortField, SortSpec,
};

/// Serves queued responses, each after its own delay.
struct QueuedStore {
    responses: Mutex<VecDeque<(Duration, Result<Vec<Norma>, BackendError>)>>,
}

impl QueuedStore {
    fn new(responses: Vec<(Duration, Result<Vec<Norma>, BackendError>)>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    fn immediate(normas: Vec<Norma>) -> Self {
        Self::new(vec![(Duration::ZERO, Ok(normas))])
    }
}

#[async_trait]
impl RecordStore for QueuedStore {
    async fn select(
        &self,
        _order: Option<(SortField, SortDirection)>,
        _limit: Option<u32>,
    ) -> Result<Vec<Norma>, BackendError> {
        let (delay, response) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no queued response left");
        tokio::time::sleep(delay).await;
        response
    }

    async fn get(&self, _id: &str) -> Result<Option<Norma>, BackendError> {
        unimplemented!("the catalog store only selects")
    }

    async fn insert(&self, _draft: &NormaDraft) -> Result<Norma, BackendError> {
        unimplemented!("the catalog store only selects")
    }

    async fn update(&self, _id: &str, _draft: &NormaDraft) -> Result<Norma, BackendError> {
        unimplemented!("the catalog store only selects")
    }

    async fn delete(&self, _id: &str) -> Result<(), BackendError> {
        unimplemented!("the catalog store only selects")
    }
}

fn norma(id: &str, nome: &str, pais: &str) -> Norma {
    Norma {
        id: id.to_string(),
        nome: nome.to_string(),
        pais: pais.to_string(),
        categoria: None,
        ano: None,
        imagem_url: format!("https://cdn.example.com/{id}.png"),
        pdf_url: format!("https://cdn.example.com/{id}.pdf"),
        autor: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn load_publishes_the_record_set_in_default_order() {
    let store = Arc::new(QueuedStore::immediate(vec![
        norma("1", "Petrobras", "Brasil"),
        norma("2", "Manual CTT", "Portugal"),
    ]));
    let catalog = CatalogStore::new(store);

    catalog.load().await;

    let view = catalog.current();
    assert!(!view.loading);
    assert_eq!(view.error, None);
    let nomes: Vec<&str> = view.normas.iter().map(|n| n.nome.as_str()).collect();
    assert_eq!(nomes, vec!["Manual CTT", "Petrobras"]);
}

#[tokio::test]
async fn load_failure_becomes_local_state() {
    let store = Arc::new(QueuedStore::new(vec![(
        Duration::ZERO,
        Err(BackendError::Malformed("boom".to_string())),
    )]));
    let catalog = CatalogStore::new(store);

    catalog.load().await;

    let view = catalog.current();
    assert!(!view.loading);
    assert!(view.normas.is_empty());
    assert_eq!(view.error.as_deref(), Some("Não foi possível carregar as normas"));
}

#[tokio::test]
async fn input_changes_re_derive_the_published_view() {
    let store = Arc::new(QueuedStore::immediate(vec![
        norma("1", "Manual CTT", "Portugal"),
        norma("2", "Petrobras", "Brasil"),
        norma("3", "Metro do Porto", "Portugal"),
    ]));
    let catalog = CatalogStore::new(store);
    catalog.load().await;

    catalog.set_filter(FilterField::Pais, "portugal").await;
    assert_eq!(catalog.current().normas.len(), 2);

    catalog.set_search("metro").await;
    let view = catalog.current();
    assert_eq!(view.normas.len(), 1);
    assert_eq!(view.normas[0].nome, "Metro do Porto");

    // Clearing the filter and search restores the full set.
    catalog.set_filter(FilterField::Pais, "").await;
    catalog.set_search("").await;
    assert_eq!(catalog.current().normas.len(), 3);

    catalog
        .set_sort(SortSpec::new(SortField::Nome, SortDirection::Desc))
        .await;
    assert_eq!(catalog.current().normas[0].nome, "Petrobras");
}

#[tokio::test]
async fn a_stale_slow_load_cannot_overwrite_a_newer_one() {
    let store = Arc::new(QueuedStore::new(vec![
        (
            Duration::from_millis(200),
            Ok(vec![norma("old", "Stale Result", "Portugal")]),
        ),
        (
            Duration::from_millis(10),
            Ok(vec![norma("new", "Fresh Result", "Portugal")]),
        ),
    ]));
    let catalog = Arc::new(CatalogStore::new(store));

    let slow = {
        let catalog = catalog.clone();
        tokio::spawn(async move { catalog.load().await })
    };
    // Let the slow load claim the first queued response.
    tokio::time::sleep(Duration::from_millis(50)).await;
    catalog.load().await;
    slow.await.unwrap();

    let view = catalog.current();
    assert_eq!(view.normas.len(), 1);
    assert_eq!(view.normas[0].nome, "Fresh Result");
}

#[tokio::test]
async fn subscribers_observe_re_derivations() {
    let store = Arc::new(QueuedStore::immediate(vec![norma(
        "1",
        "Manual CTT",
        "Portugal",
    )]));
    let catalog = CatalogStore::new(store);
    let mut rx = catalog.subscribe();

    catalog.load().await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().normas.len(), 1);

    catalog.set_search("no such norma").await;
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().normas.is_empty());
}
