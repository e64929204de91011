//! Domain models for the norma catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days after creation during which a norma counts as "new".
pub const NEW_BADGE_DAYS: i64 = 30;

/// A catalog record: one graphic identity guideline document.
///
/// `id` and `created_at` are assigned by the record store and never supplied
/// or mutated by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Norma {
    pub id: String,
    pub nome: String,
    pub pais: String,
    pub categoria: Option<String>,
    pub ano: Option<String>,
    pub imagem_url: String,
    pub pdf_url: String,
    pub autor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Norma {
    /// Whether the record is recent enough to carry the "Novo" badge.
    pub fn is_new(&self) -> bool {
        self.created_at >= Utc::now() - Duration::days(NEW_BADGE_DAYS)
    }
}

/// Client-supplied fields of a norma, used for create and update operations.
///
/// Optional fields serialize as `null` so an update can clear them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormaDraft {
    pub nome: String,
    pub pais: String,
    pub categoria: Option<String>,
    pub ano: Option<String>,
    pub imagem_url: String,
    pub pdf_url: String,
    pub autor: Option<String>,
}

/// A draft that failed validation and must not be written.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    MissingField(&'static str),
    #[error("field `{field}` is not a valid absolute URL")]
    InvalidUrl { field: &'static str },
}

impl NormaDraft {
    /// Trim every field and turn empty optional values into `None`.
    pub fn normalized(&self) -> Self {
        fn opt(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            nome: self.nome.trim().to_string(),
            pais: self.pais.trim().to_string(),
            categoria: opt(&self.categoria),
            ano: opt(&self.ano),
            imagem_url: self.imagem_url.trim().to_string(),
            pdf_url: self.pdf_url.trim().to_string(),
            autor: opt(&self.autor),
        }
    }

    /// Check the persistence invariant: `nome`, `pais`, `imagem_url` and
    /// `pdf_url` must be non-empty, and the two URLs must be absolute.
    pub fn validate(&self) -> Result<(), ValidationError> {
        fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
            Ok(())
        }

        fn absolute_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
            url::Url::parse(value).map_err(|_| ValidationError::InvalidUrl { field })?;
            Ok(())
        }

        required("nome", &self.nome)?;
        required("pais", &self.pais)?;
        required("imagem_url", &self.imagem_url)?;
        required("pdf_url", &self.pdf_url)?;
        absolute_url("imagem_url", &self.imagem_url)?;
        absolute_url("pdf_url", &self.pdf_url)?;
        Ok(())
    }
}

impl From<&Norma> for NormaDraft {
    fn from(norma: &Norma) -> Self {
        Self {
            nome: norma.nome.clone(),
            pais: norma.pais.clone(),
            categoria: norma.categoria.clone(),
            ano: norma.ano.clone(),
            imagem_url: norma.imagem_url.clone(),
            pdf_url: norma.pdf_url.clone(),
            autor: norma.autor.clone(),
        }
    }
}

/// A norma attribute the catalog can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Nome,
    Pais,
    Categoria,
    Ano,
    Autor,
    CreatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Nome => "nome",
            SortField::Pais => "pais",
            SortField::Categoria => "categoria",
            SortField::Ano => "ano",
            SortField::Autor => "autor",
            SortField::CreatedAt => "created_at",
        }
    }
}

impl FromStr for SortField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nome" => Ok(SortField::Nome),
            "pais" => Ok(SortField::Pais),
            "categoria" => Ok(SortField::Categoria),
            "ano" => Ok(SortField::Ano),
            "autor" => Ok(SortField::Autor),
            "created_at" => Ok(SortField::CreatedAt),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named field that is not a norma attribute.
#[derive(Debug, Error, PartialEq)]
#[error("unknown field `{0}`")]
pub struct UnknownField(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Transient sort selection: a norma attribute plus a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// "Ordem Alfabética" — the catalog default.
    pub fn alphabetical() -> Self {
        Self::new(SortField::Nome, SortDirection::Asc)
    }

    /// "Mais Recentes"
    pub fn newest() -> Self {
        Self::new(SortField::CreatedAt, SortDirection::Desc)
    }

    /// "Mais Antigos"
    pub fn oldest() -> Self {
        Self::new(SortField::CreatedAt, SortDirection::Asc)
    }

    /// "País (A-Z)"
    pub fn by_country() -> Self {
        Self::new(SortField::Pais, SortDirection::Asc)
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::alphabetical()
    }
}

/// A norma attribute the catalog can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    Pais,
    Categoria,
    Ano,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Pais => "pais",
            FilterField::Categoria => "categoria",
            FilterField::Ano => "ano",
        }
    }

    /// The attribute value for a record, with empty treated as absent.
    pub fn value_of<'a>(&self, norma: &'a Norma) -> Option<&'a str> {
        let value = match self {
            FilterField::Pais => Some(norma.pais.as_str()),
            FilterField::Categoria => norma.categoria.as_deref(),
            FilterField::Ano => norma.ano.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

impl FromStr for FilterField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pais" => Ok(FilterField::Pais),
            "categoria" => Ok(FilterField::Categoria),
            "ano" => Ok(FilterField::Ano),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// Transient selection of field-equality filters. An empty value means "no
/// constraint" and clears the entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    values: BTreeMap<FilterField, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear (empty value) the selection for a field.
    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Active constraints, in field order.
    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

/// Minimal projection of the authenticated administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Opaque credential bundle from the authentication provider. Cached in
/// durable storage across runs; the provider stays authoritative on validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}
