//! The fixed set of identity-document fields and their normalization rules.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static RE_DNI_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{8}$").unwrap());
static RE_NUMBER_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-]+").unwrap());

/// Field name to value; `None` means the field was not found in the document.
pub type ExtractedData = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdField {
    ApellidoPaterno,
    ApellidoMaterno,
    Nombres,
    FechaEmision,
    FechaCaducidad,
    TipoDocumento,
    NumeroDocumento,
}

impl IdField {
    pub const ALL: [IdField; 7] = [
        IdField::ApellidoPaterno,
        IdField::ApellidoMaterno,
        IdField::Nombres,
        IdField::FechaEmision,
        IdField::FechaCaducidad,
        IdField::TipoDocumento,
        IdField::NumeroDocumento,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            IdField::ApellidoPaterno => "apellido_paterno",
            IdField::ApellidoMaterno => "apellido_materno",
            IdField::Nombres => "nombres",
            IdField::FechaEmision => "fecha_emision",
            IdField::FechaCaducidad => "fecha_caducidad",
            IdField::TipoDocumento => "tipo_documento",
            IdField::NumeroDocumento => "numero_documento",
        }
    }

    /// Resolves a response key, including the known misspelling `apellio_materno`.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        if key == "apellio_materno" {
            return Some(IdField::ApellidoMaterno);
        }
        IdField::ALL.into_iter().find(|f| f.key() == key)
    }

    fn is_name(&self) -> bool {
        matches!(
            self,
            IdField::ApellidoPaterno | IdField::ApellidoMaterno | IdField::Nombres
        )
    }

    fn normalize(&self, value: &str) -> String {
        match self {
            f if f.is_name() => value.to_uppercase(),
            IdField::TipoDocumento => value.to_uppercase(),
            IdField::NumeroDocumento => RE_NUMBER_SEPARATORS.replace_all(value, "").into_owned(),
            _ => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFields {
    /// Always holds exactly the seven recognized keys.
    pub data: ExtractedData,
    pub warnings: Vec<String>,
}

impl NormalizedFields {
    pub fn present_count(&self) -> usize {
        present_count(&self.data)
    }
}

/// Projects a parsed LLM object onto the recognized field set.
pub fn normalize_fields(raw: Map<String, Value>) -> NormalizedFields {
    let mut data: ExtractedData = IdField::ALL
        .iter()
        .map(|f| (f.key().to_string(), None))
        .collect();
    let mut warnings = Vec::new();

    for (key, value) in raw {
        let Some(field) = IdField::from_key(&key) else {
            warnings.push(format!("Ignoring unrecognized field '{}'", key));
            continue;
        };

        let text = match value {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                warnings.push(format!(
                    "Field '{}' has a non-scalar value and was discarded",
                    field.key()
                ));
                None
            }
        };

        let slot = data.entry(field.key().to_string()).or_insert(None);
        if slot.is_none() {
            *slot = text.map(|t| field.normalize(&t));
        }
    }

    if let Some(warning) = check_dni_number(&data) {
        warnings.push(warning);
    }

    NormalizedFields { data, warnings }
}

fn check_dni_number(data: &ExtractedData) -> Option<String> {
    let doc_type = data.get(IdField::TipoDocumento.key())?.as_deref()?;
    if doc_type != "DNI" {
        return None;
    }
    match data.get(IdField::NumeroDocumento.key()).and_then(|v| v.as_deref()) {
        Some(number) if RE_DNI_NUMBER.is_match(number) => None,
        Some(number) => Some(format!(
            "DNI number '{}' does not have the expected 8 digits",
            number
        )),
        None => None,
    }
}

pub fn present_count(data: &ExtractedData) -> usize {
    IdField::ALL
        .iter()
        .filter(|f| matches!(data.get(f.key()), Some(Some(_))))
        .count()
}

/// Share of recognized fields that were found, 0.0..=1.0.
pub fn completeness(data: &ExtractedData) -> f64 {
    present_count(data) as f64 / IdField::ALL.len() as f64
}
