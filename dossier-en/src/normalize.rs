//! Record normalizer
//!
//! Maps each provider's raw record shape into the canonical entity-record
//! schema so downstream merge logic is provider-agnostic. Total and
//! side-effect-free: the same raw input always yields the same canonical
//! output, and normalizing already-canonical data is a no-op.
//!
//! Records lacking a minimum viable identity (name or identifier) are
//! discarded here and never reach the merger. Unknown raw fields are
//! preserved in raw_fields, never injected into canonical_fields.

use crate::types::{CanonicalFields, EntityKind, EntityStatus, RawRecord, Record, Source};
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Legal-form suffixes removed from names before matching
const LEGAL_SUFFIXES: &[&str] = &[
    "sa", "ltda", "ltd", "llc", "inc", "corp", "corporation", "company", "co", "plc", "gmbh",
    "eireli", "mei", "me", "epp", "srl", "bv", "ag", "oy", "ab",
];

/// Connective/stopword tokens removed from names before matching
const NAME_STOPWORDS: &[&str] = &[
    "the", "of", "and", "de", "da", "do", "dos", "das", "e", "group", "grupo", "holding",
    "participacoes",
];

/// Per-provider field mapping table: raw key names probed for each canonical
/// field, most provider-specific first. Every list ends with the canonical
/// key name itself, which is what makes normalization idempotent.
struct FieldMap {
    name: &'static [&'static str],
    legal_name: &'static [&'static str],
    identifier: &'static [&'static str],
    url: &'static [&'static str],
    description: &'static [&'static str],
    location: &'static [&'static str],
    status: &'static [&'static str],
    date: &'static [&'static str],
}

fn field_map(source: Source) -> FieldMap {
    match source {
        Source::CompanyRegistry => FieldMap {
            name: &["nome_fantasia", "name"],
            legal_name: &["razao_social", "legal_name"],
            identifier: &["cnpj", "identifier"],
            url: &["website", "url"],
            description: &["cnae_fiscal_descricao", "description"],
            location: &["municipio", "location"],
            status: &["descricao_situacao_cadastral", "situacao", "status"],
            date: &["data_inicio_atividade", "data_abertura", "date"],
        },
        Source::BusinessDirectory => FieldMap {
            name: &["name"],
            legal_name: &["registered_name", "legal_name"],
            identifier: &["tax_id", "identifier"],
            url: &["website", "url"],
            description: &["summary", "description"],
            location: &["headquarters", "location"],
            status: &["status"],
            date: &["founded", "date"],
        },
        Source::WebSearch => FieldMap {
            name: &["title", "name"],
            legal_name: &["legal_name"],
            identifier: &["identifier"],
            url: &["link", "url"],
            description: &["snippet", "description"],
            location: &["location"],
            status: &["status"],
            date: &["published_at", "date"],
        },
        Source::ProfessionalGraph => FieldMap {
            name: &["full_name", "name"],
            legal_name: &["legal_name"],
            identifier: &["identifier"],
            url: &["profile_url", "url"],
            description: &["headline", "description"],
            location: &["location"],
            status: &["status"],
            date: &["date"],
        },
        Source::AnalysisExtract => FieldMap {
            name: &["name"],
            legal_name: &["legal_name"],
            identifier: &["identifier"],
            url: &["url"],
            description: &["context", "description"],
            location: &["location"],
            status: &["status"],
            date: &["date"],
        },
    }
}

/// Record normalizer
///
/// Stateless; one instance serves all runs.
#[derive(Debug, Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one raw record, or discard it when no viable identity
    /// survives the mapping
    pub fn normalize(&self, raw: &RawRecord, fetched_at: DateTime<Utc>) -> Option<Record> {
        let map = field_map(raw.source);

        let canonical = CanonicalFields {
            name: probe_string(&raw.fields, map.name).map(|s| collapse_whitespace(&s)),
            legal_name: probe_string(&raw.fields, map.legal_name).map(|s| collapse_whitespace(&s)),
            identifier: probe_string(&raw.fields, map.identifier)
                .map(|s| canonical_identifier(&s)),
            url: probe_string(&raw.fields, map.url).map(|s| s.trim().to_string()),
            description: probe_string(&raw.fields, map.description)
                .map(|s| collapse_whitespace(&s)),
            location: probe_string(&raw.fields, map.location).map(|s| collapse_whitespace(&s)),
            status: probe_string(&raw.fields, map.status).and_then(|s| parse_status(&s)),
            date: probe_string(&raw.fields, map.date).and_then(|s| parse_date(&s)),
        };

        let canonical = synthesize_identity(canonical);

        if !canonical.has_identity() {
            tracing::debug!(
                source = raw.source.as_str(),
                kind = raw.entity_kind.as_str(),
                "Discarding record with no viable identity"
            );
            return None;
        }

        Some(Record {
            source: raw.source,
            entity_kind: raw.entity_kind,
            raw_fields: raw.fields.clone(),
            canonical,
            fetched_at,
            trust: raw.source.default_trust(raw.entity_kind),
        })
    }

    /// Normalize a batch, dropping discards
    pub fn normalize_all(&self, raws: &[RawRecord], fetched_at: DateTime<Utc>) -> Vec<Record> {
        raws.iter()
            .filter_map(|raw| self.normalize(raw, fetched_at))
            .collect()
    }
}

/// Fill in the identifier when the provider gave none: URL host first, then
/// a key synthesized from the matching-form of the name. The synthesized key
/// is a pure function of the name, so equal names collide on purpose.
fn synthesize_identity(mut canonical: CanonicalFields) -> CanonicalFields {
    if canonical.identifier.is_some() {
        return canonical;
    }

    if let Some(host) = canonical.url.as_deref().and_then(url_host) {
        canonical.identifier = Some(host);
        return canonical;
    }

    if let Some(name) = canonical.name.as_deref() {
        let tokens = matching_tokens(name);
        if !tokens.is_empty() {
            let joined = tokens.into_iter().collect::<Vec<_>>().join(" ");
            let digest = format!("{:x}", Sha256::digest(joined.as_bytes()));
            canonical.identifier = Some(format!("x{}", &digest[..16]));
        }
    }

    canonical
}

fn probe_string(
    fields: &serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Option<String> {
    for key in keys {
        match fields.get(*key) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.clone());
            }
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Canonical identifier form: tax ids reduce to their digits, URLs to their
/// host, everything else to trimmed lowercase. Idempotent by construction.
fn canonical_identifier(value: &str) -> String {
    let trimmed = value.trim();

    let separators_removed: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '.' | '/' | '-' | ' '))
        .collect();
    if !separators_removed.is_empty() && separators_removed.chars().all(|c| c.is_ascii_digit()) {
        return separators_removed;
    }

    if let Some(host) = url_host(trimmed) {
        return host;
    }

    trimmed.to_lowercase()
}

/// Host portion of a URL, lowercased, `www.` stripped
pub fn url_host(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.contains('.') && !host.contains(' ') {
        Some(host.to_lowercase())
    } else {
        None
    }
}

fn parse_status(value: &str) -> Option<EntityStatus> {
    let upper = value.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }

    const INACTIVE_MARKERS: &[&str] = &[
        "BAIXADA",
        "SUSPENSA",
        "INAPTA",
        "NULA",
        "INACTIVE",
        "DISSOLVED",
        "DEREGISTERED",
        "CLOSED",
    ];

    if INACTIVE_MARKERS.iter().any(|m| upper.contains(m)) {
        return Some(EntityStatus::Inactive);
    }
    if upper.contains("ATIVA") || upper.contains("ATIVO") || upper.contains("ACTIVE") {
        return Some(EntityStatus::Active);
    }
    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();

    for format in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // Timestamp forms: take the date prefix
    if trimmed.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&trimmed[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }

    // Bare year
    if let Ok(year) = trimmed.parse::<i32>() {
        if (1800..=2200).contains(&year) {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }

    None
}

/// Collapse runs of whitespace and trim
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Matching form of a name: lowercase, diacritics stripped, punctuation
/// removed, legal suffixes and stopwords dropped
pub fn matching_name(name: &str) -> String {
    matching_tokens(name).into_iter().collect::<Vec<_>>().join(" ")
}

/// Matching tokens of a name (sorted, deduplicated)
pub fn matching_tokens(name: &str) -> BTreeSet<String> {
    let lowered = strip_diacritics(&name.to_lowercase());

    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c == '.' || c == '\'' {
                // "s.a." collapses to "sa" so the suffix filter can see it
                '\0'
            } else {
                ' '
            }
        })
        .filter(|&c| c != '\0')
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| !LEGAL_SUFFIXES.contains(token) && !NAME_STOPWORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// Replace common Latin diacritics with their ASCII base letter
pub fn strip_diacritics(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ç' => 'C',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(source: Source, kind: EntityKind, pairs: &[(&str, &str)]) -> RawRecord {
        let mut fields = serde_json::Map::new();
        for (key, value) in pairs {
            fields.insert(
                key.to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
        RawRecord {
            source,
            entity_kind: kind,
            fields,
        }
    }

    /// Build a raw record whose fields already use canonical key names, for
    /// idempotence checks
    fn raw_from_canonical(canonical: &CanonicalFields, source: Source, kind: EntityKind) -> RawRecord {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(v) = &canonical.name {
            pairs.push(("name", v.clone()));
        }
        if let Some(v) = &canonical.legal_name {
            pairs.push(("legal_name", v.clone()));
        }
        if let Some(v) = &canonical.identifier {
            pairs.push(("identifier", v.clone()));
        }
        if let Some(v) = &canonical.url {
            pairs.push(("url", v.clone()));
        }
        if let Some(v) = &canonical.description {
            pairs.push(("description", v.clone()));
        }
        if let Some(v) = &canonical.location {
            pairs.push(("location", v.clone()));
        }
        if let Some(v) = &canonical.status {
            let s = match v {
                EntityStatus::Active => "active",
                EntityStatus::Inactive => "inactive",
            };
            pairs.push(("status", s.to_string()));
        }
        if let Some(v) = &canonical.date {
            pairs.push(("date", v.format("%Y-%m-%d").to_string()));
        }

        let mut fields = serde_json::Map::new();
        for (key, value) in pairs {
            fields.insert(key.to_string(), serde_json::Value::String(value));
        }
        RawRecord {
            source,
            entity_kind: kind,
            fields,
        }
    }

    #[test]
    fn test_registry_record_maps_to_canonical() {
        let normalizer = Normalizer::new();
        let raw = raw(
            Source::CompanyRegistry,
            EntityKind::Company,
            &[
                ("razao_social", "ACME COMERCIO LTDA"),
                ("nome_fantasia", "Acme"),
                ("cnpj", "12.345.678/0001-90"),
                ("descricao_situacao_cadastral", "ATIVA"),
                ("data_inicio_atividade", "2015-03-01"),
                ("municipio", "Sao Paulo"),
            ],
        );

        let record = normalizer.normalize(&raw, Utc::now()).unwrap();
        assert_eq!(record.canonical.name.as_deref(), Some("Acme"));
        assert_eq!(
            record.canonical.legal_name.as_deref(),
            Some("ACME COMERCIO LTDA")
        );
        // Tax id reduced to digits
        assert_eq!(
            record.canonical.identifier.as_deref(),
            Some("12345678000190")
        );
        assert_eq!(record.canonical.status, Some(EntityStatus::Active));
        assert_eq!(
            record.canonical.date,
            NaiveDate::from_ymd_opt(2015, 3, 1)
        );
        assert_eq!(record.trust, 4);
    }

    #[test]
    fn test_websearch_record_maps_to_canonical() {
        let normalizer = Normalizer::new();
        let raw = raw(
            Source::WebSearch,
            EntityKind::NewsItem,
            &[
                ("title", "Acme expands into new markets"),
                ("link", "https://www.example.com/news/acme-expands"),
                ("snippet", "Acme announced today..."),
                ("published_at", "2026-01-15T08:30:00Z"),
            ],
        );

        let record = normalizer.normalize(&raw, Utc::now()).unwrap();
        assert_eq!(
            record.canonical.name.as_deref(),
            Some("Acme expands into new markets")
        );
        // Identifier synthesized from the URL host
        assert_eq!(record.canonical.identifier.as_deref(), Some("example.com"));
        assert_eq!(
            record.canonical.date,
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
    }

    #[test]
    fn test_record_without_identity_is_discarded() {
        let normalizer = Normalizer::new();
        let raw = raw(
            Source::WebSearch,
            EntityKind::NewsItem,
            &[("snippet", "an orphaned snippet with no title")],
        );

        assert!(normalizer.normalize(&raw, Utc::now()).is_none());
    }

    #[test]
    fn test_unknown_fields_preserved_in_raw_not_canonical() {
        let normalizer = Normalizer::new();
        let raw = raw(
            Source::BusinessDirectory,
            EntityKind::Company,
            &[("name", "Acme"), ("employee_count_estimate", "250")],
        );

        let record = normalizer.normalize(&raw, Utc::now()).unwrap();
        assert!(record.raw_fields.contains_key("employee_count_estimate"));
        // Not injected anywhere into canonical fields
        assert!(record.canonical.description.is_none());
        assert!(record.canonical.location.is_none());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = Normalizer::new();
        let original = raw(
            Source::CompanyRegistry,
            EntityKind::Company,
            &[
                ("razao_social", "Indústria   Química Beta S.A."),
                ("cnpj", "98.765.432/0001-10"),
                ("descricao_situacao_cadastral", "BAIXADA"),
                ("data_inicio_atividade", "03/07/1998"),
            ],
        );

        let first = normalizer.normalize(&original, Utc::now()).unwrap();
        let again = raw_from_canonical(&first.canonical, first.source, first.entity_kind);
        let second = normalizer.normalize(&again, Utc::now()).unwrap();

        assert_eq!(first.canonical, second.canonical);
    }

    #[test]
    fn test_matching_tokens_strip_suffixes_and_diacritics() {
        let tokens = matching_tokens("Indústria Química Beta S.A.");
        assert!(tokens.contains("industria"));
        assert!(tokens.contains("quimica"));
        assert!(tokens.contains("beta"));
        assert!(!tokens.iter().any(|t| t == "sa" || t == "s" || t == "a"));

        let tokens = matching_tokens("Acme Holding Ltda");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("acme"));
    }

    #[test]
    fn test_matching_name_is_idempotent() {
        let once = matching_name("Companhia Énergetica do Norte S.A.");
        let twice = matching_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_url_host_extraction() {
        assert_eq!(
            url_host("https://www.acme.com.br/about?ref=1"),
            Some("acme.com.br".to_string())
        );
        assert_eq!(url_host("http://Example.COM/path"), Some("example.com".to_string()));
        assert_eq!(url_host("not a url"), None);
    }

    #[test]
    fn test_synthesized_key_is_deterministic() {
        let normalizer = Normalizer::new();
        let a = raw(
            Source::AnalysisExtract,
            EntityKind::Company,
            &[("name", "Gamma Logistics")],
        );
        let b = raw(
            Source::AnalysisExtract,
            EntityKind::Company,
            &[("name", "gamma logístics")],
        );

        let rec_a = normalizer.normalize(&a, Utc::now()).unwrap();
        let rec_b = normalizer.normalize(&b, Utc::now()).unwrap();

        // Same matching tokens yield the same synthesized key
        assert_eq!(rec_a.canonical.identifier, rec_b.canonical.identifier);
        assert!(rec_a
            .canonical
            .identifier
            .as_deref()
            .unwrap()
            .starts_with('x'));
    }

    #[test]
    fn test_parse_status_variants() {
        assert_eq!(parse_status("ATIVA"), Some(EntityStatus::Active));
        assert_eq!(parse_status("active"), Some(EntityStatus::Active));
        assert_eq!(parse_status("BAIXADA"), Some(EntityStatus::Inactive));
        assert_eq!(parse_status("Dissolved"), Some(EntityStatus::Inactive));
        assert_eq!(parse_status("pending review"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 3, 1);
        assert_eq!(parse_date("2015-03-01"), expected);
        assert_eq!(parse_date("01/03/2015"), expected);
        assert_eq!(parse_date("2015-03-01T12:00:00Z"), expected);
        assert_eq!(parse_date("2015"), NaiveDate::from_ymd_opt(2015, 1, 1));
        assert_eq!(parse_date("soon"), None);
    }
}
