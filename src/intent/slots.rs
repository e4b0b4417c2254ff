//! Pattern-based slot extraction.
//!
//! Pulls typed parameter values out of free recognized text: employee
//! names after prepositions, currency amounts with Brazilian formatting,
//! record numbers, temporal filters and record status. This is not NLP —
//! each field has a short ordered list of patterns, more specific first,
//! and the first match per field wins.

use crate::error::{EngineError, Result};
use chrono::{Duration, Local, NaiveDate};
use regex::Regex;

/// Relative reporting period named in an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Week,
    Month,
}

impl Period {
    /// Wire name used by the report collaborator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

/// Record status filter named in an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Approved,
    Paid,
}

impl RecordStatus {
    /// Wire name used in action payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Paid => "paid",
        }
    }
}

/// Report category inferred from an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Sales,
    Inventory,
    Financial,
    Employees,
}

impl ReportType {
    /// Wire name used by the report collaborator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Inventory => "inventory",
            Self::Financial => "financial",
            Self::Employees => "employees",
        }
    }
}

/// Slot values extracted from one utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotValues {
    /// Employee / person name.
    pub employee: Option<String>,
    /// Monetary amount in reais.
    pub amount: Option<f64>,
    /// Explicit record number ("vale número 12").
    pub record_number: Option<u32>,
    /// Concrete date filter ("hoje", "ontem").
    pub date: Option<NaiveDate>,
    /// Relative period filter ("semana", "mês").
    pub period: Option<Period>,
    /// Record status filter.
    pub status: Option<RecordStatus>,
    /// Advance reason inferred from context words.
    pub reason: Option<String>,
    /// Free-text search term (e.g. a client name).
    pub query: Option<String>,
    /// Report category.
    pub report_type: Option<ReportType>,
}

/// Compiled patterns shared by the interpreter rules.
#[derive(Debug)]
pub struct SlotExtractor {
    /// Name-introducing prepositions, most specific first.
    name_patterns: Vec<Regex>,
    amount: Regex,
    record_number: Regex,
    client_query: Regex,
}

impl SlotExtractor {
    /// Compile the slot patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn new() -> Result<Self> {
        let name_patterns = [
            r"(?i)do funcionário\s+([\p{L}][\p{L}\-']*)",
            r"(?i)da funcionária\s+([\p{L}][\p{L}\-']*)",
            r"(?i)\bpara\s+([\p{L}][\p{L}\-']*)",
            r"(?i)\bde\s+([\p{L}][\p{L}\-']*)",
        ]
        .into_iter()
        .map(compile)
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name_patterns,
            // Accepts "200", "R$ 45,50", "10.5" — decimal comma or dot,
            // at most two decimal places.
            amount: compile(r"(?i)(?:r\$\s*)?(\d+(?:[.,]\d{1,2})?)")?,
            record_number: compile(r"(?i)(?:número|numero|nº|n°)\s*(\d+)")?,
            client_query: compile(r"(?i)cliente\s+([\p{L}][\p{L}\-']*)")?,
        })
    }

    /// Extract an employee name following a prepositional marker.
    ///
    /// "criar vale para Josemir" → `Some("Josemir")`. Numeric captures and
    /// filter words are rejected, so "vale de 200 reais para Josemir"
    /// resolves to the name and "vales de hoje" yields no name at all.
    #[must_use]
    pub fn employee_name(&self, text: &str) -> Option<String> {
        for pattern in &self.name_patterns {
            for caps in pattern.captures_iter(text) {
                let candidate = caps.get(1).map(|m| m.as_str().trim())?;
                if !candidate.is_empty() && !is_name_candidate_excluded(candidate) {
                    return Some(candidate.to_owned());
                }
            }
        }
        None
    }

    /// Extract a monetary amount.
    ///
    /// Accepts an optional `R$` prefix and decimal comma or dot:
    /// "200 reais" → 200.0, "R$ 45,50" → 45.5, "valor de 10" → 10.0.
    #[must_use]
    pub fn amount(&self, text: &str) -> Option<f64> {
        let caps = self.amount.captures(text)?;
        let raw = caps.get(1)?.as_str().replace(',', ".");
        raw.parse::<f64>().ok()
    }

    /// Extract an explicit record number ("vale número 12" → 12).
    #[must_use]
    pub fn record_number(&self, text: &str) -> Option<u32> {
        let caps = self.record_number.captures(text)?;
        caps.get(1)?.as_str().parse::<u32>().ok()
    }

    /// Extract a client search term ("buscar cliente Maria" → "Maria").
    #[must_use]
    pub fn client_query(&self, text: &str) -> Option<String> {
        let caps = self.client_query.captures(text)?;
        Some(caps.get(1)?.as_str().to_owned())
    }

    /// Extract a concrete date filter from "hoje" / "ontem".
    #[must_use]
    pub fn date_filter(&self, lower: &str) -> Option<NaiveDate> {
        let today = Local::now().date_naive();
        if lower.contains("hoje") {
            Some(today)
        } else if lower.contains("ontem") {
            Some(today - Duration::days(1))
        } else {
            None
        }
    }

    /// Extract a relative period filter. "hoje"/"ontem" are handled by
    /// [`Self::date_filter`] and take precedence.
    #[must_use]
    pub fn period_filter(&self, lower: &str) -> Option<Period> {
        if lower.contains("semana") {
            Some(Period::Week)
        } else if lower.contains("mês") || lower.contains("mes ") || lower.ends_with("mes") {
            Some(Period::Month)
        } else {
            None
        }
    }

    /// Extract a record status filter.
    #[must_use]
    pub fn status_filter(&self, lower: &str) -> Option<RecordStatus> {
        if lower.contains("pendente") {
            Some(RecordStatus::Pending)
        } else if lower.contains("aprovado") {
            Some(RecordStatus::Approved)
        } else if lower.contains("pago") {
            Some(RecordStatus::Paid)
        } else {
            None
        }
    }

    /// Infer an advance reason from context words in the utterance.
    #[must_use]
    pub fn advance_reason(&self, lower: &str) -> Option<String> {
        if lower.contains("almoço") || lower.contains("almoco") {
            Some("Vale almoço".to_owned())
        } else if lower.contains("transporte") {
            Some("Vale transporte".to_owned())
        } else if lower.contains("emergência") || lower.contains("emergencia") {
            Some("Vale emergencial".to_owned())
        } else {
            None
        }
    }

    /// Infer a report category.
    #[must_use]
    pub fn report_type(&self, lower: &str) -> Option<ReportType> {
        if lower.contains("venda") {
            Some(ReportType::Sales)
        } else if lower.contains("estoque") {
            Some(ReportType::Inventory)
        } else if lower.contains("financeiro") {
            Some(ReportType::Financial)
        } else if lower.contains("funcionário") || lower.contains("funcionario") {
            Some(ReportType::Employees)
        } else {
            None
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| EngineError::Classification(format!("bad slot pattern: {e}")))
}

/// Words a prepositional capture can pick up that are never person names:
/// digits, temporal filters and status filters.
fn is_name_candidate_excluded(candidate: &str) -> bool {
    if candidate.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    matches!(
        candidate.to_lowercase().as_str(),
        "hoje"
            | "ontem"
            | "semana"
            | "mês"
            | "mes"
            | "pendente"
            | "pendentes"
            | "aprovado"
            | "aprovados"
            | "pago"
            | "pagos"
            | "todos"
            | "todas"
            | "valor"
            | "reais"
            | "almoço"
            | "almoco"
            | "transporte"
            | "emergência"
            | "emergencia"
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn extractor() -> SlotExtractor {
        SlotExtractor::new().unwrap()
    }

    #[test]
    fn amount_plain_integer() {
        assert_eq!(extractor().amount("200 reais"), Some(200.0));
    }

    #[test]
    fn amount_currency_prefix_decimal_comma() {
        assert_eq!(extractor().amount("R$ 45,50"), Some(45.5));
    }

    #[test]
    fn amount_after_valor_de() {
        assert_eq!(extractor().amount("valor de 10"), Some(10.0));
    }

    #[test]
    fn amount_decimal_dot() {
        assert_eq!(extractor().amount("12.75 para o almoço"), Some(12.75));
    }

    #[test]
    fn amount_absent() {
        assert_eq!(extractor().amount("criar vale para Josemir"), None);
    }

    #[test]
    fn employee_after_para() {
        assert_eq!(
            extractor().employee_name("criar vale para Josemir"),
            Some("Josemir".to_owned())
        );
    }

    #[test]
    fn employee_skips_numeric_de_capture() {
        // "de 200" must not shadow the actual name.
        assert_eq!(
            extractor().employee_name("criar vale de 200 reais para Josemir"),
            Some("Josemir".to_owned())
        );
    }

    #[test]
    fn employee_rejects_filter_words() {
        assert_eq!(extractor().employee_name("mostrar vales de hoje"), None);
        assert_eq!(extractor().employee_name("vales pendentes de ontem"), None);
    }

    #[test]
    fn employee_after_funcionario_marker() {
        assert_eq!(
            extractor().employee_name("vales do funcionário Carlos"),
            Some("Carlos".to_owned())
        );
    }

    #[test]
    fn record_number_markers() {
        let ex = extractor();
        assert_eq!(ex.record_number("editar vale número 12"), Some(12));
        assert_eq!(ex.record_number("excluir vale nº 7"), Some(7));
        assert_eq!(ex.record_number("editar vale"), None);
    }

    #[test]
    fn date_filters() {
        let ex = extractor();
        let today = Local::now().date_naive();
        assert_eq!(ex.date_filter("vales de hoje"), Some(today));
        assert_eq!(
            ex.date_filter("vales de ontem"),
            Some(today - Duration::days(1))
        );
        assert_eq!(ex.date_filter("vales da semana"), None);
    }

    #[test]
    fn period_filters() {
        let ex = extractor();
        assert_eq!(ex.period_filter("vales da semana"), Some(Period::Week));
        assert_eq!(ex.period_filter("relatório do mês"), Some(Period::Month));
        assert_eq!(ex.period_filter("vales de hoje"), None);
    }

    #[test]
    fn status_filters() {
        let ex = extractor();
        assert_eq!(ex.status_filter("vales pendentes"), Some(RecordStatus::Pending));
        assert_eq!(ex.status_filter("vale aprovado"), Some(RecordStatus::Approved));
        assert_eq!(ex.status_filter("vales pagos"), Some(RecordStatus::Paid));
        assert_eq!(ex.status_filter("vales"), None);
    }

    #[test]
    fn advance_reasons() {
        let ex = extractor();
        assert_eq!(
            ex.advance_reason("vale de almoço para José"),
            Some("Vale almoço".to_owned())
        );
        assert_eq!(
            ex.advance_reason("vale transporte"),
            Some("Vale transporte".to_owned())
        );
        assert_eq!(
            ex.advance_reason("vale de emergência"),
            Some("Vale emergencial".to_owned())
        );
        assert_eq!(ex.advance_reason("vale de 200"), None);
    }

    #[test]
    fn report_types() {
        let ex = extractor();
        assert_eq!(ex.report_type("relatório de vendas"), Some(ReportType::Sales));
        assert_eq!(ex.report_type("relatório de estoque"), Some(ReportType::Inventory));
        assert_eq!(ex.report_type("relatório financeiro"), Some(ReportType::Financial));
        assert_eq!(
            ex.report_type("relatório de funcionários"),
            Some(ReportType::Employees)
        );
        assert_eq!(ex.report_type("relatório"), None);
    }
}
