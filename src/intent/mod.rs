//! Command interpretation.
//!
//! Converts a finalized utterance into an [`Intent`] through an ordered,
//! first-match-wins rule table. Rule order is the contract: deactivation and
//! gratitude phrases first, then record verbs, then the navigation keyword
//! table, then search and report verbs. When no local rule applies, the
//! interpreter falls back to the remote chat collaborator and adapts its
//! answer; a failed remote call resolves to [`IntentKind::Unknown`].

pub mod slots;

use crate::error::Result;
use crate::history::ConversationTurn;
use crate::remote::{ChatContext, ChatPort, ChatReply};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

pub use slots::{Period, RecordStatus, ReportType, SlotExtractor, SlotValues};

/// What a finalized utterance asks the assistant to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// End the active session.
    Deactivate,
    /// Gratitude, answered conversationally.
    Thanks,
    /// Open a module, optionally with filters.
    Navigate,
    /// Create a record.
    Create,
    /// Edit a record.
    Edit,
    /// Delete a record.
    Delete,
    /// Search records.
    Search,
    /// Generate a report.
    Report,
    /// Nothing matched.
    Unknown,
}

/// Where the classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Matched by the local rule table.
    Local,
    /// Produced by the remote chat fallback.
    Remote,
}

/// The classified meaning of one final utterance. Immutable after creation.
#[derive(Debug, Clone)]
pub struct Intent {
    pub kind: IntentKind,
    /// Target module, when one was named or inferred.
    pub module: Option<String>,
    /// Extracted parameter values.
    pub slots: SlotValues,
    pub confidence: Confidence,
    /// Set when required slots could not be filled; the dispatcher asks a
    /// clarifying question instead of acting.
    pub missing_slots: bool,
    /// Free-text reply carried back from the remote fallback.
    pub remote_reply: Option<String>,
    /// Opaque action payload carried back from the remote fallback.
    pub remote_payload: Option<serde_json::Value>,
}

impl Intent {
    /// A locally classified intent with no module or slots.
    #[must_use]
    pub fn local(kind: IntentKind) -> Self {
        Self {
            kind,
            module: None,
            slots: SlotValues::default(),
            confidence: Confidence::Local,
            missing_slots: false,
            remote_reply: None,
            remote_payload: None,
        }
    }

    /// The unknown intent returned when the remote fallback also failed.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            confidence: Confidence::Remote,
            ..Self::local(IntentKind::Unknown)
        }
    }
}

/// One entry of the navigation keyword table.
struct NavEntry {
    keywords: &'static [&'static str],
    module: &'static str,
    /// Spoken acknowledgement, lowercase ("acessando o painel principal").
    message: &'static str,
}

/// Ordered navigation table — the first entry with a keyword hit wins.
const NAVIGATION: &[NavEntry] = &[
    NavEntry { keywords: &["dashboard", "painel", "início", "inicio"], module: "dashboard", message: "acessando o painel principal" },
    NavEntry { keywords: &["cliente"], module: "clientes", message: "abrindo gestão de clientes" },
    NavEntry { keywords: &["funcionário", "funcionario", "colaborador"], module: "funcionarios", message: "abrindo gestão de funcionários" },
    NavEntry { keywords: &["joia", "joias", "catálogo", "catalogo"], module: "joias", message: "acessando catálogo de joias" },
    NavEntry { keywords: &["material", "materiais"], module: "materiais", message: "abrindo gestão de materiais" },
    NavEntry { keywords: &["pedra", "pedras"], module: "pedras", message: "acessando catálogo de pedras" },
    NavEntry { keywords: &["vale", "vales", "adiantamento"], module: "vales", message: "abrindo sistema de vales" },
    NavEntry { keywords: &["caixa", "financeiro"], module: "caixa", message: "acessando controle de caixa" },
    NavEntry { keywords: &["custo", "custos"], module: "custos", message: "abrindo gestão de custos" },
    NavEntry { keywords: &["estoque", "inventário", "inventario"], module: "estoque", message: "acessando controle de estoque" },
    NavEntry { keywords: &["encomenda", "pedido"], module: "encomendas", message: "abrindo gestão de encomendas" },
    NavEntry { keywords: &["folha", "pagamento", "salário", "salario"], module: "folha-pagamento", message: "acessando folha de pagamento" },
    NavEntry { keywords: &["nota", "notas", "anotação", "anotacao"], module: "notas", message: "abrindo sistema de notas" },
    NavEntry { keywords: &["imposto", "impostos", "fiscal"], module: "impostos", message: "acessando gestão fiscal" },
    NavEntry { keywords: &["entrada", "entradas"], module: "entradas", message: "abrindo controle de entradas" },
];

/// Spoken acknowledgement for a navigation module, used by the dispatcher.
#[must_use]
pub fn navigation_message(module: &str) -> Option<&'static str> {
    NAVIGATION
        .iter()
        .find(|e| e.module == module)
        .map(|e| e.message)
}

const DEACTIVATE_WORDS: &[&str] = &["sair", "tchau", "desativar"];
const THANKS_WORDS: &[&str] = &["obrigado", "obrigada"];
const CREATE_WORDS: &[&str] = &["criar", "cadastrar", "novo", "nova"];
const EDIT_WORDS: &[&str] = &["editar", "alterar", "modificar"];
const DELETE_WORDS: &[&str] = &["excluir", "apagar", "remover", "deletar"];
const SEARCH_WORDS: &[&str] = &["buscar", "procurar", "mostrar"];
const REPORT_WORDS: &[&str] = &["relatório", "relatorio"];

/// Record nouns reachable by create/edit/delete verbs.
const RECORD_NOUNS: &[(&str, &str)] = &[
    ("vale", "vales"),
    ("cliente", "clientes"),
    ("funcionário", "funcionarios"),
    ("funcionario", "funcionarios"),
    ("encomenda", "encomendas"),
];

fn contains_any(lower: &str, words: &[&str]) -> bool {
    words.iter().any(|w| lower.contains(w))
}

fn record_module(lower: &str) -> Option<&'static str> {
    RECORD_NOUNS
        .iter()
        .find(|(noun, _)| lower.contains(noun))
        .map(|(_, module)| *module)
}

/// Utterance text prepared for rule matching.
struct CommandText {
    /// Original text, for case-preserving captures (names).
    raw: String,
    /// Lowercased text, for keyword checks.
    lower: String,
}

impl CommandText {
    fn new(text: &str) -> Self {
        Self {
            raw: text.to_owned(),
            lower: text.to_lowercase(),
        }
    }
}

/// One classification rule: a predicate plus an intent builder.
struct Rule {
    name: &'static str,
    applies: fn(&CommandText) -> bool,
    build: fn(&SlotExtractor, &CommandText) -> Intent,
}

/// The ordered rule table. Evaluated top to bottom; the first rule whose
/// predicate holds builds the intent.
const RULES: &[Rule] = &[
    Rule {
        name: "deactivate",
        applies: |t| contains_any(&t.lower, DEACTIVATE_WORDS),
        build: |_, _| Intent::local(IntentKind::Deactivate),
    },
    Rule {
        name: "thanks",
        applies: |t| contains_any(&t.lower, THANKS_WORDS),
        build: |_, _| Intent::local(IntentKind::Thanks),
    },
    Rule {
        name: "create",
        applies: |t| contains_any(&t.lower, CREATE_WORDS),
        build: build_create,
    },
    Rule {
        name: "edit",
        applies: |t| contains_any(&t.lower, EDIT_WORDS),
        build: |ex, t| build_record_change(ex, t, IntentKind::Edit),
    },
    Rule {
        name: "delete",
        applies: |t| contains_any(&t.lower, DELETE_WORDS),
        build: |ex, t| build_record_change(ex, t, IntentKind::Delete),
    },
    Rule {
        name: "navigate",
        applies: |t| NAVIGATION.iter().any(|e| contains_any(&t.lower, e.keywords)),
        build: build_navigate,
    },
    Rule {
        name: "search",
        applies: |t| {
            contains_any(&t.lower, SEARCH_WORDS)
                && (t.lower.contains("vale")
                    || t.lower.contains("cliente")
                    || t.lower.contains("encomenda")
                    || t.lower.contains("pedido"))
        },
        build: build_search,
    },
    Rule {
        name: "report",
        applies: |t| contains_any(&t.lower, REPORT_WORDS),
        build: build_report,
    },
];

fn build_create(ex: &SlotExtractor, t: &CommandText) -> Intent {
    let mut intent = Intent::local(IntentKind::Create);
    match record_module(&t.lower) {
        Some("vales") => {
            intent.module = Some("vales".to_owned());
            intent.slots.employee = ex.employee_name(&t.raw);
            intent.slots.amount = ex.amount(&t.raw);
            intent.slots.reason = ex.advance_reason(&t.lower);
            intent.missing_slots =
                intent.slots.employee.is_none() || intent.slots.amount.is_none();
        }
        Some(module) => {
            intent.module = Some(module.to_owned());
        }
        None => {
            // Create verb with no recognizable record noun — the dispatcher
            // asks what to create.
            intent.missing_slots = true;
        }
    }
    intent
}

fn build_record_change(ex: &SlotExtractor, t: &CommandText, kind: IntentKind) -> Intent {
    let mut intent = Intent::local(kind);
    intent.module = record_module(&t.lower).map(str::to_owned);
    intent.slots.record_number = ex.record_number(&t.raw);
    intent.missing_slots = intent.module.is_none() || intent.slots.record_number.is_none();
    intent
}

fn build_navigate(ex: &SlotExtractor, t: &CommandText) -> Intent {
    let mut intent = Intent::local(IntentKind::Navigate);
    for entry in NAVIGATION {
        if contains_any(&t.lower, entry.keywords) {
            intent.module = Some(entry.module.to_owned());
            break;
        }
    }
    if intent.module.as_deref() == Some("vales") {
        intent.slots.employee = ex.employee_name(&t.raw);
    }
    intent.slots.date = ex.date_filter(&t.lower);
    if intent.slots.date.is_none() {
        intent.slots.period = ex.period_filter(&t.lower);
    }
    intent.slots.status = ex.status_filter(&t.lower);
    intent
}

fn build_search(ex: &SlotExtractor, t: &CommandText) -> Intent {
    let mut intent = Intent::local(IntentKind::Search);
    if t.lower.contains("vale") {
        intent.module = Some("vales".to_owned());
        intent.slots.employee = ex.employee_name(&t.raw);
        intent.missing_slots = intent.slots.employee.is_none();
    } else if t.lower.contains("cliente") {
        intent.module = Some("clientes".to_owned());
        intent.slots.query = ex.client_query(&t.raw);
        intent.missing_slots = intent.slots.query.is_none();
    } else {
        intent.module = Some("encomendas".to_owned());
        intent.slots.date = ex.date_filter(&t.lower);
        if intent.slots.date.is_none() {
            intent.slots.period = ex.period_filter(&t.lower);
        }
        intent.slots.status = ex.status_filter(&t.lower);
    }
    intent
}

fn build_report(ex: &SlotExtractor, t: &CommandText) -> Intent {
    let mut intent = Intent::local(IntentKind::Report);
    intent.slots.report_type = ex.report_type(&t.lower);
    intent.slots.period = ex
        .period_filter(&t.lower)
        .or(if t.lower.contains("hoje") {
            Some(Period::Today)
        } else {
            None
        });
    intent.missing_slots = intent.slots.report_type.is_none();
    intent
}

/// Classifies utterances, locally first and remotely as a fallback.
pub struct CommandInterpreter {
    extractor: SlotExtractor,
    chat: Arc<dyn ChatPort>,
    /// Opaque identity/context blob passed through to the remote fallback.
    identity: Option<serde_json::Value>,
    user_id: String,
}

impl CommandInterpreter {
    /// Create an interpreter backed by the given chat fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot patterns fail to compile.
    pub fn new(chat: Arc<dyn ChatPort>, user_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            extractor: SlotExtractor::new()?,
            chat,
            identity: None,
            user_id: user_id.into(),
        })
    }

    /// Attach an opaque identity blob forwarded to remote fallback calls.
    #[must_use]
    pub fn with_identity(mut self, identity: serde_json::Value) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Classify against the local rule table only.
    #[must_use]
    pub fn classify_local(&self, text: &str) -> Option<Intent> {
        let command = CommandText::new(text);
        for rule in RULES {
            if (rule.applies)(&command) {
                debug!(rule = rule.name, "local rule matched");
                return Some((rule.build)(&self.extractor, &command));
            }
        }
        None
    }

    /// Classify an utterance, falling back to the remote chat collaborator
    /// when no local rule matches. Never fails: a failed remote call
    /// resolves to [`IntentKind::Unknown`].
    pub async fn classify(&self, text: &str, history: &[ConversationTurn]) -> Intent {
        if let Some(intent) = self.classify_local(text) {
            return intent;
        }

        let context = ChatContext {
            user_id: self.user_id.clone(),
            history: history.to_vec(),
            timestamp: Utc::now(),
            identity: self.identity.clone(),
        };
        match self.chat.converse(text, &context).await {
            Ok(reply) => adapt_remote_reply(reply),
            Err(e) => {
                warn!("chat fallback failed: {e}");
                Intent::unknown()
            }
        }
    }
}

/// Adapt a remote chat answer into an intent: an answer naming a module
/// becomes a navigation with its payload attached; a plain answer stays
/// `Unknown` and the dispatcher speaks the reply verbatim.
fn adapt_remote_reply(reply: ChatReply) -> Intent {
    let kind = if reply.module.is_some() {
        IntentKind::Navigate
    } else {
        IntentKind::Unknown
    };
    Intent {
        kind,
        module: reply.module,
        slots: SlotValues::default(),
        confidence: Confidence::Remote,
        missing_slots: false,
        remote_reply: Some(reply.response),
        remote_payload: reply.data,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::EngineError;

    struct NoChat;

    #[async_trait::async_trait]
    impl ChatPort for NoChat {
        async fn converse(
            &self,
            _message: &str,
            _context: &ChatContext,
        ) -> crate::error::Result<ChatReply> {
            Err(EngineError::Classification("offline".into()))
        }
    }

    fn interpreter() -> CommandInterpreter {
        CommandInterpreter::new(Arc::new(NoChat), "test-user").unwrap()
    }

    #[test]
    fn deactivation_words_win_first() {
        let intent = interpreter().classify_local("tchau lua").unwrap();
        assert_eq!(intent.kind, IntentKind::Deactivate);
    }

    #[test]
    fn thanks_is_classified() {
        let intent = interpreter().classify_local("obrigado lua").unwrap();
        assert_eq!(intent.kind, IntentKind::Thanks);
    }

    #[test]
    fn create_advance_with_full_slots() {
        let intent = interpreter()
            .classify_local("Lua, criar vale de 200 reais para Josemir")
            .unwrap();
        assert_eq!(intent.kind, IntentKind::Create);
        assert_eq!(intent.module.as_deref(), Some("vales"));
        assert_eq!(intent.slots.employee.as_deref(), Some("Josemir"));
        assert_eq!(intent.slots.amount, Some(200.0));
        assert!(!intent.missing_slots);
    }

    #[test]
    fn create_advance_missing_slots_is_flagged() {
        let intent = interpreter().classify_local("Lua, criar vale").unwrap();
        assert_eq!(intent.kind, IntentKind::Create);
        assert_eq!(intent.module.as_deref(), Some("vales"));
        assert!(intent.missing_slots);
    }

    #[test]
    fn create_without_noun_asks_what() {
        let intent = interpreter().classify_local("quero criar uma coisa").unwrap();
        assert_eq!(intent.kind, IntentKind::Create);
        assert!(intent.module.is_none());
        assert!(intent.missing_slots);
    }

    #[test]
    fn create_wins_over_navigation() {
        // "vale" is also a navigation keyword; the create verb must take
        // precedence in the rule order.
        let intent = interpreter().classify_local("criar vale").unwrap();
        assert_eq!(intent.kind, IntentKind::Create);
    }

    #[test]
    fn edit_requires_record_number() {
        let intent = interpreter().classify_local("editar vale número 12").unwrap();
        assert_eq!(intent.kind, IntentKind::Edit);
        assert_eq!(intent.module.as_deref(), Some("vales"));
        assert_eq!(intent.slots.record_number, Some(12));
        assert!(!intent.missing_slots);

        let intent = interpreter().classify_local("editar vale").unwrap();
        assert!(intent.missing_slots);
    }

    #[test]
    fn delete_is_classified() {
        let intent = interpreter().classify_local("excluir vale número 3").unwrap();
        assert_eq!(intent.kind, IntentKind::Delete);
        assert_eq!(intent.slots.record_number, Some(3));
    }

    #[test]
    fn navigation_first_table_hit_wins() {
        let intent = interpreter().classify_local("abrir o painel").unwrap();
        assert_eq!(intent.kind, IntentKind::Navigate);
        assert_eq!(intent.module.as_deref(), Some("dashboard"));
    }

    #[test]
    fn navigation_extracts_filters() {
        let intent = interpreter()
            .classify_local("vales pendentes de Josemir")
            .unwrap();
        assert_eq!(intent.kind, IntentKind::Navigate);
        assert_eq!(intent.module.as_deref(), Some("vales"));
        assert_eq!(intent.slots.employee.as_deref(), Some("Josemir"));
        assert_eq!(intent.slots.status, Some(RecordStatus::Pending));
    }

    #[test]
    fn report_with_type_and_period() {
        let intent = interpreter()
            .classify_local("relatório de vendas da semana")
            .unwrap();
        assert_eq!(intent.kind, IntentKind::Report);
        assert_eq!(intent.slots.report_type, Some(ReportType::Sales));
        assert_eq!(intent.slots.period, Some(Period::Week));
        assert!(!intent.missing_slots);
    }

    #[test]
    fn report_without_type_is_flagged() {
        let intent = interpreter().classify_local("relatório de hoje").unwrap();
        assert_eq!(intent.kind, IntentKind::Report);
        assert!(intent.missing_slots);
    }

    #[test]
    fn unmatched_text_has_no_local_intent() {
        assert!(interpreter().classify_local("qual é a previsão do tempo").is_none());
    }

    #[tokio::test]
    async fn remote_failure_resolves_to_unknown() {
        let intent = interpreter().classify("qual é a previsão do tempo", &[]).await;
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert_eq!(intent.confidence, Confidence::Remote);
        assert!(intent.remote_reply.is_none());
    }

    #[test]
    fn remote_reply_with_module_becomes_navigation() {
        let intent = adapt_remote_reply(ChatReply {
            response: "Abrindo o caixa para o senhor.".to_owned(),
            action: Some("open".to_owned()),
            module: Some("caixa".to_owned()),
            data: None,
        });
        assert_eq!(intent.kind, IntentKind::Navigate);
        assert_eq!(intent.module.as_deref(), Some("caixa"));
        assert_eq!(intent.confidence, Confidence::Remote);
        assert!(intent.remote_reply.is_some());
    }
}
