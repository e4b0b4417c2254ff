//! Intent dispatch.
//!
//! Maps a classified [`Intent`] to at most one external collaborator call
//! plus an optional [`ActionCommand`] for the navigation/modal collaborator,
//! and always produces a spoken reply. Intents flagged with missing slots
//! get a clarifying question instead of an action. Collaborator failures
//! are absorbed into a spoken apology — no partial action is ever emitted.

use crate::config::ConversationConfig;
use crate::history::{ConversationHistory, ConversationTurn, Role};
use crate::intent::{Confidence, Intent, IntentKind, SlotValues, navigation_message};
use crate::remote::RecordsPort;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One command emitted to the external navigation/modal collaborator.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActionCommand {
    /// Module the command targets.
    pub target_module: String,
    /// Command payload (filters, prefill values, record numbers).
    pub payload: serde_json::Value,
}

/// Result of dispatching one intent.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Reply to speak.
    pub reply: String,
    /// Command for the navigation/modal collaborator, when one applies.
    pub action: Option<ActionCommand>,
    /// Whether the session should end after the reply is spoken.
    pub end_session: bool,
}

impl DispatchOutcome {
    fn reply_only(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            action: None,
            end_session: false,
        }
    }

    fn with_action(reply: impl Into<String>, action: ActionCommand) -> Self {
        Self {
            reply: reply.into(),
            action: Some(action),
            end_session: false,
        }
    }
}

/// Dispatches intents to collaborators and produces spoken replies.
pub struct ActionDispatcher {
    records: Arc<dyn RecordsPort>,
    history: Arc<Mutex<ConversationHistory>>,
    replies: ConversationConfig,
}

impl ActionDispatcher {
    /// Build a dispatcher over the record collaborator and shared history.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordsPort>,
        history: Arc<Mutex<ConversationHistory>>,
        replies: ConversationConfig,
    ) -> Self {
        Self {
            records,
            history,
            replies,
        }
    }

    /// Dispatch one intent. Never fails: collaborator errors become spoken
    /// apologies. The resulting assistant turn is appended to history.
    pub async fn dispatch(&self, intent: &Intent) -> DispatchOutcome {
        let outcome = match intent.kind {
            IntentKind::Deactivate => DispatchOutcome {
                reply: self.replies.farewell.clone(),
                action: None,
                end_session: true,
            },
            IntentKind::Thanks => DispatchOutcome::reply_only(&self.replies.thanks_reply),
            IntentKind::Navigate => self.dispatch_navigate(intent),
            IntentKind::Create => self.dispatch_create(intent).await,
            IntentKind::Edit => Self::dispatch_record_change(intent, "edição", "edit"),
            IntentKind::Delete => Self::dispatch_record_change(intent, "exclusão", "delete"),
            IntentKind::Search => self.dispatch_search(intent).await,
            IntentKind::Report => self.dispatch_report(intent).await,
            IntentKind::Unknown => self.dispatch_unknown(intent),
        };

        self.append_assistant_turn(&outcome.reply);
        outcome
    }

    fn dispatch_navigate(&self, intent: &Intent) -> DispatchOutcome {
        let Some(module) = intent.module.as_deref() else {
            return DispatchOutcome::reply_only(&self.replies.not_understood_reply);
        };

        let payload = intent
            .remote_payload
            .clone()
            .unwrap_or_else(|| filters_payload(&intent.slots));
        let action = ActionCommand {
            target_module: module.to_owned(),
            payload,
        };

        let reply = match (&intent.remote_reply, navigation_message(module)) {
            (Some(remote), _) => remote.clone(),
            (None, Some(message)) => format!("Sim senhor, {message}."),
            (None, None) => format!("Sim senhor, abrindo {module}."),
        };
        info!(module, "navigation dispatched");
        DispatchOutcome::with_action(reply, action)
    }

    async fn dispatch_create(&self, intent: &Intent) -> DispatchOutcome {
        match intent.module.as_deref() {
            Some("vales") => self.dispatch_create_advance(intent).await,
            Some("clientes") => DispatchOutcome::with_action(
                "Para cadastrar um cliente, vou abrir o formulário de cadastro.",
                ActionCommand {
                    target_module: "clientes".to_owned(),
                    payload: json!({ "mode": "create" }),
                },
            ),
            Some("funcionarios") => DispatchOutcome::with_action(
                "Abrindo formulário de cadastro de funcionário.",
                ActionCommand {
                    target_module: "funcionarios".to_owned(),
                    payload: json!({ "mode": "create" }),
                },
            ),
            Some("encomendas") => DispatchOutcome::with_action(
                "Iniciando nova encomenda no sistema.",
                ActionCommand {
                    target_module: "encomendas".to_owned(),
                    payload: json!({ "mode": "create" }),
                },
            ),
            _ => DispatchOutcome::reply_only(
                "O que o senhor gostaria de criar? Cliente, funcionário, vale ou encomenda?",
            ),
        }
    }

    async fn dispatch_create_advance(&self, intent: &Intent) -> DispatchOutcome {
        if intent.missing_slots {
            return DispatchOutcome::reply_only(
                "Para criar um vale, preciso saber o nome do funcionário e o valor. \
                 Por exemplo: \"Criar vale de 200 reais para Josemir\"",
            );
        }

        // The rule table guarantees both slots when missing_slots is clear.
        let (Some(employee), Some(amount)) =
            (intent.slots.employee.as_deref(), intent.slots.amount)
        else {
            return DispatchOutcome::reply_only(
                "Para criar um vale, preciso saber o nome do funcionário e o valor.",
            );
        };
        let reason = intent
            .slots
            .reason
            .clone()
            .unwrap_or_else(|| "Vale solicitado via assistente".to_owned());

        match self.records.create_advance(employee, amount, &reason).await {
            Ok(()) => {
                info!(employee, amount, "advance created");
                DispatchOutcome::with_action(
                    format!("Vale criado com sucesso. {employee} receberá {amount} reais."),
                    ActionCommand {
                        target_module: "vales".to_owned(),
                        payload: json!({
                            "mode": "create",
                            "prefill": { "employee": employee, "amount": amount },
                        }),
                    },
                )
            }
            Err(e) => {
                warn!("advance creation failed: {e}");
                DispatchOutcome::reply_only(
                    "Não foi possível criar o vale. Verifique os dados e tente novamente.",
                )
            }
        }
    }

    fn dispatch_record_change(intent: &Intent, noun: &str, mode: &str) -> DispatchOutcome {
        let (Some(module), Some(number), false) = (
            intent.module.as_deref(),
            intent.slots.record_number,
            intent.missing_slots,
        ) else {
            return DispatchOutcome::reply_only(format!(
                "Para {noun}, preciso do número do registro. \
                 Por exemplo: \"Editar vale número 12\""
            ));
        };

        DispatchOutcome::with_action(
            format!("Abrindo o registro {number} para {noun}."),
            ActionCommand {
                target_module: module.to_owned(),
                payload: json!({ "mode": mode, "record": number }),
            },
        )
    }

    async fn dispatch_search(&self, intent: &Intent) -> DispatchOutcome {
        match intent.module.as_deref() {
            Some("vales") => {
                let Some(employee) = intent.slots.employee.as_deref() else {
                    return DispatchOutcome::reply_only(
                        "De qual funcionário o senhor gostaria de ver os vales?",
                    );
                };
                match self.records.search_advances(employee).await {
                    Ok(records) if records.is_empty() => DispatchOutcome::reply_only(format!(
                        "Não encontrei vales para {employee}."
                    )),
                    Ok(records) => {
                        let total: f64 = records.iter().map(|r| r.amount).sum();
                        DispatchOutcome::with_action(
                            format!(
                                "Encontrei {} vales para {employee}, totalizando {total} reais.",
                                records.len()
                            ),
                            ActionCommand {
                                target_module: "vales".to_owned(),
                                payload: json!({ "employee": employee }),
                            },
                        )
                    }
                    Err(e) => {
                        warn!("advance search failed: {e}");
                        DispatchOutcome::reply_only(
                            "Ocorreu um erro durante a busca. Por favor, tente novamente.",
                        )
                    }
                }
            }
            Some("clientes") => {
                let Some(query) = intent.slots.query.as_deref() else {
                    return DispatchOutcome::reply_only("Qual cliente o senhor procura?");
                };
                DispatchOutcome::with_action(
                    format!("Buscando cliente {query}."),
                    ActionCommand {
                        target_module: "clientes".to_owned(),
                        payload: json!({ "search": query }),
                    },
                )
            }
            _ => DispatchOutcome::with_action(
                "Abrindo encomendas com os filtros solicitados.",
                ActionCommand {
                    target_module: "encomendas".to_owned(),
                    payload: filters_payload(&intent.slots),
                },
            ),
        }
    }

    async fn dispatch_report(&self, intent: &Intent) -> DispatchOutcome {
        let Some(report_type) = intent.slots.report_type else {
            return DispatchOutcome::reply_only(
                "Qual relatório o senhor deseja? Vendas, estoque, financeiro ou funcionários?",
            );
        };
        let period = intent
            .slots
            .period
            .map_or("today", crate::intent::Period::as_str);

        match self
            .records
            .generate_report(report_type.as_str(), period)
            .await
        {
            Ok(report) => DispatchOutcome::with_action(
                format!("Relatório gerado. {}", report.summary),
                ActionCommand {
                    target_module: "reports".to_owned(),
                    payload: json!({ "type": report_type.as_str(), "period": period }),
                },
            ),
            Err(e) => {
                warn!("report generation failed: {e}");
                DispatchOutcome::reply_only("Não foi possível gerar o relatório no momento.")
            }
        }
    }

    fn dispatch_unknown(&self, intent: &Intent) -> DispatchOutcome {
        match (&intent.remote_reply, intent.confidence) {
            (Some(reply), Confidence::Remote) => DispatchOutcome::reply_only(reply.clone()),
            _ => DispatchOutcome::reply_only(&self.replies.not_understood_reply),
        }
    }

    fn append_assistant_turn(&self, reply: &str) {
        if let Ok(mut history) = self.history.lock() {
            history.push(ConversationTurn::now(Role::Assistant, reply));
        }
    }
}

/// Build a filter payload from extracted slots (employee, date, period,
/// status). Empty slots are omitted.
fn filters_payload(slots: &SlotValues) -> serde_json::Value {
    let mut payload = serde_json::Map::new();
    if let Some(employee) = &slots.employee {
        payload.insert("employee".to_owned(), json!(employee));
    }
    if let Some(date) = slots.date {
        payload.insert("date".to_owned(), json!(date.format("%Y-%m-%d").to_string()));
    }
    if let Some(period) = slots.period {
        payload.insert("period".to_owned(), json!(period.as_str()));
    }
    if let Some(status) = slots.status {
        payload.insert("status".to_owned(), json!(status.as_str()));
    }
    serde_json::Value::Object(payload)
}
