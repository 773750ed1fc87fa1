//! The fixed HR context enumeration.
//!
//! A context tags a conversation with the HR domain it concerns. It is stored
//! on a session once, at creation, and is otherwise a per-message routing hint:
//! it selects the system instructions handed to the reply generator and the
//! quick-start suggestions shown to the user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HR domain a conversation (or a single message) is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatContext {
    #[default]
    General,
    Vacation,
    Learning,
    Pdi,
    Payslip,
}

/// Every context, in display order.
pub const ALL_CONTEXTS: [ChatContext; 5] = [
    ChatContext::General,
    ChatContext::Vacation,
    ChatContext::Learning,
    ChatContext::Pdi,
    ChatContext::Payslip,
];

impl ChatContext {
    /// Wire / database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ChatContext::General => "general",
            ChatContext::Vacation => "vacation",
            ChatContext::Learning => "learning",
            ChatContext::Pdi => "pdi",
            ChatContext::Payslip => "payslip",
        }
    }

    /// Strict parse. Returns `None` for anything outside the enumeration.
    pub fn parse(value: &str) -> Option<Self> {
        ALL_CONTEXTS
            .into_iter()
            .find(|ctx| ctx.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Lenient parse used at the API boundary: absent or unrecognized values
    /// fall back to [`ChatContext::General`].
    pub fn from_param(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    /// Human-facing label (pt-BR), used by clients for headers and pickers.
    pub fn label(self) -> &'static str {
        match self {
            ChatContext::General => "Assistente de RH",
            ChatContext::Vacation => "Férias",
            ChatContext::Learning => "Cursos e treinamentos",
            ChatContext::Pdi => "PDI",
            ChatContext::Payslip => "Holerite",
        }
    }

    /// System instructions routed to the reply generator for this context.
    pub fn instructions(self) -> &'static str {
        match self {
            ChatContext::General => {
                "Você é o assistente de RH do portal do colaborador. Responda em \
                 português, de forma cordial e objetiva, apenas sobre temas de RH."
            }
            ChatContext::Vacation => {
                "Você é o assistente de férias do portal do colaborador. Ajude com \
                 saldo de dias, períodos aquisitivos, agendamento e regras de férias."
            }
            ChatContext::Learning => {
                "Você é o assistente de desenvolvimento do portal do colaborador. \
                 Ajude com cursos, trilhas de aprendizagem, inscrições e certificados."
            }
            ChatContext::Pdi => {
                "Você é o assistente de PDI (Plano de Desenvolvimento Individual). \
                 Ajude a definir metas, acompanhar ações e preparar conversas com o gestor."
            }
            ChatContext::Payslip => {
                "Você é o assistente de holerite do portal do colaborador. Explique \
                 proventos, descontos, encargos e datas de pagamento sem expor dados \
                 de outros colaboradores."
            }
        }
    }
}

impl fmt::Display for ChatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_variant() {
        for ctx in ALL_CONTEXTS {
            assert_eq!(ChatContext::parse(ctx.as_str()), Some(ctx));
        }
    }

    #[test]
    fn parse_is_case_and_whitespace_tolerant() {
        assert_eq!(ChatContext::parse(" Vacation "), Some(ChatContext::Vacation));
        assert_eq!(ChatContext::parse("PDI"), Some(ChatContext::Pdi));
    }

    #[test]
    fn from_param_defaults_to_general() {
        assert_eq!(ChatContext::from_param(None), ChatContext::General);
        assert_eq!(ChatContext::from_param(Some("benefits")), ChatContext::General);
        assert_eq!(ChatContext::from_param(Some("")), ChatContext::General);
        assert_eq!(
            ChatContext::from_param(Some("payslip")),
            ChatContext::Payslip
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ChatContext::Learning).unwrap();
        assert_eq!(json, "\"learning\"");
        let ctx: ChatContext = serde_json::from_str("\"pdi\"").unwrap();
        assert_eq!(ctx, ChatContext::Pdi);
    }

    #[test]
    fn every_context_has_instructions() {
        for ctx in ALL_CONTEXTS {
            assert!(!ctx.instructions().is_empty());
            assert!(!ctx.label().is_empty());
        }
    }
}
