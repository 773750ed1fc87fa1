//! Quick-start suggestion catalog.
//!
//! Suggestions are the first thing a new user sees, so lookups never fail:
//! every context has a curated set, and [`fallback_suggestions`] provides a
//! hard-coded, non-empty set for callers whose fetch failed.

use serde::{Deserialize, Serialize};

use crate::context::ChatContext;

/// A clickable prompt: `label` is shown, `query` is sent as the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionAction {
    pub label: String,
    pub query: String,
}

/// A titled group of suggestion actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionGroup {
    pub title: String,
    pub actions: Vec<SuggestionAction>,
}

type StaticGroup = (&'static str, &'static [(&'static str, &'static str)]);

const GENERAL: &[StaticGroup] = &[
    (
        "Comece por aqui",
        &[
            ("Meu saldo de férias", "Qual meu saldo de férias?"),
            ("Próximo pagamento", "Quando cai o próximo salário?"),
            ("Cursos disponíveis", "Quais cursos estão disponíveis para mim?"),
        ],
    ),
    (
        "Dúvidas frequentes",
        &[
            ("Benefícios", "Quais benefícios eu tenho?"),
            ("Falar com o RH", "Como falo com alguém do RH?"),
        ],
    ),
];

const VACATION: &[StaticGroup] = &[
    (
        "Saldo e períodos",
        &[
            ("Meu saldo", "Qual meu saldo de férias?"),
            ("Período aquisitivo", "Quando vence meu período aquisitivo?"),
        ],
    ),
    (
        "Agendamento",
        &[
            ("Como agendar", "Como faço para agendar minhas férias?"),
            ("Vender dias", "Posso vender parte das minhas férias?"),
            ("Dividir férias", "Em quantos períodos posso dividir as férias?"),
        ],
    ),
];

const LEARNING: &[StaticGroup] = &[
    (
        "Cursos",
        &[
            ("Cursos obrigatórios", "Quais cursos obrigatórios estão pendentes?"),
            ("Recomendações", "Que cursos você recomenda para minha função?"),
        ],
    ),
    (
        "Certificados",
        &[(
            "Emitir certificado",
            "Como emito o certificado de um curso concluído?",
        )],
    ),
];

const PDI: &[StaticGroup] = &[
    (
        "Plano de desenvolvimento",
        &[
            ("Criar metas", "Me ajude a definir metas para o meu PDI."),
            ("Acompanhar ações", "Como estão as ações do meu PDI?"),
        ],
    ),
    (
        "Conversa com o gestor",
        &[(
            "Preparar 1:1",
            "Como devo me preparar para a conversa de PDI com meu gestor?",
        )],
    ),
];

const PAYSLIP: &[StaticGroup] = &[
    (
        "Holerite",
        &[
            ("Entender descontos", "Explique os descontos do meu último holerite."),
            ("Data de pagamento", "Quando cai o próximo salário?"),
        ],
    ),
    (
        "Impostos",
        &[("Informe de rendimentos", "Onde encontro meu informe de rendimentos?")],
    ),
];

const FALLBACK: &[StaticGroup] = &[(
    "Sugestões",
    &[
        ("Meu saldo de férias", "Qual meu saldo de férias?"),
        ("Meu holerite", "Explique meu último holerite."),
        ("Falar com o RH", "Como falo com alguém do RH?"),
    ],
)];

fn materialize(groups: &[StaticGroup]) -> Vec<SuggestionGroup> {
    groups
        .iter()
        .map(|(title, actions)| SuggestionGroup {
            title: (*title).to_string(),
            actions: actions
                .iter()
                .map(|(label, query)| SuggestionAction {
                    label: (*label).to_string(),
                    query: (*query).to_string(),
                })
                .collect(),
        })
        .collect()
}

/// Curated suggestions for a context. Pure; never empty.
pub fn suggestions_for(context: ChatContext) -> Vec<SuggestionGroup> {
    let groups = match context {
        ChatContext::General => GENERAL,
        ChatContext::Vacation => VACATION,
        ChatContext::Learning => LEARNING,
        ChatContext::Pdi => PDI,
        ChatContext::Payslip => PAYSLIP,
    };
    materialize(groups)
}

/// Hard-coded set returned to callers whose suggestion fetch failed.
pub fn fallback_suggestions() -> Vec<SuggestionGroup> {
    materialize(FALLBACK)
}
