//! Deterministic generator used for local development and demos.
//!
//! Replies are canned per context and streamed word by word, so the whole
//! fragment/terminal protocol can be exercised without a language model.

use std::time::Duration;

use async_trait::async_trait;
use hrchat_core::context::ChatContext;

use super::{GenerationError, GenerationEvent, GenerationRequest, GenerationStream, ReplyGenerator};

/// Streams a canned reply for the request's context.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Canned reply text for a context.
    pub fn reply_for(context: ChatContext) -> &'static str {
        match context {
            ChatContext::General => {
                "Posso ajudar com férias, cursos, PDI e holerite. \
                 Sobre qual desses assuntos você quer falar?"
            }
            ChatContext::Vacation => {
                "Você possui 12 dias de férias disponíveis no período aquisitivo atual. \
                 Para agendar, acesse Férias > Solicitar no portal."
            }
            ChatContext::Learning => {
                "Há 3 cursos recomendados para a sua função e 1 curso obrigatório pendente. \
                 Você pode se inscrever em Aprendizagem > Catálogo."
            }
            ChatContext::Pdi => {
                "Seu PDI tem 2 ações em andamento. Que tal revisar os prazos antes da \
                 próxima conversa com seu gestor?"
            }
            ChatContext::Payslip => {
                "O seu último holerite está disponível em Pagamentos > Holerites. \
                 Posso explicar qualquer provento ou desconto listado nele."
            }
        }
    }
}

/// Split text into word fragments, each keeping its trailing whitespace, so
/// that concatenating the fragments reproduces the input exactly.
pub fn split_fragments(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut in_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            in_space = true;
        } else if in_space {
            fragments.push(std::mem::take(&mut current));
            in_space = false;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let text = Self::reply_for(request.context);
        let fragments = split_fragments(text);
        let delay = self.delay;

        let stream = async_stream::stream! {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok::<_, GenerationError>(GenerationEvent::Delta(fragment));
            }
            yield Ok::<_, GenerationError>(GenerationEvent::Completed {
                full_text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            });
        };
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
