//! Command parsing and user-facing messages for the terminal client.

use hrchat_core::types::DbId;

use crate::error::ClientError;

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Quit,
    New,
    Sessions,
    Open(DbId),
    Delete(DbId),
    Context(&'a str),
    Suggest,
    /// Anything that is not a command is sent as a chat message.
    Message(&'a str),
    /// A command with a bad argument; carries the message to show.
    Invalid(String),
}

pub fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    let (name, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();

    match name {
        "/quit" => Command::Quit,
        "/new" => Command::New,
        "/sessions" => Command::Sessions,
        "/open" => parse_id(arg).map_or_else(Command::Invalid, Command::Open),
        "/delete" => parse_id(arg).map_or_else(Command::Invalid, Command::Delete),
        "/context" => Command::Context(arg),
        "/suggest" => Command::Suggest,
        _ => Command::Message(line),
    }
}

fn parse_id(value: &str) -> Result<DbId, String> {
    if value.is_empty() {
        return Err("Informe o número da conversa.".into());
    }
    value
        .parse::<DbId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| format!("Número de conversa inválido: {value}"))
}

/// What to tell the user when a session command fails.
pub fn error_message(err: &ClientError) -> &'static str {
    match err {
        err if err.is_not_found() => "Conversa não encontrada.",
        ClientError::Http { status: 401, .. } => "Sessão expirada. Entre novamente.",
        ClientError::Http { status: 409, .. } => "Aguarde a resposta em andamento terminar.",
        ClientError::Timeout => "O servidor demorou a responder. Tente novamente.",
        ClientError::Transport(_) => "Não foi possível conectar ao servidor.",
        _ => "Não foi possível concluir a operação. Tente novamente.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_messages() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(" /open 12 "), Command::Open(12));
        assert_eq!(parse_command("/delete 3"), Command::Delete(3));
        assert_eq!(parse_command("/context payslip"), Command::Context("payslip"));
        assert_eq!(
            parse_command("Qual meu saldo de férias?"),
            Command::Message("Qual meu saldo de férias?")
        );
    }

    #[test]
    fn bad_session_ids_are_reported_not_raised() {
        assert_eq!(
            parse_command("/open abc"),
            Command::Invalid("Número de conversa inválido: abc".into())
        );
        assert_eq!(
            parse_command("/delete"),
            Command::Invalid("Informe o número da conversa.".into())
        );
        assert!(matches!(parse_command("/open -4"), Command::Invalid(_)));
    }

    #[test]
    fn failures_map_to_localized_messages() {
        let not_found = ClientError::Http {
            status: 404,
            code: "NOT_FOUND".into(),
            message: "Chat session 9 not found".into(),
        };
        assert_eq!(error_message(&not_found), "Conversa não encontrada.");
        assert_eq!(
            error_message(&ClientError::Transport("connection refused".into())),
            "Não foi possível conectar ao servidor."
        );
        assert_eq!(
            error_message(&ClientError::StreamClosed),
            "Não foi possível concluir a operação. Tente novamente."
        );
    }
}
