//! Status strings and descriptions used on the wire.
//!
//! Existing clients match on these exact values, so they are kept verbatim.

/// Successful `login` / `channel`.
pub const SUCCESS: &str = "sucesso";
/// Successful `publish` / `message`, heartbeat, and replication ack.
pub const OK: &str = "OK";
/// Any domain or protocol error.
pub const ERROR: &str = "erro";
/// Heartbeat from a name the authority no longer knows.
pub const UNKNOWN: &str = "unknown";
/// Replication input that was not tagged as replicated.
pub const IGNORED: &str = "ignored";

/// Election acknowledgement value.
pub const ELECTION_OK: &str = "OK";

/// Duplicate `login`.
pub const USER_EXISTS: &str = "Usuário já cadastrado";
/// Duplicate `channel`.
pub const CHANNEL_EXISTS: &str = "Canal ja existe";
/// `publish` to a channel that does not exist.
pub const NO_SUCH_CHANNEL: &str = "Canal nao existe";
/// `message` to a user that does not exist.
pub const NO_SUCH_USER: &str = "Usuario nao existe";
/// Unknown client-facing service.
pub const UNKNOWN_SERVICE: &str = "Serviço não encontrado";
/// Unknown sync or authority service.
pub const UNRECOGNIZED_SERVICE: &str = "Servico nao reconhecido";
/// Authority request without a server name.
pub const MISSING_NAME: &str = "Nome do servidor ausente";
