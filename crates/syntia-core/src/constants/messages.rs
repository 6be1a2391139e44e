// ABOUTME: Fixed Spanish strings returned to users or injected into model prompts
// ABOUTME: Sentinels, synthetic history turns, and compaction instructions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Shown when the daily quota is exhausted
pub const RATE_LIMIT_MESSAGE: &str =
    "Los creditos diarios se han agotado. Si requieres mas, contactate con el administrador.";

/// Instruction used when summarizing a conversation
pub const COMPACTION_PROMPT: &str = "Resume esta conversacion en maximo 200 palabras conservando datos clave, nombres de productos y cifras. Responde SOLO con el resumen.";

/// Prefix of the synthetic user turn carrying the stored summary
pub const SUMMARY_TURN_PREFIX: &str = "[Resumen previo: ";

/// Suffix of the synthetic user turn carrying the stored summary
pub const SUMMARY_TURN_SUFFIX: &str = "]";

/// Synthetic model acknowledgment following the summary turn
pub const SUMMARY_ACK: &str = "Entendido, tengo el contexto.";

/// Header of the other-conversations block in the system instruction
pub const PREVIOUS_SUMMARIES_HEADER: &str = "RESUMEN DE CONVERSACIONES ANTERIORES:";

/// Appended to tool results cut at the character ceiling
pub const TRUNCATION_SUFFIX: &str = "\n... (resultado truncado)";

/// Machine-readable terminal error for truncated output
pub const RESPONSE_TOO_LONG_CODE: &str = "RESPONSE_TOO_LONG";

/// Shown when the caller reaches a client outside their assignment
pub const CLIENT_ACCESS_DENIED: &str = "No tienes acceso a los datos de este medico.";

/// Shown when the upstream model stays busy after all retries
pub const SERVICE_BUSY_MESSAGE: &str =
    "El servicio esta saturado en este momento. Intenta de nuevo en unos segundos.";

/// Validation and lookup messages of the HTTP surface
pub mod http {
    /// Missing or invalid credential
    pub const UNAUTHORIZED: &str = "No autorizado";
    /// Credential valid but not linked to an internal user
    pub const USER_NOT_FOUND: &str = "Usuario no encontrado en el sistema";
    /// Empty send body
    pub const EMPTY_MESSAGE: &str = "El mensaje no puede estar vacio";
    /// Bad rate body
    pub const RATE_FIELDS_REQUIRED: &str = "message_id y rating (1-5) son obligatorios";
    /// Rating target missing or user-authored
    pub const MESSAGE_NOT_RATEABLE: &str = "Mensaje no encontrado o no es de asistente";
    /// Rating target owned by someone else
    pub const MESSAGE_FORBIDDEN: &str = "No tienes acceso a este mensaje";
    /// History request without conversation
    pub const CONVERSATION_ID_REQUIRED: &str = "conversation_id es obligatorio";
    /// Conversation missing or not visible
    pub const CONVERSATION_NOT_FOUND: &str = "Conversacion no encontrada";
    /// Unknown GET action
    pub const UNKNOWN_GET_ACTION: &str = "Accion GET no reconocida";
    /// Unsupported method
    pub const METHOD_NOT_ALLOWED: &str = "Metodo no permitido";
    /// Body is not JSON
    pub const INVALID_BODY: &str = "Cuerpo de solicitud invalido";
}
