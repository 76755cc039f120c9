use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FeedbackError;

const DEFAULT_AGENT_ID: &str = "coach-teacher";

/// Replacement text shown when the model's reply fails the quality gate.
/// Same 4-point structure the prompt asks for, so the UI renders either
/// one the same way.
const FALLBACK_REPLY: &str = "1) Resumen del desempeño: Completaste todo el módulo con éxito y \
demostraste compromiso al practicar cada parte del contenido. \
2) Qué hiciste bien: Seguiste las instrucciones, repetiste las frases y te mantuviste hasta \
terminar el 100% del módulo. \
3) Qué debes mejorar: Repite las partes donde sientas que dudas en la pronunciación o \
comprensión, enfocándote en la claridad y el ritmo. \
4) Recomendación concreta: Vuelve a practicar las frases más importantes en voz alta, usando \
el botón de escuchar y hablar hasta que te sientas totalmente seguro.";

const MIN_REPLY_LEN: usize = 40;
const REQUIRED_MARKER: &str = "2)";

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct FeedbackConfig {
    pub base_url: String,
    pub agent_id: String,
}

impl FeedbackConfig {
    /// Reads `COACH_FEEDBACK_URL` / `COACH_AGENT_ID`. Without a URL the
    /// client stays disabled and callers get the fallback text.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("COACH_FEEDBACK_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let agent_id =
            env::var("COACH_AGENT_ID").unwrap_or_else(|_| DEFAULT_AGENT_ID.into());
        Some(Self { base_url, agent_id })
    }
}

//
// ─── MODULE SUMMARY ────────────────────────────────────────────────────────────
//

/// Fixed-format performance summary embedded into the prompt.
#[derive(Debug, Clone, Default)]
pub struct ModuleSummary {
    pub module_name: String,
    pub student_name: Option<String>,
    /// 0–100.
    pub score: u32,
    pub strengths: Vec<String>,
    pub mistakes: Vec<String>,
}

fn bullet_list(items: &[String], empty_line: &str) -> String {
    if items.is_empty() {
        format!("- {empty_line}")
    } else {
        items
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds the natural-language prompt for the teaching agent.
#[must_use]
pub fn build_prompt(summary: &ModuleSummary) -> String {
    [
        format!(
            "Estudiante: {}",
            summary.student_name.as_deref().unwrap_or("Estudiante")
        ),
        format!("Módulo completado: {}", summary.module_name),
        format!("Puntaje final: {}/100", summary.score),
        String::new(),
        "Puntos fuertes del estudiante en este módulo:".to_owned(),
        bullet_list(&summary.strengths, "Ninguno registrado."),
        String::new(),
        "Errores o temas que le costaron al estudiante:".to_owned(),
        bullet_list(&summary.mistakes, "No se registraron errores."),
        String::new(),
        "Genera una retroalimentación corta (máx. 6 líneas), en español sencillo, con este formato:"
            .to_owned(),
        "1) Resumen del desempeño".to_owned(),
        "2) Qué hizo bien".to_owned(),
        "3) Qué debe mejorar".to_owned(),
        "4) Una recomendación concreta para el próximo módulo".to_owned(),
    ]
    .join("\n")
}

//
// ─── REPLY NORMALIZATION AND QUALITY GATE ──────────────────────────────────────
//

/// Flattens a model reply into one display-safe line: CRLF unified,
/// markdown bold stripped, lines trimmed and joined with single spaces.
#[must_use]
pub fn normalize_reply(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace("**", "");
    let joined = unified
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The upstream model sometimes ignores the 4-point format or answers
/// with a bare number. Anything without the second point marker, or too
/// short to be feedback, gets replaced by the fallback paragraph.
#[must_use]
pub fn gate_reply(normalized: &str) -> String {
    if normalized.contains(REQUIRED_MARKER) && normalized.chars().count() >= MIN_REPLY_LEN {
        normalized.to_owned()
    } else {
        warn!("model reply failed quality gate, using fallback");
        FALLBACK_REPLY.to_owned()
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(rename = "agentId")]
    agent_id: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    ok: bool,
    arcanum: Option<ArcanumReply>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArcanumReply {
    #[allow(dead_code)]
    ok: bool,
    #[allow(dead_code)]
    #[serde(rename = "agentId")]
    agent_id: String,
    reply: String,
}

//
// ─── CLIENT ────────────────────────────────────────────────────────────────────
//

/// Client for the hosted feedback gateway.
#[derive(Clone)]
pub struct FeedbackClient {
    client: Client,
    config: Option<FeedbackConfig>,
}

impl FeedbackClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(FeedbackConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<FeedbackConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// End-of-module feedback text, always ready to display: either the
    /// gated model reply or the fallback paragraph.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError` when the gateway is configured but the
    /// request or envelope fails. No retry; the user presses the button
    /// again.
    pub async fn module_feedback(
        &self,
        summary: &ModuleSummary,
    ) -> Result<String, FeedbackError> {
        let Some(config) = self.config.as_ref() else {
            debug!("feedback gateway not configured, returning fallback");
            return Ok(FALLBACK_REPLY.to_owned());
        };

        let payload = ChatRequest {
            agent_id: config.agent_id.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(summary),
            }],
        };

        let response = self
            .client
            .post(&config.base_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedbackError::HttpStatus(response.status()));
        }

        let envelope: ChatEnvelope = response.json().await?;
        if !envelope.ok {
            return Err(FeedbackError::Gateway(
                envelope.error.unwrap_or_else(|| "gateway error".into()),
            ));
        }
        let Some(arcanum) = envelope.arcanum else {
            return Err(FeedbackError::Gateway("missing reply payload".into()));
        };

        Ok(gate_reply(&normalize_reply(&arcanum.reply)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_flattens_markdown_and_lines() {
        let raw = "1) **Bien**\r\n\r\n2)  Sigue   practicando\n\n3) Mejora el ritmo del habla aquí";
        let normalized = normalize_reply(raw);
        assert_eq!(
            normalized,
            "1) Bien 2) Sigue practicando 3) Mejora el ritmo del habla aquí"
        );
    }

    #[test]
    fn gate_passes_structured_reply_through() {
        let reply = "1) Resumen claro del trabajo 2) Buen ritmo y entonación 3) Practica las señales";
        assert_eq!(gate_reply(reply), reply);
    }

    #[test]
    fn gate_replaces_short_or_unstructured_replies() {
        assert_eq!(gate_reply("1"), FALLBACK_REPLY);
        assert_eq!(
            gate_reply("Una respuesta larga pero sin la estructura de puntos que el tutor pide"),
            FALLBACK_REPLY
        );
    }

    #[test]
    fn gate_minimum_length_counts_characters_not_bytes() {
        // Accent-heavy Spanish: short in characters, long in UTF-8 bytes.
        let short = "2) ¡Qué bien! Más ánimo, sí, así tú";
        assert!(short.chars().count() < MIN_REPLY_LEN);
        assert!(short.len() >= MIN_REPLY_LEN);
        assert_eq!(gate_reply(short), FALLBACK_REPLY);
    }

    #[test]
    fn prompt_embeds_score_and_lists() {
        let summary = ModuleSummary {
            module_name: "Señales DOT".into(),
            student_name: Some("Carlos".into()),
            score: 85,
            strengths: vec!["Buena pronunciación".into()],
            mistakes: vec![],
        };
        let prompt = build_prompt(&summary);
        assert!(prompt.contains("Estudiante: Carlos"));
        assert!(prompt.contains("Puntaje final: 85/100"));
        assert!(prompt.contains("- Buena pronunciación"));
        assert!(prompt.contains("- No se registraron errores."));
        assert!(prompt.contains("4) Una recomendación concreta"));
    }

    #[test]
    fn disabled_client_reports_disabled() {
        let client = FeedbackClient::new(None);
        assert!(!client.enabled());
    }
}
