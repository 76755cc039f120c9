use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::lang::Lang;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("content bank '{name}' is empty")]
    EmptyBank { name: String },

    #[error("content bank '{name}' is not valid JSON: {detail}")]
    Malformed { name: String, detail: String },
}

//
// ─── LESSON ITEMS ──────────────────────────────────────────────────────────────
//

/// One inspector/driver phrase exchange from the phrase module.
///
/// Every field except `id` has a fallback so a hand-edited bank entry with a
/// missing key still loads as an (empty-text) card rather than failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseCard {
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub inspector_en: String,
    #[serde(default)]
    pub inspector_es: String,
    #[serde(default)]
    pub inspector_es_phonetics: Option<String>,
    #[serde(default)]
    pub driver_en: String,
    #[serde(default)]
    pub driver_es: String,
    #[serde(default)]
    pub driver_es_phonetics: Option<String>,
    #[serde(default)]
    pub scene_en: String,
    #[serde(default)]
    pub scene_es: String,
}

/// One inspector hand signal / traffic signal from the signals module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub name_es: String,
    #[serde(default)]
    pub action_en: String,
    #[serde(default)]
    pub action_es: String,
}

/// One turn in a roleplay script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "speaker", rename_all = "lowercase")]
pub enum RoleplayStep {
    Inspector {
        #[serde(default)]
        en: String,
        #[serde(default)]
        es: String,
    },
    Driver {
        #[serde(default)]
        expected_en: String,
        #[serde(default)]
        expected_es: String,
        #[serde(default)]
        phonetics_es: Option<String>,
    },
}

/// A scripted inspection dialogue the student completes turn by turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roleplay {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lang: Lang,
    #[serde(default)]
    pub steps: Vec<RoleplayStep>,
}

impl Roleplay {
    /// Expected driver line for a step, in the requested language.
    #[must_use]
    pub fn expected_line(&self, step: usize, lang: Lang) -> Option<&str> {
        match self.steps.get(step)? {
            RoleplayStep::Driver {
                expected_en,
                expected_es,
                ..
            } => Some(match lang {
                Lang::En => expected_en.as_str(),
                Lang::Es => expected_es.as_str(),
            }),
            RoleplayStep::Inspector { .. } => None,
        }
    }
}

//
// ─── EXAM QUESTIONS ────────────────────────────────────────────────────────────
//

/// One exam question. Banks tag each entry with a `type` string; anything
/// unknown degrades to a multiple-choice translation question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    TranslationMc {
        id: String,
        question: String,
        options: Vec<String>,
        correct_index: usize,
    },
    AudioMc {
        id: String,
        prompt: String,
        audio_text: String,
        options: Vec<String>,
        correct_index: usize,
    },
    Fill {
        id: String,
        question: String,
        answer: String,
    },
    Order {
        id: String,
        question: String,
        chunks: Vec<String>,
        answer: Vec<String>,
    },
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Question::TranslationMc { id, .. }
            | Question::AudioMc { id, .. }
            | Question::Fill { id, .. }
            | Question::Order { id, .. } => id,
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn string_vec(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn correct_index(value: &Value) -> usize {
    value
        .get("correctIndex")
        .or_else(|| value.get("correct_index"))
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn normalize_question(raw: &Value, index: usize) -> Question {
    let id = str_field(raw, "id").unwrap_or_else(|| format!("q-{}", index + 1));
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or("translation_mc");

    match kind {
        "audio_mc" => Question::AudioMc {
            id,
            prompt: str_field(raw, "prompt").unwrap_or_else(|| {
                "Escucha el audio y selecciona la respuesta correcta.".to_owned()
            }),
            audio_text: str_field(raw, "audioText")
                .or_else(|| str_field(raw, "audio_text"))
                .or_else(|| str_field(raw, "text"))
                .unwrap_or_default(),
            options: string_vec(raw, "options"),
            correct_index: correct_index(raw),
        },
        "fill" => Question::Fill {
            id,
            question: str_field(raw, "question").unwrap_or_default(),
            answer: str_field(raw, "answer").unwrap_or_default(),
        },
        "order" => Question::Order {
            id,
            question: str_field(raw, "question").unwrap_or_default(),
            chunks: string_vec(raw, "chunks"),
            answer: string_vec(raw, "answer"),
        },
        _ => Question::TranslationMc {
            id,
            question: str_field(raw, "question")
                .or_else(|| str_field(raw, "text"))
                .unwrap_or_default(),
            options: string_vec(raw, "options"),
            correct_index: correct_index(raw),
        },
    }
}

/// Normalizes a raw question bank into typed questions.
///
/// Accepts either a bare array or an object with a `questions` array, and
/// never fails on missing fields: each one gets its documented fallback.
#[must_use]
pub fn normalize_questions(raw: &Value) -> Vec<Question> {
    let entries = match raw {
        Value::Array(arr) => arr.as_slice(),
        Value::Object(_) => raw
            .get("questions")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice),
        _ => &[],
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, q)| normalize_question(q, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_id_and_type_fall_back() {
        let raw = json!([{ "question": "What does STOP mean?", "options": ["Pare", "Siga"] }]);
        let qs = normalize_questions(&raw);
        assert_eq!(qs.len(), 1);
        match &qs[0] {
            Question::TranslationMc {
                id,
                question,
                options,
                correct_index,
            } => {
                assert_eq!(id, "q-1");
                assert_eq!(question, "What does STOP mean?");
                assert_eq!(options.len(), 2);
                assert_eq!(*correct_index, 0);
            }
            other => panic!("expected translation_mc, got {other:?}"),
        }
    }

    #[test]
    fn wrapped_questions_object_is_accepted() {
        let raw = json!({ "questions": [{ "id": "f1", "type": "fill", "question": "I ___ a license", "answer": "have" }] });
        let qs = normalize_questions(&raw);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].id(), "f1");
    }

    #[test]
    fn audio_mc_accepts_legacy_text_key() {
        let raw = json!([{ "type": "audio_mc", "text": "Pull over", "options": ["a", "b"], "correctIndex": 1 }]);
        match &normalize_questions(&raw)[0] {
            Question::AudioMc {
                audio_text,
                correct_index,
                prompt,
                ..
            } => {
                assert_eq!(audio_text, "Pull over");
                assert_eq!(*correct_index, 1);
                assert!(prompt.starts_with("Escucha"));
            }
            other => panic!("expected audio_mc, got {other:?}"),
        }
    }

    #[test]
    fn roleplay_step_tags_on_speaker() {
        let raw = json!({
            "id": "rp1",
            "title": "Routine stop",
            "lang": "en",
            "steps": [
                { "speaker": "inspector", "en": "License please", "es": "Licencia por favor" },
                { "speaker": "driver", "expected_en": "Here you go", "expected_es": "Aquí tiene" }
            ]
        });
        let rp: Roleplay = serde_json::from_value(raw).unwrap();
        assert_eq!(rp.steps.len(), 2);
        assert_eq!(rp.expected_line(0, Lang::En), None);
        assert_eq!(rp.expected_line(1, Lang::En), Some("Here you go"));
        assert_eq!(rp.expected_line(1, Lang::Es), Some("Aquí tiene"));
    }

    #[test]
    fn phrase_card_tolerates_missing_fields() {
        let card: PhraseCard = serde_json::from_value(json!({ "id": "p1" })).unwrap();
        assert!(card.inspector_en.is_empty());
        assert!(card.driver_es_phonetics.is_none());
    }
}
