use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Opaque ID types for type safety
pub type RoundId = String;
pub type ModelId = String;

/// Points awarded to each model that guesses the drawing within a round
pub const POINTS_PER_CORRECT_GUESS: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Drawing,
    FinalAnalysis,
    Finished,
}

/// A guessing model as shown in the ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelProfile {
    /// Routing key in `provider:model` form, also the persistence key for the score
    pub id: ModelId,
    pub display_name: String,
    /// CSS color hint for the client
    pub color: String,
    pub score: u32,
}

impl ModelProfile {
    pub fn new(id: &str, display_name: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            color: color.to_string(),
            score: 0,
        }
    }
}

/// Latest answer of one model for the current round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Guess {
    Answer(String),
    /// Visible error marker for a model whose request failed
    Error(String),
}

impl Guess {
    pub fn text(&self) -> &str {
        match self {
            Guess::Answer(text) | Guess::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Guess::Error(_))
    }
}

pub type GuessRecord = HashMap<ModelId, Guess>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub target_phrase: String,
    pub phase: Phase,
    pub has_user_drawn: bool,
    pub has_correct_guess: bool,
    pub guesses: GuessRecord,
    pub correct: BTreeSet<ModelId>,
    pub deadline: Option<String>, // ISO timestamp when the drawing countdown runs out
}

impl Round {
    /// A fresh round waiting for its prompt
    pub fn new() -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            target_phrase: String::new(),
            phase: Phase::Idle,
            has_user_drawn: false,
            has_correct_guess: false,
            guesses: GuessRecord::new(),
            correct: BTreeSet::new(),
            deadline: None,
        }
    }

    /// Drop everything the models said so far (new round or canvas clear)
    pub fn reset_guesses(&mut self) {
        self.guesses.clear();
        self.correct.clear();
        self.has_correct_guess = false;
    }
}

impl Default for Round {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-model guess as displayed in the chat log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessView {
    pub model_id: ModelId,
    pub display_name: String,
    pub color: String,
    pub guess: Guess,
    pub correct: bool,
}

/// Read-only view of the current round for display collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundView {
    pub id: RoundId,
    pub target_phrase: String,
    pub phase: Phase,
    pub drawing_enabled: bool,
    pub has_user_drawn: bool,
    pub has_correct_guess: bool,
    pub guesses: Vec<GuessView>,
    pub correct_models: Vec<ModelId>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub port: u16,
    pub drawing_seconds: u32,
    pub analysis_interval: Duration,
    pub scores_path: String,
    pub max_snapshot_bytes: usize,
    /// Ordered guessing models, fixed for the process lifetime
    pub models: Vec<ModelProfile>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            // 6573 is ascii for "AI"
            port: 6573,
            drawing_seconds: 60,
            analysis_interval: Duration::from_millis(1000),
            scores_path: "scores.json".to_string(),
            max_snapshot_bytes: 2 * 1024 * 1024,
            models: default_models(),
        }
    }
}

impl GameConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let scores_path = std::env::var("SCORES_PATH")
            .ok()
            .and_then(|path| {
                let trimmed = path.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.scores_path);

        let models = std::env::var("GUESS_MODELS")
            .ok()
            .map(|list| parse_model_list(&list))
            .filter(|models| !models.is_empty())
            .unwrap_or(defaults.models);

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            drawing_seconds: env_parse("DRAWING_SECONDS").unwrap_or(defaults.drawing_seconds),
            analysis_interval: env_parse("ANALYSIS_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.analysis_interval),
            scores_path,
            max_snapshot_bytes: env_parse("MAX_SNAPSHOT_BYTES")
                .unwrap_or(defaults.max_snapshot_bytes),
            models,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Colors handed out to models configured without one
const PALETTE: &[&str] = &[
    "#4285F4", "#EA4335", "#FBBC05", "#34A853", "#9C27B0", "#FF9800",
];

/// Parse `GUESS_MODELS`: comma separated `provider:model[=Display Name[=#color]]`
pub fn parse_model_list(list: &str) -> Vec<ModelProfile> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| {
            let mut parts = entry.splitn(3, '=').map(str::trim);
            let id = parts.next().unwrap_or_default();
            let display_name = parts
                .next()
                .filter(|name| !name.is_empty())
                .unwrap_or(id);
            let color = parts
                .next()
                .filter(|color| !color.is_empty())
                .unwrap_or(PALETTE[index % PALETTE.len()]);
            ModelProfile::new(id, display_name, color)
        })
        .collect()
}

pub fn default_models() -> Vec<ModelProfile> {
    vec![
        ModelProfile::new(
            "openrouter:meta-llama/llama-3.2-11b-vision-instruct",
            "Llama 3.2 Vision",
            "#4285F4",
        ),
        ModelProfile::new(
            "openrouter:google/gemini-2.0-flash-001",
            "Gemini 2.0 Flash",
            "#EA4335",
        ),
        ModelProfile::new(
            "openrouter:google/gemini-2.0-flash-lite-001",
            "Gemini 2.0 Flash Lite",
            "#FBBC05",
        ),
        ModelProfile::new(
            "openrouter:microsoft/phi-4-multimodal-instruct",
            "Phi-4 Multimodal",
            "#34A853",
        ),
        ModelProfile::new(
            "openrouter:mistralai/pixtral-12b",
            "Mistral Pixtral-12B",
            "#9C27B0",
        ),
        ModelProfile::new(
            "openrouter:mistralai/mistral-nemo",
            "Mistral Nemo",
            "#FF9800",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_model_list() {
        let models = parse_model_list(
            "openrouter:google/gemini-2.0-flash-001=Gemini=#123456, ollama:llava ,",
        );
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].display_name, "Gemini");
        assert_eq!(models[0].color, "#123456");
        assert_eq!(models[1].id, "ollama:llava");
        assert_eq!(models[1].display_name, "ollama:llava");
        assert_eq!(models[1].color, PALETTE[1]);
        assert!(models.iter().all(|m| m.score == 0));
    }

    #[test]
    fn test_guess_serialization() {
        let json = serde_json::to_string(&Guess::Answer("cat".to_string())).unwrap();
        assert_eq!(json, r#"{"kind":"answer","text":"cat"}"#);
        assert!(Guess::Error("Error: boom".to_string()).is_error());
    }

    #[test]
    fn test_round_reset_guesses_keeps_phrase() {
        let mut round = Round::new();
        round.target_phrase = "sunflower".to_string();
        round.phase = Phase::Drawing;
        round
            .guesses
            .insert("a:b".to_string(), Guess::Answer("flower".to_string()));
        round.correct.insert("a:b".to_string());
        round.has_correct_guess = true;

        round.reset_guesses();
        assert!(round.guesses.is_empty());
        assert!(round.correct.is_empty());
        assert!(!round.has_correct_guess);
        assert_eq!(round.target_phrase, "sunflower");
        assert_eq!(round.phase, Phase::Drawing);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("DRAWING_SECONDS", "30");
        std::env::set_var("ANALYSIS_INTERVAL_MS", "250");
        std::env::set_var("GUESS_MODELS", "ollama:llava=Llava");
        let config = GameConfig::from_env();
        std::env::remove_var("DRAWING_SECONDS");
        std::env::remove_var("ANALYSIS_INTERVAL_MS");
        std::env::remove_var("GUESS_MODELS");

        assert_eq!(config.drawing_seconds, 30);
        assert_eq!(config.analysis_interval, Duration::from_millis(250));
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].display_name, "Llava");
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        std::env::remove_var("GUESS_MODELS");
        let config = GameConfig::from_env();
        assert_eq!(config.models.len(), 6);
        assert_eq!(config.models[0].display_name, "Llama 3.2 Vision");
    }
}
