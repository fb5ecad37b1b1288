use super::GameSession;
use crate::protocol::ServerMessage;
use crate::store::SCORES_KEY;
use crate::types::*;
use std::collections::{BTreeSet, HashMap};

/// Highest score first; ties keep the configured model order
fn rank(models: &[ModelProfile]) -> Vec<ModelProfile> {
    let mut ranking = models.to_vec();
    ranking.sort_by(|a, b| b.score.cmp(&a.score));
    ranking
}

impl GameSession {
    /// Restore scores from the store. Missing or unreadable data means zero.
    pub async fn load_scores(&self) {
        let saved: HashMap<ModelId, u32> = match self.store.get(SCORES_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Stored scores are corrupt, starting from zero: {}", e);
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                tracing::error!("Failed to read scores: {}", e);
                HashMap::new()
            }
        };

        let mut models = self.models.write().await;
        for model in models.iter_mut() {
            model.score = saved.get(&model.id).copied().unwrap_or(0);
        }
        tracing::info!("Loaded scores for {} models", saved.len());
    }

    async fn persist_scores(&self, models: &[ModelProfile]) {
        let table: HashMap<&str, u32> = models.iter().map(|m| (m.id.as_str(), m.score)).collect();
        match serde_json::to_string(&table) {
            Ok(json) => {
                if let Err(e) = self.store.set(SCORES_KEY, json).await {
                    tracing::error!("Failed to persist scores: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize scores: {}", e),
        }
    }

    /// Give every correct model its points, persist, and push the new ranking
    pub(crate) async fn award_points(&self, correct: &BTreeSet<ModelId>) {
        let ranking = {
            let mut models = self.models.write().await;
            for model in models.iter_mut().filter(|m| correct.contains(&m.id)) {
                model.score += POINTS_PER_CORRECT_GUESS;
                tracing::info!("{} scores, now at {}", model.display_name, model.score);
            }
            self.persist_scores(&models).await;
            rank(&models)
        };
        self.broadcast(ServerMessage::Scores { models: ranking });
    }

    /// Zero every score and forget the persisted table
    pub async fn reset_scores(&self) -> Vec<ModelProfile> {
        let ranking = {
            let mut models = self.models.write().await;
            for model in models.iter_mut() {
                model.score = 0;
            }
            if let Err(e) = self.store.remove(SCORES_KEY).await {
                tracing::error!("Failed to remove stored scores: {}", e);
            }
            rank(&models)
        };
        tracing::info!("Scores reset");
        self.broadcast(ServerMessage::Scores {
            models: ranking.clone(),
        });
        ranking
    }

    /// Models ordered by score
    pub async fn ranking(&self) -> Vec<ModelProfile> {
        rank(&self.models.read().await)
    }
}
