//! Players joining and presence
//!
//! Players are scoped to one session, join by name (or draw a random
//! nickname), and are never hard-deleted while the session lives. Activity
//! timestamps feed the inactivity sweeper.

use super::AppState;
use crate::engine::normalize;
use crate::protocol::ServerMessage;
use crate::types::{Player, PlayerId, SessionId, SessionState};

const MAX_PLAYERS_PER_SESSION: usize = 30;
const MAX_NAME_CHARS: usize = 24;
const NICKNAME_ATTEMPTS: usize = 10;

impl AppState {
    /// Join a session as a new player. Names are unique per session,
    /// compared case-insensitively on trimmed text; an omitted name draws a
    /// random two-word nickname.
    pub async fn join_session(
        &self,
        session_id: &SessionId,
        name: Option<String>,
    ) -> Result<Player, String> {
        let session = self
            .get_session(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {}", session_id))?;

        match session.state {
            SessionState::Waiting => {}
            SessionState::Question | SessionState::Result => {
                if !session.settings.allow_late_join {
                    return Err("Session has already started".to_string());
                }
            }
            SessionState::Ended => {
                return Err("Session has already ended".to_string());
            }
        }

        let mut players = self.players.write().await;

        let seats_taken = players
            .values()
            .filter(|p| &p.session_id == session_id)
            .count();
        if seats_taken >= MAX_PLAYERS_PER_SESSION {
            return Err("Session is full".to_string());
        }

        let taken: Vec<String> = players
            .values()
            .filter(|p| &p.session_id == session_id)
            .map(|p| normalize(&p.name))
            .collect();

        let name = match name {
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err("Name must not be empty".to_string());
                }
                if trimmed.chars().count() > MAX_NAME_CHARS {
                    return Err(format!("Name is limited to {} characters", MAX_NAME_CHARS));
                }
                if taken.contains(&normalize(trimmed)) {
                    return Err(format!("The name '{}' is already taken", trimmed));
                }
                trimmed.to_string()
            }
            None => {
                let mut picked = None;
                for _ in 0..NICKNAME_ATTEMPTS {
                    let candidate = petname::petname(2, "-")
                        .ok_or_else(|| "Could not generate a nickname".to_string())?;
                    if !taken.contains(&normalize(&candidate)) {
                        picked = Some(candidate);
                        break;
                    }
                }
                picked.ok_or_else(|| "Could not find a free nickname".to_string())?
            }
        };

        let now = chrono::Utc::now().to_rfc3339();
        let player = Player {
            id: ulid::Ulid::new().to_string(),
            session_id: session_id.clone(),
            name,
            score: 0,
            is_active: true,
            joined_at: now.clone(),
            last_active_at: now,
        };

        players.insert(player.id.clone(), player.clone());
        drop(players);

        tracing::info!(
            "Player {} ('{}') joined session {}",
            player.id,
            player.name,
            session_id
        );
        self.broadcast_change(ServerMessage::PlayerUpserted {
            player: player.clone(),
        });
        Ok(player)
    }

    pub async fn get_player(&self, id: &PlayerId) -> Option<Player> {
        self.players.read().await.get(id).cloned()
    }

    /// Players of a session in join order.
    pub async fn players_in_session(&self, session_id: &SessionId) -> Vec<Player> {
        let players = self.players.read().await;
        let mut list: Vec<Player> = players
            .values()
            .filter(|p| &p.session_id == session_id)
            .cloned()
            .collect();
        drop(players);
        list.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        list
    }

    /// Refresh a player's activity timestamp. Re-activates a player the
    /// sweeper had marked inactive, broadcasting the flip.
    pub async fn touch_player(&self, player_id: &PlayerId) {
        let mut players = self.players.write().await;
        let Some(player) = players.get_mut(player_id) else {
            return;
        };
        player.last_active_at = chrono::Utc::now().to_rfc3339();
        let reactivated = if !player.is_active {
            player.is_active = true;
            Some(player.clone())
        } else {
            None
        };
        drop(players);

        if let Some(player) = reactivated {
            tracing::debug!("Player {} is active again", player.id);
            self.broadcast_change(ServerMessage::PlayerUpserted { player });
        }
    }

    /// Mark players silent for longer than `idle_secs` as inactive and
    /// broadcast each flip. Returns the players that changed.
    pub async fn sweep_inactive(&self, idle_secs: i64) -> Vec<Player> {
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(idle_secs);

        let mut flipped = Vec::new();
        let mut players = self.players.write().await;
        for player in players.values_mut() {
            if !player.is_active {
                continue;
            }
            let Ok(last_active) = chrono::DateTime::parse_from_rfc3339(&player.last_active_at)
            else {
                continue;
            };
            if last_active.with_timezone(&chrono::Utc) < cutoff {
                player.is_active = false;
                flipped.push(player.clone());
            }
        }
        drop(players);

        for player in &flipped {
            tracing::debug!("Player {} marked inactive", player.id);
            self.broadcast_change(ServerMessage::PlayerUpserted {
                player: player.clone(),
            });
        }
        flipped
    }
}
