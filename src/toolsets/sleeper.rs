//! Sleeper fantasy football tools.
//!
//! Every tool answers with a text block. Failed requests and empty listings
//! become explanatory text rather than errors, so a model can keep going.

use super::{field, field_or, http_client, parse_call};
use crate::config::SleeperSettings;
use crate::dispatch::{Arguments, Metadata, Tool};
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Picks listed before the remainder is summarized.
const MAX_LISTED_PICKS: usize = 20;

/// Shared HTTP access to the Sleeper API.
pub struct SleeperApi {
    http: reqwest::Client,
    base_url: Url,
    league_id: String,
    season: String,
}

impl SleeperApi {
    pub fn from_settings(settings: &SleeperSettings) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            http: http_client(settings.timeout_secs)?,
            base_url: Url::parse(&settings.base_url).map_err(|e| {
                HuddleError::Config(format!("Invalid Sleeper URL {}: {}", settings.base_url, e))
            })?,
            league_id: settings.league_id.clone(),
            season: settings.season.clone(),
        }))
    }

    /// One tool per endpoint.
    pub fn tools<D: Send + Sync + 'static>(self: Arc<Self>) -> Vec<Arc<dyn Tool<D>>> {
        Endpoint::ALL
            .into_iter()
            .map(|endpoint| {
                Arc::new(SleeperTool {
                    endpoint,
                    api: Arc::clone(&self),
                }) as Arc<dyn Tool<D>>
            })
            .collect()
    }

    /// GET the path made of `segments` below the base URL. Each segment is
    /// escaped, so ids cannot change the path. Any failure yields `None`.
    async fn get(&self, segments: &[&str], query: &[(&str, String)]) -> Option<Value> {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(_) => return None,
        }
        let result: reqwest::Result<Value> = async {
            self.http
                .get(url.clone())
                .query(query)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Sleeper request to {} failed: {}", url, e);
                None
            }
        }
    }

    async fn execute(&self, call: SleeperCall) -> String {
        match call {
            SleeperCall::GetUser { username } => match self.get(&["user", &username], &[]).await {
                Some(data) if data.is_object() => format_user(&data),
                _ => format!("Unable to fetch user information for username: {}", username),
            },

            SleeperCall::GetUserLeagues { user_id, sport, season } => {
                let sport = sport.unwrap_or_else(|| "nfl".to_string());
                let season = season.unwrap_or_else(|| self.season.clone());
                let data = self
                    .get(&["user", &user_id, "leagues", &sport, &season], &[])
                    .await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!("Unable to fetch leagues for user_id: {}", user_id),
                    Some(leagues) if leagues.is_empty() => format!(
                        "No leagues found for user_id: {} in {} {}",
                        user_id, sport, season
                    ),
                    Some(leagues) => join_blocks(leagues.iter().map(format_league_summary)),
                }
            }

            SleeperCall::GetLeague { league_id } => {
                let league_id = league_id.unwrap_or_else(|| self.league_id.clone());
                match self.get(&["league", &league_id], &[]).await {
                    Some(data) if data.is_object() => format_league(&data),
                    _ => format!(
                        "Unable to fetch league information for league_id: {}",
                        league_id
                    ),
                }
            }

            SleeperCall::GetLeagueRosters { league_id } => {
                let league_id = league_id.unwrap_or_else(|| self.league_id.clone());
                let data = self.get(&["league", &league_id, "rosters"], &[]).await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!("Unable to fetch rosters for league_id: {}", league_id),
                    Some(rosters) if rosters.is_empty() => {
                        format!("No rosters found for league_id: {}", league_id)
                    }
                    Some(rosters) => join_blocks(rosters.iter().map(format_roster)),
                }
            }

            SleeperCall::GetLeagueUsers { league_id } => {
                let league_id = league_id.unwrap_or_else(|| self.league_id.clone());
                let data = self.get(&["league", &league_id, "users"], &[]).await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!("Unable to fetch users for league_id: {}", league_id),
                    Some(users) if users.is_empty() => {
                        format!("No users found for league_id: {}", league_id)
                    }
                    Some(users) => join_blocks(users.iter().map(format_league_user)),
                }
            }

            SleeperCall::GetMatchups { league_id, week } => {
                let league_id = league_id.unwrap_or_else(|| self.league_id.clone());
                let week = week.unwrap_or(9);
                let data = self
                    .get(&["league", &league_id, "matchups", &week.to_string()], &[])
                    .await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!(
                        "Unable to fetch matchups for league_id: {}, week: {}",
                        league_id, week
                    ),
                    Some(entries) if entries.is_empty() => format!(
                        "No matchups found for league_id: {}, week: {}",
                        league_id, week
                    ),
                    Some(entries) => format_matchups(entries),
                }
            }

            SleeperCall::GetUserDrafts { user_id, sport, season } => {
                let sport = sport.unwrap_or_else(|| "nfl".to_string());
                let season = season.unwrap_or_else(|| self.season.clone());
                let data = self
                    .get(&["user", &user_id, "drafts", &sport, &season], &[])
                    .await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!("Unable to fetch drafts for user_id: {}", user_id),
                    Some(drafts) if drafts.is_empty() => format!(
                        "No drafts found for user_id: {} in {} {}",
                        user_id, sport, season
                    ),
                    Some(drafts) => join_blocks(drafts.iter().map(format_draft_summary)),
                }
            }

            SleeperCall::GetDraft { draft_id } => {
                match self.get(&["draft", &draft_id], &[]).await {
                    Some(data) if data.is_object() => format_draft(&data),
                    _ => format!(
                        "Unable to fetch draft information for draft_id: {}",
                        draft_id
                    ),
                }
            }

            SleeperCall::GetDraftPicks { draft_id } => {
                let data = self.get(&["draft", &draft_id, "picks"], &[]).await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!("Unable to fetch picks for draft_id: {}", draft_id),
                    Some(picks) if picks.is_empty() => {
                        format!("No picks found for draft_id: {}", draft_id)
                    }
                    Some(picks) => format_draft_picks(picks),
                }
            }

            SleeperCall::GetTrendingPlayers {
                sport,
                trend_type,
                lookback_hours,
                limit,
            } => {
                let sport = sport.unwrap_or_else(|| "nfl".to_string());
                let trend_type = trend_type.unwrap_or_else(|| "add".to_string());
                let lookback_hours = lookback_hours.unwrap_or(24);
                let limit = limit.unwrap_or(25);
                let query = [
                    ("lookback_hours", lookback_hours.to_string()),
                    ("limit", limit.to_string()),
                ];
                let data = self
                    .get(&["players", &sport, "trending", &trend_type], &query)
                    .await;
                match data.as_ref().and_then(Value::as_array) {
                    None => format!("Unable to fetch trending {} players", trend_type),
                    Some(players) if players.is_empty() => {
                        format!("No trending {} players found", trend_type)
                    }
                    Some(players) => format_trending(players, &trend_type, lookback_hours, limit),
                }
            }

            SleeperCall::GetAllPlayers { sport } => {
                let sport = sport.unwrap_or_else(|| "nfl".to_string());
                let data = self.get(&["players", &sport], &[]).await;
                match data.as_ref().and_then(Value::as_object) {
                    None => format!("Unable to fetch players for sport: {}", sport),
                    Some(players) if players.is_empty() => {
                        format!("No players found for sport: {}", sport)
                    }
                    Some(players) => format_players(players),
                }
            }

            SleeperCall::GetNflState => match self.get(&["state", "nfl"], &[]).await {
                Some(data) if data.is_object() => format_nfl_state(&data),
                _ => "Unable to fetch NFL state information".to_string(),
            },
        }
    }
}

/// Typed arguments of every Sleeper tool, tagged by tool name.
#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
enum SleeperCall {
    GetUser {
        username: String,
    },
    GetUserLeagues {
        user_id: String,
        sport: Option<String>,
        season: Option<String>,
    },
    GetLeague {
        league_id: Option<String>,
    },
    GetLeagueRosters {
        league_id: Option<String>,
    },
    GetLeagueUsers {
        league_id: Option<String>,
    },
    GetMatchups {
        league_id: Option<String>,
        week: Option<u32>,
    },
    GetUserDrafts {
        user_id: String,
        sport: Option<String>,
        season: Option<String>,
    },
    GetDraft {
        draft_id: String,
    },
    GetDraftPicks {
        draft_id: String,
    },
    GetTrendingPlayers {
        sport: Option<String>,
        trend_type: Option<String>,
        lookback_hours: Option<u32>,
        limit: Option<u32>,
    },
    GetAllPlayers {
        sport: Option<String>,
    },
    GetNflState,
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    GetUser,
    GetUserLeagues,
    GetLeague,
    GetLeagueRosters,
    GetLeagueUsers,
    GetMatchups,
    GetUserDrafts,
    GetDraft,
    GetDraftPicks,
    GetTrendingPlayers,
    GetAllPlayers,
    GetNflState,
}

impl Endpoint {
    const ALL: [Endpoint; 12] = [
        Endpoint::GetUser,
        Endpoint::GetUserLeagues,
        Endpoint::GetLeague,
        Endpoint::GetLeagueRosters,
        Endpoint::GetLeagueUsers,
        Endpoint::GetMatchups,
        Endpoint::GetUserDrafts,
        Endpoint::GetDraft,
        Endpoint::GetDraftPicks,
        Endpoint::GetTrendingPlayers,
        Endpoint::GetAllPlayers,
        Endpoint::GetNflState,
    ];

    fn name(&self) -> &'static str {
        match self {
            Endpoint::GetUser => "get_user",
            Endpoint::GetUserLeagues => "get_user_leagues",
            Endpoint::GetLeague => "get_league",
            Endpoint::GetLeagueRosters => "get_league_rosters",
            Endpoint::GetLeagueUsers => "get_league_users",
            Endpoint::GetMatchups => "get_matchups",
            Endpoint::GetUserDrafts => "get_user_drafts",
            Endpoint::GetDraft => "get_draft",
            Endpoint::GetDraftPicks => "get_draft_picks",
            Endpoint::GetTrendingPlayers => "get_trending_players",
            Endpoint::GetAllPlayers => "get_all_players",
            Endpoint::GetNflState => "get_nfl_state",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Endpoint::GetUser => "Get Sleeper user information by username.",
            Endpoint::GetUserLeagues => {
                "Get all Sleeper leagues for a user in a specific sport and season."
            }
            Endpoint::GetLeague => "Get detailed information about a specific Sleeper league.",
            Endpoint::GetLeagueRosters => "Get all rosters in a Sleeper league.",
            Endpoint::GetLeagueUsers => "Get all users in a Sleeper league.",
            Endpoint::GetMatchups => "Get matchups for a specific week in a Sleeper league.",
            Endpoint::GetUserDrafts => {
                "Get all Sleeper drafts for a user in a specific sport and season."
            }
            Endpoint::GetDraft => "Get detailed information about a specific Sleeper draft.",
            Endpoint::GetDraftPicks => "Get all picks in a Sleeper draft.",
            Endpoint::GetTrendingPlayers => {
                "Get trending players on Sleeper based on add or drop activity."
            }
            Endpoint::GetAllPlayers => "Get all players for a sport on Sleeper.",
            Endpoint::GetNflState => {
                "Get the current state of the NFL season from Sleeper (current week, season type, etc.)."
            }
        }
    }

    fn input_schema(&self) -> Value {
        let league_id = json!({ "type": "string", "description": "The ID of the league. Defaults to the configured league." });
        let sport = json!({ "type": "string", "description": "The sport (default: \"nfl\")." });
        let season = json!({ "type": "string", "description": "The season year. Defaults to the configured season." });

        let (properties, required): (Value, Vec<&str>) = match self {
            Endpoint::GetUser => (
                json!({ "username": { "type": "string", "description": "The username of the Sleeper user to look up." } }),
                vec!["username"],
            ),
            Endpoint::GetUserLeagues | Endpoint::GetUserDrafts => (
                json!({
                    "user_id": { "type": "string", "description": "The Sleeper user ID." },
                    "sport": sport,
                    "season": season,
                }),
                vec!["user_id"],
            ),
            Endpoint::GetLeague | Endpoint::GetLeagueRosters | Endpoint::GetLeagueUsers => {
                (json!({ "league_id": league_id }), vec![])
            }
            Endpoint::GetMatchups => (
                json!({
                    "league_id": league_id,
                    "week": { "type": "integer", "description": "The week number (1-18 for regular season).", "default": 9 },
                }),
                vec![],
            ),
            Endpoint::GetDraft | Endpoint::GetDraftPicks => (
                json!({ "draft_id": { "type": "string", "description": "The ID of the draft." } }),
                vec!["draft_id"],
            ),
            Endpoint::GetTrendingPlayers => (
                json!({
                    "sport": sport,
                    "trend_type": { "type": "string", "enum": ["add", "drop"], "default": "add" },
                    "lookback_hours": { "type": "integer", "description": "Number of hours to look back.", "default": 24 },
                    "limit": { "type": "integer", "description": "Number of results.", "default": 25 },
                }),
                vec![],
            ),
            Endpoint::GetAllPlayers => (json!({ "sport": sport }), vec![]),
            Endpoint::GetNflState => (json!({}), vec![]),
        };

        json!({ "type": "object", "properties": properties, "required": required })
    }
}

struct SleeperTool {
    endpoint: Endpoint,
    api: Arc<SleeperApi>,
}

#[async_trait]
impl<D: Send + Sync + 'static> Tool<D> for SleeperTool {
    fn name(&self) -> &str {
        self.endpoint.name()
    }

    fn description(&self) -> &str {
        self.endpoint.description()
    }

    fn input_schema(&self) -> Value {
        self.endpoint.input_schema()
    }

    async fn call(&self, args: Arguments, _meta: &Metadata<D>) -> Result<Value> {
        let call: SleeperCall = parse_call(self.endpoint.name(), args)?;
        Ok(Value::String(self.api.execute(call).await))
    }
}

fn join_blocks<I: Iterator<Item = String>>(blocks: I) -> String {
    blocks.collect::<Vec<_>>().join("\n---\n")
}

fn nested<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

fn format_user(user: &Value) -> String {
    format!(
        "\nUser ID: {}\nUsername: {}\nDisplay Name: {}\nAvatar ID: {}\n",
        field(user, "user_id"),
        field(user, "username"),
        field(user, "display_name"),
        field(user, "avatar"),
    )
}

fn format_league_summary(league: &Value) -> String {
    format!(
        "\nLeague Name: {}\nLeague ID: {}\nStatus: {}\nTotal Rosters: {}\nSeason: {}\nDraft ID: {}\n",
        field_or(league, "name", "Unknown"),
        field(league, "league_id"),
        field(league, "status"),
        field(league, "total_rosters"),
        field(league, "season"),
        field(league, "draft_id"),
    )
}

fn format_league(league: &Value) -> String {
    format!(
        "\nLeague Name: {}\nLeague ID: {}\nStatus: {}\nSport: {}\nSeason: {}\nSeason Type: {}\nTotal Rosters: {}\nDraft ID: {}\nPrevious League ID: {}\n",
        field_or(league, "name", "Unknown"),
        field(league, "league_id"),
        field(league, "status"),
        field(league, "sport"),
        field(league, "season"),
        field(league, "season_type"),
        field(league, "total_rosters"),
        field(league, "draft_id"),
        field(league, "previous_league_id"),
    )
}

fn format_roster(roster: &Value) -> String {
    let settings = nested(roster, "settings");
    let players = roster
        .get("players")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    format!(
        "\nRoster ID: {}\nOwner ID: {}\nWins: {}\nLosses: {}\nTies: {}\nPoints For: {}.{}\nPoints Against: {}.{}\nTotal Moves: {}\nWaiver Position: {}\nPlayer Count: {}\n",
        field(roster, "roster_id"),
        field(roster, "owner_id"),
        field_or(settings, "wins", "0"),
        field_or(settings, "losses", "0"),
        field_or(settings, "ties", "0"),
        field_or(settings, "fpts", "0"),
        field_or(settings, "fpts_decimal", "0"),
        field_or(settings, "fpts_against", "0"),
        field_or(settings, "fpts_against_decimal", "0"),
        field_or(settings, "total_moves", "0"),
        field(settings, "waiver_position"),
        players,
    )
}

fn format_league_user(user: &Value) -> String {
    let is_owner = user.get("is_owner").and_then(Value::as_bool).unwrap_or(false);
    format!(
        "\nUser ID: {}\nUsername: {}\nDisplay Name: {}\nTeam Name: {}\nIs Commissioner: {}\n",
        field(user, "user_id"),
        field(user, "username"),
        field(user, "display_name"),
        field(nested(user, "metadata"), "team_name"),
        is_owner,
    )
}

/// Group entries by `matchup_id`, keeping first-seen order. Entries without
/// an id are skipped.
fn format_matchups(entries: &[Value]) -> String {
    let mut groups: Vec<(String, Vec<&Value>)> = Vec::new();
    for entry in entries {
        let Some(id) = entry.get("matchup_id").filter(|v| !v.is_null()) else {
            continue;
        };
        let id = id.to_string();
        match groups.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, teams)) => teams.push(entry),
            None => groups.push((id, vec![entry])),
        }
    }

    groups
        .into_iter()
        .map(|(id, teams)| {
            let mut block = format!("Matchup {}:\n", id);
            for team in teams {
                block.push_str(&format!(
                    "  Roster ID: {}, Points: {}\n",
                    field(team, "roster_id"),
                    field_or(team, "points", "0"),
                ));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_draft_summary(draft: &Value) -> String {
    format!(
        "\nDraft ID: {}\nStatus: {}\nType: {}\nSeason: {}\nLeague ID: {}\n",
        field(draft, "draft_id"),
        field(draft, "status"),
        field(draft, "type"),
        field(draft, "season"),
        field(draft, "league_id"),
    )
}

fn format_draft(draft: &Value) -> String {
    let settings = nested(draft, "settings");
    format!(
        "\nDraft ID: {}\nStatus: {}\nType: {}\nSeason: {}\nLeague ID: {}\nSport: {}\nSettings:\n  Rounds: {}\n  Teams: {}\n",
        field(draft, "draft_id"),
        field(draft, "status"),
        field(draft, "type"),
        field(draft, "season"),
        field(draft, "league_id"),
        field(draft, "sport"),
        field(settings, "rounds"),
        field(settings, "teams"),
    )
}

fn format_draft_picks(picks: &[Value]) -> String {
    let mut blocks: Vec<String> = picks
        .iter()
        .take(MAX_LISTED_PICKS)
        .map(|pick| {
            let metadata = nested(pick, "metadata");
            format!(
                "\nPick #{} (Round {}, Slot {}):\n  Player: {} {}\n  Position: {}\n  Team: {}\n  Picked by Roster: {}\n",
                field(pick, "pick_no"),
                field(pick, "round"),
                field(pick, "draft_slot"),
                field_or(metadata, "first_name", ""),
                field_or(metadata, "last_name", "Unknown"),
                field(metadata, "position"),
                field(metadata, "team"),
                field(pick, "roster_id"),
            )
        })
        .collect();

    if picks.len() > MAX_LISTED_PICKS {
        blocks.push(format!(
            "... and {} more picks",
            picks.len() - MAX_LISTED_PICKS
        ));
    }
    blocks.join("\n")
}

fn format_trending(players: &[Value], trend_type: &str, lookback_hours: u32, limit: u32) -> String {
    let mut lines = vec![format!(
        "Top {} Trending {}s (Last {} hours):\n",
        limit,
        title_case(trend_type),
        lookback_hours
    )];
    for (i, player) in players.iter().enumerate() {
        lines.push(format!(
            "{}. Player ID: {}, Count: {}",
            i + 1,
            field(player, "player_id"),
            field_or(player, "count", "0"),
        ));
    }
    lines.join("\n")
}

fn format_players(players: &serde_json::Map<String, Value>) -> String {
    let mut blocks = vec![format!("Total Players: {}\n", players.len())];
    for (player_id, player) in players {
        blocks.push(format!(
            "\nPlayer ID: {}\nName: {} {}\nPosition: {}\nTeam: {}\nNumber: {}\nStatus: {}\nCollege: {}\nYears Experience: {}\n",
            player_id,
            field_or(player, "first_name", ""),
            field_or(player, "last_name", "Unknown"),
            field(player, "position"),
            field(player, "team"),
            field(player, "number"),
            field(player, "status"),
            field(player, "college"),
            field(player, "years_exp"),
        ));
    }
    blocks.join("\n---\n")
}

fn format_nfl_state(state: &Value) -> String {
    format!(
        "\nSeason: {}\nSeason Type: {}\nWeek: {}\nLeague Season: {}\nLeague Create Season: {}\nDisplay Week: {}\n",
        field(state, "season"),
        field(state, "season_type"),
        field(state, "week"),
        field(state, "league_season"),
        field(state, "league_create_season"),
        field(state, "display_week"),
    )
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    /// Serve a fake Sleeper API on an ephemeral port.
    async fn fake_sleeper() -> Arc<SleeperApi> {
        let app = Router::new()
            .route(
                "/user/{username}",
                get(|Path(username): Path<String>| async move {
                    if username == "ghost" {
                        Err(StatusCode::NOT_FOUND)
                    } else {
                        Ok(Json(json!({
                            "user_id": "u1", "username": username,
                            "display_name": "Coach", "avatar": null
                        })))
                    }
                }),
            )
            .route(
                "/league/{id}/rosters",
                get(|| async { Json(json!([])) }),
            )
            .route(
                "/draft/{id}/picks",
                get(|| async {
                    let picks: Vec<Value> = (1..=23)
                        .map(|n| json!({
                            "pick_no": n, "round": 1 + (n - 1) / 12, "draft_slot": 1 + (n - 1) % 12,
                            "roster_id": 3,
                            "metadata": { "first_name": "Player", "last_name": format!("{}", n), "position": "WR", "team": "KC" }
                        }))
                        .collect();
                    Json(Value::Array(picks))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        SleeperApi::from_settings(&SleeperSettings {
            base_url: format!("http://{}", addr),
            ..SleeperSettings::default()
        })
        .unwrap()
    }

    fn tool(api: &Arc<SleeperApi>, name: &str) -> Arc<dyn Tool<()>> {
        Arc::clone(api)
            .tools::<()>()
            .into_iter()
            .find(|t| t.name() == name)
            .unwrap()
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_get_user_formats_fields() {
        let api = fake_sleeper().await;
        let meta = Metadata::new(Arc::new(()));
        let out = tool(&api, "get_user")
            .call(args(json!({ "username": "coach" })), &meta)
            .await
            .unwrap();

        let text = out.as_str().unwrap();
        assert!(text.contains("User ID: u1"));
        assert!(text.contains("Display Name: Coach"));
        assert!(text.contains("Avatar ID: N/A"));
    }

    #[tokio::test]
    async fn test_failed_request_becomes_text() {
        let api = fake_sleeper().await;
        let meta = Metadata::new(Arc::new(()));
        let out = tool(&api, "get_user")
            .call(args(json!({ "username": "ghost" })), &meta)
            .await
            .unwrap();
        assert_eq!(out, "Unable to fetch user information for username: ghost");
    }

    #[tokio::test]
    async fn test_ids_stay_inside_their_path_segment() {
        let api = fake_sleeper().await;
        let meta = Metadata::new(Arc::new(()));
        let out = tool(&api, "get_user")
            .call(args(json!({ "username": "a/../x" })), &meta)
            .await
            .unwrap();
        assert!(out.as_str().unwrap().contains("Username: a/../x"));
    }

    #[tokio::test]
    async fn test_empty_rosters_use_default_league() {
        let api = fake_sleeper().await;
        let meta = Metadata::new(Arc::new(()));
        let out = tool(&api, "get_league_rosters")
            .call(Arguments::new(), &meta)
            .await
            .unwrap();
        assert_eq!(out, "No rosters found for league_id: 1182861335834730496");
    }

    #[tokio::test]
    async fn test_draft_picks_are_capped() {
        let api = fake_sleeper().await;
        let meta = Metadata::new(Arc::new(()));
        let out = tool(&api, "get_draft_picks")
            .call(args(json!({ "draft_id": "d1" })), &meta)
            .await
            .unwrap();

        let text = out.as_str().unwrap();
        assert!(text.contains("Pick #20 (Round 2, Slot 8)"));
        assert!(!text.contains("Pick #21"));
        assert!(text.ends_with("... and 3 more picks"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_an_error() {
        let api = fake_sleeper().await;
        let meta = Metadata::new(Arc::new(()));
        let err = tool(&api, "get_draft")
            .call(Arguments::new(), &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::HuddleError::InvalidArguments(_)));
    }

    #[test]
    fn test_matchups_group_in_first_seen_order() {
        let entries = vec![
            json!({ "matchup_id": 2, "roster_id": 1, "points": 101.5 }),
            json!({ "matchup_id": 1, "roster_id": 2, "points": 88 }),
            json!({ "matchup_id": 2, "roster_id": 3, "points": 97.25 }),
            json!({ "matchup_id": null, "roster_id": 4 }),
        ];

        let text = format_matchups(&entries);
        assert_eq!(
            text,
            "Matchup 2:\n  Roster ID: 1, Points: 101.5\n  Roster ID: 3, Points: 97.25\n\nMatchup 1:\n  Roster ID: 2, Points: 88\n"
        );
    }

    #[test]
    fn test_trending_header() {
        let text = format_trending(&[json!({ "player_id": "4046", "count": 812 })], "drop", 48, 10);
        assert!(text.starts_with("Top 10 Trending Drops (Last 48 hours):\n"));
        assert!(text.ends_with("1. Player ID: 4046, Count: 812"));
    }

    #[test]
    fn test_every_endpoint_has_object_schema() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.input_schema()["type"], "object", "{}", endpoint.name());
        }
    }
}
