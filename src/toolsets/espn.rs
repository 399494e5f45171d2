//! ESPN fantasy football tools.
//!
//! Tools return the league API's JSON. Private leagues need the `espn_s2` and
//! `SWID` browser cookies; without them only public leagues can be read.

use super::{http_client, parse_call};
use crate::config::EspnSettings;
use crate::dispatch::{Arguments, Metadata, Tool};
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authentication cookies for private leagues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EspnCookies {
    pub espn_s2: Option<String>,
    pub swid: Option<String>,
}

impl EspnCookies {
    /// `Cookie` header value, present only when both cookies are known.
    fn header(&self) -> Option<String> {
        match (&self.espn_s2, &self.swid) {
            (Some(s2), Some(swid)) => Some(format!("espn_s2={}; SWID={}", s2, swid)),
            _ => None,
        }
    }

    /// Fill unset cookies from `other`.
    fn or(self, other: EspnCookies) -> Self {
        Self {
            espn_s2: self.espn_s2.or(other.espn_s2),
            swid: self.swid.or(other.swid),
        }
    }
}

/// Extract `espn_s2` and `SWID` from a browser cookie string.
pub fn parse_cookie_string(content: &str) -> EspnCookies {
    let s2 = Regex::new(r"espn_s2=([^;\s]+)").expect("Invalid regex");
    let swid = Regex::new(r"SWID=(\{[^}]+\})").expect("Invalid regex");

    EspnCookies {
        espn_s2: s2.captures(content).map(|c| c[1].to_string()),
        swid: swid.captures(content).map(|c| c[1].to_string()),
    }
}

/// Read a cookie string from a file.
pub fn load_cookie_file(path: &Path) -> Result<EspnCookies> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_cookie_string(&content))
}

fn env_cookies() -> EspnCookies {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    EspnCookies {
        espn_s2: var("ESPN_S2"),
        swid: var("ESPN_SWID"),
    }
}

/// Shared HTTP access to one ESPN league.
pub struct EspnApi {
    http: reqwest::Client,
    endpoint: String,
    cookie: Option<HeaderValue>,
}

impl EspnApi {
    /// Resolve cookies from the environment, then settings, then the cookie file.
    pub fn from_settings(settings: &EspnSettings) -> Result<Arc<Self>> {
        let mut cookies = env_cookies().or(EspnCookies {
            espn_s2: settings.espn_s2.clone(),
            swid: settings.swid.clone(),
        });

        if cookies.header().is_none() {
            if let Some(file) = &settings.cookie_file {
                let path = crate::config::Settings::expand_path(file);
                match load_cookie_file(&path) {
                    Ok(from_file) => cookies = cookies.or(from_file),
                    Err(e) => warn!("Could not read ESPN cookie file {:?}: {}", path, e),
                }
            }
        }

        let endpoint = format!(
            "{}/{}/segments/0/leagues/{}",
            settings.base_url.trim_end_matches('/'),
            settings.season,
            settings.league_id
        );
        Self::new(&endpoint, cookies, settings.timeout_secs)
    }

    pub fn new(endpoint: &str, cookies: EspnCookies, timeout_secs: u64) -> Result<Arc<Self>> {
        let cookie = match cookies.header() {
            Some(value) => Some(HeaderValue::from_str(&value).map_err(|e| {
                HuddleError::Config(format!("Invalid ESPN cookie value: {}", e))
            })?),
            None => {
                debug!("No ESPN cookies configured, only public leagues are readable");
                None
            }
        };

        Ok(Arc::new(Self {
            http: http_client(timeout_secs)?,
            endpoint: endpoint.to_string(),
            cookie,
        }))
    }

    /// One tool per league view.
    pub fn tools<D: Send + Sync + 'static>(self: Arc<Self>) -> Vec<Arc<dyn Tool<D>>> {
        View::ALL
            .into_iter()
            .map(|view| {
                Arc::new(EspnTool {
                    view,
                    api: Arc::clone(&self),
                }) as Arc<dyn Tool<D>>
            })
            .collect()
    }

    async fn request(&self, query: &[(&str, String)]) -> Result<Value> {
        let mut request = self
            .http
            .get(&self.endpoint)
            .query(query)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| HuddleError::Upstream(format!("ESPN request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HuddleError::Upstream(format!(
                "ESPN returned {} for {}",
                status, self.endpoint
            )));
        }

        response
            .json()
            .await
            .map_err(|e| HuddleError::Upstream(format!("ESPN returned invalid JSON: {}", e)))
    }

    async fn execute(&self, call: EspnCall) -> Result<Value> {
        match call {
            EspnCall::GetLeagueInfo => self.request(&views(&["mSettings"])).await,

            EspnCall::GetTeams => {
                let data = self.request(&views(&["mTeam"])).await?;
                Ok(take_array(data, "teams"))
            }

            EspnCall::GetRosters { team_id } => {
                let mut query = views(&["mRoster"]);
                push_opt(&mut query, "rosterForTeamId", team_id);
                self.request(&query).await
            }

            EspnCall::GetMatchups { week } => {
                let mut query = views(&["mMatchup"]);
                push_opt(&mut query, "scoringPeriodId", week);
                let data = self.request(&query).await?;
                Ok(take_array(data, "schedule"))
            }

            EspnCall::GetStandings => {
                let data = self.request(&views(&["mTeam"])).await?;
                Ok(sort_standings(take_array(data, "teams")))
            }

            EspnCall::GetPlayerStats { week } => {
                let mut query = views(&["kona_player_info"]);
                push_opt(&mut query, "scoringPeriodId", week);
                self.request(&query).await
            }

            EspnCall::GetAllData { week, team_id } => {
                let mut query = views(&["mTeam", "mRoster", "mMatchup", "mSettings", "mStandings"]);
                push_opt(&mut query, "scoringPeriodId", week);
                push_opt(&mut query, "rosterForTeamId", team_id);
                self.request(&query).await
            }

            EspnCall::GetDetailedData { week, team_id } => {
                let mut query = views(&[
                    "mDraftDetail",
                    "mLiveScoring",
                    "mMatchupScore",
                    "mPendingTransactions",
                    "mPositionalRatings",
                    "mRoster",
                    "mSettings",
                    "mTeam",
                    "modular",
                    "mNav",
                ]);
                push_opt(&mut query, "scoringPeriodId", week);
                push_opt(&mut query, "rosterForTeamId", team_id);
                self.request(&query).await
            }
        }
    }
}

fn views(names: &[&str]) -> Vec<(&'static str, String)> {
    names.iter().map(|v| ("view", v.to_string())).collect()
}

/// Zero and absent both mean "not given".
fn push_opt(query: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<u32>) {
    if let Some(v) = value.filter(|v| *v != 0) {
        query.push((key, v.to_string()));
    }
}

fn take_array(mut data: Value, key: &str) -> Value {
    match data.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => Value::Array(items),
        _ => json!([]),
    }
}

/// Teams by overall wins, then total points, best first.
fn sort_standings(teams: Value) -> Value {
    let Value::Array(mut teams) = teams else {
        return json!([]);
    };

    let wins = |t: &Value| t.pointer("/record/overall/wins").and_then(Value::as_f64).unwrap_or(0.0);
    let points = |t: &Value| t.get("points").and_then(Value::as_f64).unwrap_or(0.0);

    teams.sort_by(|a, b| {
        wins(b)
            .total_cmp(&wins(a))
            .then_with(|| points(b).total_cmp(&points(a)))
    });
    Value::Array(teams)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
enum EspnCall {
    GetLeagueInfo,
    GetTeams,
    GetRosters { team_id: Option<u32> },
    GetMatchups { week: Option<u32> },
    GetStandings,
    GetPlayerStats { week: Option<u32> },
    GetAllData { week: Option<u32>, team_id: Option<u32> },
    GetDetailedData { week: Option<u32>, team_id: Option<u32> },
}

#[derive(Debug, Clone, Copy)]
enum View {
    LeagueInfo,
    Teams,
    Rosters,
    Matchups,
    Standings,
    PlayerStats,
    AllData,
    DetailedData,
}

impl View {
    const ALL: [View; 8] = [
        View::LeagueInfo,
        View::Teams,
        View::Rosters,
        View::Matchups,
        View::Standings,
        View::PlayerStats,
        View::AllData,
        View::DetailedData,
    ];

    fn name(&self) -> &'static str {
        match self {
            View::LeagueInfo => "get_league_info",
            View::Teams => "get_teams",
            View::Rosters => "get_rosters",
            View::Matchups => "get_matchups",
            View::Standings => "get_standings",
            View::PlayerStats => "get_player_stats",
            View::AllData => "get_all_data",
            View::DetailedData => "get_detailed_data",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            View::LeagueInfo => "Get basic ESPN league information: settings and metadata.",
            View::Teams => "Get all teams in the ESPN league with roster and owner information.",
            View::Rosters => "Get detailed roster information for all teams or a specific team in the ESPN league.",
            View::Matchups => "Get matchup information for a specific week in the ESPN league (current week if omitted).",
            View::Standings => "Get current ESPN league standings, sorted by wins then points.",
            View::PlayerStats => "Get player statistics for a specific week from ESPN (all weeks if omitted).",
            View::AllData => "Get comprehensive ESPN league data including teams, matchups, and settings.",
            View::DetailedData => "Get detailed ESPN league data with all available views, including live scoring and draft details.",
        }
    }

    fn input_schema(&self) -> Value {
        let week = json!({ "type": "integer", "description": "Week (scoring period) number" });
        let team_id = json!({ "type": "integer", "description": "ESPN team ID" });
        let properties = match self {
            View::LeagueInfo | View::Teams | View::Standings => json!({}),
            View::Rosters => json!({ "team_id": team_id }),
            View::Matchups | View::PlayerStats => json!({ "week": week }),
            View::AllData | View::DetailedData => json!({ "week": week, "team_id": team_id }),
        };
        json!({ "type": "object", "properties": properties })
    }
}

struct EspnTool {
    view: View,
    api: Arc<EspnApi>,
}

#[async_trait]
impl<D: Send + Sync + 'static> Tool<D> for EspnTool {
    fn name(&self) -> &str {
        self.view.name()
    }

    fn description(&self) -> &str {
        self.view.description()
    }

    fn input_schema(&self) -> Value {
        self.view.input_schema()
    }

    async fn call(&self, args: Arguments, _meta: &Metadata<D>) -> Result<Value> {
        let call: EspnCall = parse_call(self.view.name(), args)?;
        self.api.execute(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::io::Write;

    const SWID: &str = "{1ABB0930-509F-4DBF-ABE8-7B0BF58E6132}";

    #[test]
    fn test_parse_cookie_string() {
        let cookies = parse_cookie_string(&format!(
            "region=us; espn_s2=AEAU5wYJ%2FT8P; SWID={}; other=1",
            SWID
        ));
        assert_eq!(cookies.espn_s2.as_deref(), Some("AEAU5wYJ%2FT8P"));
        assert_eq!(cookies.swid.as_deref(), Some(SWID));

        assert_eq!(parse_cookie_string("nothing here"), EspnCookies::default());
    }

    #[test]
    fn test_cookie_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "espn_s2=abc123;SWID={}", SWID).unwrap();

        let cookies = load_cookie_file(file.path()).unwrap();
        assert_eq!(cookies.header().unwrap(), format!("espn_s2=abc123; SWID={}", SWID));
    }

    #[test]
    fn test_header_needs_both_cookies() {
        let half = EspnCookies {
            espn_s2: Some("abc".into()),
            swid: None,
        };
        assert!(half.header().is_none());
    }

    #[test]
    fn test_standings_sorted_by_wins_then_points() {
        let teams = json!([
            { "name": "A", "record": { "overall": { "wins": 5 } }, "points": 900.0 },
            { "name": "B", "record": { "overall": { "wins": 7 } }, "points": 850.5 },
            { "name": "C", "record": { "overall": { "wins": 5 } }, "points": 990.2 },
            { "name": "D" }
        ]);

        let sorted = sort_standings(teams);
        let names: Vec<&str> = sorted
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["B", "C", "A", "D"]);
    }

    /// Fake league endpoint that echoes the query and cookie it received,
    /// and fails when `scoringPeriodId=99`.
    async fn fake_espn(cookies: EspnCookies) -> Arc<EspnApi> {
        let app = Router::new().route(
            "/league",
            get(|RawQuery(query): RawQuery, headers: HeaderMap| async move {
                let query = query.unwrap_or_default();
                if query.contains("scoringPeriodId=99") {
                    return Err(StatusCode::SERVICE_UNAVAILABLE);
                }
                let cookie = headers
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(Json(json!({
                    "query": query,
                    "cookie": cookie,
                    "teams": [{ "id": 1 }, { "id": 2 }],
                    "schedule": [{ "id": 10 }]
                })))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        EspnApi::new(&format!("http://{}/league", addr), cookies, 5).unwrap()
    }

    fn tool(api: &Arc<EspnApi>, name: &str) -> Arc<dyn Tool<()>> {
        Arc::clone(api)
            .tools::<()>()
            .into_iter()
            .find(|t| t.name() == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_views_and_cookies_are_sent() {
        let api = fake_espn(EspnCookies {
            espn_s2: Some("s2".into()),
            swid: Some(SWID.into()),
        })
        .await;
        let meta = Metadata::new(Arc::new(()));

        let mut args = Arguments::new();
        args.insert("week".into(), json!(3));
        args.insert("team_id".into(), json!(11));
        let data = tool(&api, "get_all_data").call(args, &meta).await.unwrap();

        let query = data["query"].as_str().unwrap();
        assert!(query.contains("view=mTeam&view=mRoster&view=mMatchup"));
        assert!(query.contains("scoringPeriodId=3"));
        assert!(query.contains("rosterForTeamId=11"));
        assert_eq!(data["cookie"], format!("espn_s2=s2; SWID={}", SWID));
    }

    #[tokio::test]
    async fn test_list_tools_unwrap_their_key() {
        let api = fake_espn(EspnCookies::default()).await;
        let meta = Metadata::new(Arc::new(()));

        let teams = tool(&api, "get_teams").call(Arguments::new(), &meta).await.unwrap();
        assert_eq!(teams, json!([{ "id": 1 }, { "id": 2 }]));

        let schedule = tool(&api, "get_matchups").call(Arguments::new(), &meta).await.unwrap();
        assert_eq!(schedule, json!([{ "id": 10 }]));
    }

    #[tokio::test]
    async fn test_http_failure_is_upstream_error() {
        let api = fake_espn(EspnCookies::default()).await;
        let meta = Metadata::new(Arc::new(()));

        let mut args = Arguments::new();
        args.insert("week".into(), json!(99));
        let err = tool(&api, "get_matchups").call(args, &meta).await.unwrap_err();
        assert!(matches!(err, HuddleError::Upstream(msg) if msg.contains("503")));
    }
}
