//! Small context-free tools: clock, city picker and weather.

use super::{http_client, parse_call};
use crate::dispatch::{Arguments, Metadata, Tool};
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

const CITIES: [&str; 30] = [
    "New York", "Los Angeles", "Chicago", "Houston", "Phoenix",
    "Philadelphia", "San Antonio", "San Diego", "Dallas", "San Jose",
    "Austin", "Jacksonville", "Fort Worth", "Columbus", "Charlotte",
    "San Francisco", "Indianapolis", "Seattle", "Denver", "Washington",
    "Boston", "El Paso", "Nashville", "Detroit", "Oklahoma City",
    "Portland", "Las Vegas", "Memphis", "Louisville", "Baltimore",
];

const WTTR_BASE: &str = "https://wttr.in";

pub(super) fn tools<D: Send + Sync + 'static>() -> Result<Vec<Arc<dyn Tool<D>>>> {
    Ok(vec![
        Arc::new(CurrentTime) as Arc<dyn Tool<D>>,
        Arc::new(RandomCity),
        Arc::new(Weather::new(WTTR_BASE)?),
    ])
}

/// Local wall-clock time.
pub struct CurrentTime;

#[async_trait]
impl<D: Send + Sync + 'static> Tool<D> for CurrentTime {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: Arguments, _meta: &Metadata<D>) -> Result<Value> {
        Ok(Value::String(
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        ))
    }
}

/// Picks one of the thirty largest US cities.
pub struct RandomCity;

#[async_trait]
impl<D: Send + Sync + 'static> Tool<D> for RandomCity {
    fn name(&self) -> &str {
        "get_random_city"
    }

    fn description(&self) -> &str {
        "Pick a random large US city."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: Arguments, _meta: &Metadata<D>) -> Result<Value> {
        let city = CITIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(CITIES[0]);
        Ok(Value::String(city.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
enum WeatherCall {
    GetWeather { city: String },
}

/// One-line weather summary from wttr.in.
pub struct Weather {
    http: reqwest::Client,
    base: Url,
}

impl Weather {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| HuddleError::Config(format!("Invalid weather URL {}: {}", base, e)))?;
        Ok(Self {
            http: http_client(30)?,
            base,
        })
    }

    fn url_for(&self, city: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| HuddleError::Config(format!("Weather URL {} cannot hold a path", self.base)))?
            .pop_if_empty()
            .push(city);
        url.query_pairs_mut().append_pair("format", "3");
        Ok(url)
    }
}

#[async_trait]
impl<D: Send + Sync + 'static> Tool<D> for Weather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get a short current weather summary for a city."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "city": { "type": "string", "description": "City name" } },
            "required": ["city"]
        })
    }

    async fn call(&self, args: Arguments, _meta: &Metadata<D>) -> Result<Value> {
        let WeatherCall::GetWeather { city } = parse_call("get_weather", args)?;

        let response = self
            .http
            .get(self.url_for(&city)?)
            .send()
            .await
            .map_err(|e| HuddleError::Upstream(format!("Weather request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(Value::String(format!("Error: {}", status.as_u16())));
        }

        let text = response
            .text()
            .await
            .map_err(|e| HuddleError::Upstream(format!("Weather response unreadable: {}", e)))?;
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn fake_wttr() -> Weather {
        let app = Router::new().route(
            "/{city}",
            get(|Path(city): Path<String>| async move {
                if city == "Atlantis" {
                    Err(StatusCode::NOT_FOUND)
                } else {
                    Ok(format!("{}: +12°C", city))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Weather::new(&format!("http://{}", addr)).unwrap()
    }

    fn city(name: &str) -> Arguments {
        let mut args = Arguments::new();
        args.insert("city".into(), json!(name));
        args
    }

    #[tokio::test]
    async fn test_weather_summary() {
        let weather = fake_wttr().await;
        let meta = Metadata::new(Arc::new(()));
        let out = weather.call(city("Oklahoma City"), &meta).await.unwrap();
        assert_eq!(out, "Oklahoma City: +12°C");
    }

    #[tokio::test]
    async fn test_weather_non_ok_status() {
        let weather = fake_wttr().await;
        let meta = Metadata::new(Arc::new(()));
        let out = weather.call(city("Atlantis"), &meta).await.unwrap();
        assert_eq!(out, "Error: 404");
    }

    #[test]
    fn test_weather_url_escapes_city() {
        let weather = Weather::new(WTTR_BASE).unwrap();
        let url = weather.url_for("San Jose").unwrap();
        assert_eq!(url.as_str(), "https://wttr.in/San%20Jose?format=3");
    }

    #[tokio::test]
    async fn test_random_city_is_from_list() {
        let meta = Metadata::new(Arc::new(()));
        let out = RandomCity.call(Arguments::new(), &meta).await.unwrap();
        assert!(CITIES.contains(&out.as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_current_time_format() {
        let meta = Metadata::new(Arc::new(()));
        let out = CurrentTime.call(Arguments::new(), &meta).await.unwrap();
        let text = out.as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
