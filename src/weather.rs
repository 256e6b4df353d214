//! Current-conditions lookup via the Open-Meteo geocoding and forecast APIs.

use std::time::Duration;

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

fn agent(timeout_ms: Option<u64>) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(ms) = timeout_ms {
        let timeout = Duration::from_millis(ms.max(1));
        builder = builder
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout);
    }
    builder.build()
}

fn geocode(agent: &ureq::Agent, city: &str) -> Result<(f64, f64), String> {
    let url = format!(
        "{GEOCODE_URL}?name={}&language=en&format=json&count=1",
        urlencoding::encode(city)
    );
    let body = agent
        .get(&url)
        .call()
        .map_err(|e| format!("geocoding request failed: {e}"))?
        .into_string()
        .map_err(|e| format!("geocoding read failed: {e}"))?;
    let data: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| format!("geocoding parse failed: {e}"))?;
    let first = data
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
        .ok_or_else(|| format!("no location match for {city}"))?;
    let lat = first
        .get("latitude")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "geocoding result missing latitude".to_string())?;
    let lon = first
        .get("longitude")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "geocoding result missing longitude".to_string())?;
    Ok((lat, lon))
}

fn current_temperature(agent: &ureq::Agent, lat: f64, lon: f64) -> Result<f64, String> {
    let url = format!(
        "{FORECAST_URL}?latitude={lat}&longitude={lon}\
         &current=temperature_2m&temperature_unit=fahrenheit\
         &timezone=America%2FChicago&forecast_days=1"
    );
    let body = agent
        .get(&url)
        .call()
        .map_err(|e| format!("forecast request failed: {e}"))?
        .into_string()
        .map_err(|e| format!("forecast read failed: {e}"))?;
    let data: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| format!("forecast parse failed: {e}"))?;
    data.get("current")
        .and_then(|c| c.get("temperature_2m"))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "forecast response missing current temperature".to_string())
}

/// Look up the current temperature for a city. Every failure mode comes back
/// as a user-facing error string; nothing here panics or aborts the turn.
pub(crate) fn get_weather(city: &str, timeout_ms: Option<u64>) -> String {
    let city = city.trim();
    if city.is_empty() {
        return "Error: no city given.".to_string();
    }
    let agent = agent(timeout_ms);
    let (lat, lon) = match geocode(&agent, city) {
        Ok(coords) => coords,
        Err(err) => {
            eprintln!("[weather] {err}");
            return format!("Error: Unable to retrieve location data for {city}.");
        }
    };
    match current_temperature(&agent, lat, lon) {
        Ok(temp) => format!(
            "The weather in {city} right now is {} degrees Fahrenheit.",
            temp.ceil() as i64
        ),
        Err(err) => {
            eprintln!("[weather] {err}");
            format!("Error: Unable to fetch weather data for {city}.")
        }
    }
}
