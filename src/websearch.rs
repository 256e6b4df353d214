//! Web lookups via the DuckDuckGo Instant Answer API. Good enough for the
//! "I'm not sure, let me check" cases the chat prompt reserves it for.

use std::time::Duration;

const SEARCH_URL: &str = "https://api.duckduckgo.com/";
const MAX_RESULTS: usize = 5;

pub(crate) fn search_web(query: &str, timeout_ms: Option<u64>) -> String {
    let query = query.trim();
    if query.is_empty() {
        return "Error: no search query given.".to_string();
    }

    let mut builder = ureq::AgentBuilder::new();
    if let Some(ms) = timeout_ms {
        let timeout = Duration::from_millis(ms.max(1));
        builder = builder
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout);
    }
    let agent = builder.build();

    let url = format!(
        "{SEARCH_URL}?q={}&format=json&no_html=1&skip_disambig=1",
        urlencoding::encode(query)
    );
    let response = match agent.get(&url).call() {
        Ok(resp) => resp,
        Err(err) => {
            eprintln!("[search] request failed: {err}");
            return format!("Error: web search for '{query}' failed.");
        }
    };
    let body = match response.into_string() {
        Ok(body) => body,
        Err(err) => {
            eprintln!("[search] read failed: {err}");
            return format!("Error: web search for '{query}' failed.");
        }
    };
    let data: serde_json::Value = match serde_json::from_str(&body) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("[search] parse failed: {err}");
            return format!("Error: web search for '{query}' failed.");
        }
    };

    format_results(query, &data)
}

fn format_results(query: &str, data: &serde_json::Value) -> String {
    if let Some(abstract_text) = data.get("AbstractText").and_then(|v| v.as_str()) {
        if !abstract_text.is_empty() {
            return abstract_text.to_string();
        }
    }
    if let Some(answer) = data.get("Answer").and_then(|v| v.as_str()) {
        if !answer.is_empty() {
            return answer.to_string();
        }
    }

    let mut lines = Vec::new();
    if let Some(topics) = data.get("RelatedTopics").and_then(|v| v.as_array()) {
        for topic in topics {
            // Grouped topics nest one level deeper under "Topics".
            let flat = topic
                .get("Topics")
                .and_then(|v| v.as_array())
                .map(|inner| inner.iter().collect::<Vec<_>>())
                .unwrap_or_else(|| vec![topic]);
            for entry in flat {
                if let Some(text) = entry.get("Text").and_then(|v| v.as_str()) {
                    if !text.is_empty() {
                        lines.push(format!("- {text}"));
                    }
                }
                if lines.len() >= MAX_RESULTS {
                    break;
                }
            }
            if lines.len() >= MAX_RESULTS {
                break;
            }
        }
    }

    if lines.is_empty() {
        format!("No results found for '{query}'.")
    } else {
        lines.join("\n")
    }
}
