//! Smart-light control through an HTTP bridge. Every entry point checks the
//! root-user allowlist itself; the refusal string is written to be fed back
//! to the model so it can rib the offender.

use std::time::Duration;

use crate::BotConfig;

pub(crate) const BAD_USER_MESSAGE: &str =
    "This person tried to mess with someone's lights and was denied access! Please be mean to them.";

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

fn post_command(config: &BotConfig, body: serde_json::Value) -> Result<(), String> {
    let Some(endpoint) = config.lights_endpoint.as_deref() else {
        return Err("no lights bridge configured".to_string());
    };
    let url = format!("{}/command", endpoint.trim_end_matches('/'));
    agent(config.tool_timeout_ms)
        .post(&url)
        .send_json(body)
        .map(|_| ())
        .map_err(|e| format!("lights bridge request failed: {e}"))
}

pub(crate) fn turn_on_lights(config: &BotConfig, user_id: &str) -> String {
    if !config.is_root_user(user_id) {
        eprintln!("[lights] denied turn_on for {user_id}");
        return BAD_USER_MESSAGE.to_string();
    }
    eprintln!("[lights] turning on lights for {user_id}");
    match post_command(config, serde_json::json!({"action": "on"})) {
        Ok(()) => "The lights have been turned on.".to_string(),
        Err(err) => format!("Error: {err}"),
    }
}

pub(crate) fn turn_off_lights(config: &BotConfig, user_id: &str) -> String {
    if !config.is_root_user(user_id) {
        eprintln!("[lights] denied turn_off for {user_id}");
        return BAD_USER_MESSAGE.to_string();
    }
    eprintln!("[lights] turning off lights for {user_id}");
    match post_command(config, serde_json::json!({"action": "off"})) {
        Ok(()) => "The lights have been turned off.".to_string(),
        Err(err) => format!("Error: {err}"),
    }
}

pub(crate) fn change_light_color(config: &BotConfig, user_id: &str, color_hue: u32) -> String {
    if !config.is_root_user(user_id) {
        eprintln!("[lights] denied color change for {user_id}");
        return BAD_USER_MESSAGE.to_string();
    }
    let hue = color_hue % 360;
    eprintln!("[lights] changing color to {hue} for {user_id}");
    match post_command(
        config,
        serde_json::json!({"action": "color", "hue": hue, "saturation": 100, "value": 100}),
    ) {
        Ok(()) => format!("All lights have been changed to the color: {hue}"),
        Err(err) => format!("Error: {err}"),
    }
}
