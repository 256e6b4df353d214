//! Tool descriptors advertised to the oracle, in `{name, description,
//! inputSchema}` form. Two registries: the standard set every mode gets, and
//! the home-management set offered only after the allowlist gate passes.

pub(crate) const RESPOND_TO_USER: &str = "respond_to_user";
pub(crate) const GET_WEATHER: &str = "get_weather";
pub(crate) const ROLL_DICE: &str = "roll_dice";
pub(crate) const DRAW_CARDS: &str = "draw_cards";
pub(crate) const DECK_CARDS_LEFT: &str = "deck_cards_left";
pub(crate) const DECK_RELOAD: &str = "deck_reload";
pub(crate) const SEARCH_WEB: &str = "search_web";
pub(crate) const GET_CURRENT_TIME: &str = "get_current_time";
pub(crate) const SEARCH_MEMORIES: &str = "search_memories";
pub(crate) const REMEMBER: &str = "remember";
pub(crate) const TURN_ON_LIGHTS: &str = "turn_on_lights";
pub(crate) const TURN_OFF_LIGHTS: &str = "turn_off_lights";
pub(crate) const CHANGE_LIGHT_COLOR: &str = "change_light_color";

pub(crate) fn standard_tools() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": RESPOND_TO_USER,
            "description": "Default response when no specific tool is needed. Pass the reply text as content.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The response to return to the user."}
                },
                "required": ["content"]
            }
        }),
        serde_json::json!({
            "name": GET_CURRENT_TIME,
            "description": "Fetch the current time (US / Central Standard Time).",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        serde_json::json!({
            "name": SEARCH_WEB,
            "description": "Use only to search the internet if you are unsure about something.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query."}
                },
                "required": ["query"]
            }
        }),
        serde_json::json!({
            "name": ROLL_DICE,
            "description": "Roll different types of dice.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sides": {"type": "integer", "description": "Number of sides on the die."}
                }
            }
        }),
        serde_json::json!({
            "name": GET_WEATHER,
            "description": "Get the temperature in Fahrenheit for a specific city.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "city": {"type": "string", "description": "The name of the city."}
                },
                "required": ["city"]
            }
        }),
        serde_json::json!({
            "name": DRAW_CARDS,
            "description": "Draw cards from a deck.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "number_of_cards": {"type": "integer", "description": "The number of cards to draw."}
                }
            }
        }),
        serde_json::json!({
            "name": DECK_CARDS_LEFT,
            "description": "Check remaining cards in a deck.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        serde_json::json!({
            "name": DECK_RELOAD,
            "description": "Reload a deck of cards.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        serde_json::json!({
            "name": SEARCH_MEMORIES,
            "description": "Returns a JSON payload of stored memories you have had with a user.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        serde_json::json!({
            "name": REMEMBER,
            "description": "Store a fact about the user for later conversations.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "key": {"type": "string", "description": "Short label for the fact."},
                    "value": {"type": "string", "description": "The fact itself."}
                },
                "required": ["key", "value"]
            }
        }),
    ]
}

pub(crate) fn home_tools() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": TURN_ON_LIGHTS,
            "description": "Turns on the lights.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        serde_json::json!({
            "name": TURN_OFF_LIGHTS,
            "description": "Turns off the lights.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        serde_json::json!({
            "name": CHANGE_LIGHT_COLOR,
            "description": "Changes the lights in the user's house to a certain color in degrees.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "color_hue": {"type": "integer", "description": "The color hue in degrees."}
                },
                "required": ["color_hue"]
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_descriptor_is_well_formed() {
        for tool in standard_tools().iter().chain(home_tools().iter()) {
            let name = tool["name"].as_str().unwrap();
            assert!(!name.is_empty());
            assert!(tool["description"].as_str().unwrap().len() > 10);
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }

    #[test]
    fn test_respond_to_user_is_first_standard_tool() {
        assert_eq!(standard_tools()[0]["name"], RESPOND_TO_USER);
    }

    #[test]
    fn test_home_tools_separate_from_standard() {
        let standard: Vec<String> = standard_tools()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        for tool in home_tools() {
            assert!(!standard.contains(&tool["name"].as_str().unwrap().to_string()));
        }
    }
}
