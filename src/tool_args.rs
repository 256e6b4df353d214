//! Typed argument structs for each tool. The oracle's argument objects are
//! deserialized into these before dispatch; a failure produces a diagnostic
//! string fed back to the model, never a panic.

use serde::Deserialize;

fn default_dice_sides() -> u32 {
    20
}

fn default_card_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondArgs {
    #[serde(default)]
    pub(crate) content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeatherArgs {
    pub(crate) city: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RollDiceArgs {
    #[serde(default = "default_dice_sides")]
    pub(crate) sides: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DrawCardsArgs {
    #[serde(default = "default_card_count")]
    pub(crate) number_of_cards: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchWebArgs {
    pub(crate) query: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RememberArgs {
    pub(crate) key: String,
    pub(crate) value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangeLightColorArgs {
    pub(crate) color_hue: u32,
}

pub(crate) fn parse_args<T: for<'de> Deserialize<'de>>(
    name: &str,
    args: &serde_json::Value,
) -> Result<T, String> {
    serde_json::from_value(args.clone())
        .map_err(|e| format!("Bad arguments for {name}: {e}. Got: {args}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let roll: RollDiceArgs = parse_args("roll_dice", &serde_json::json!({})).unwrap();
        assert_eq!(roll.sides, 20);
        let draw: DrawCardsArgs = parse_args("draw_cards", &serde_json::json!({})).unwrap();
        assert_eq!(draw.number_of_cards, 1);
    }

    #[test]
    fn test_missing_required_field_is_diagnostic() {
        let err = parse_args::<WeatherArgs>("get_weather", &serde_json::json!({"town": "Austin"}))
            .unwrap_err();
        assert!(err.contains("get_weather"));
        assert!(err.contains("town"));
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let args: WeatherArgs = parse_args(
            "get_weather",
            &serde_json::json!({"city": "Austin", "units": "f"}),
        )
        .unwrap();
        assert_eq!(args.city, "Austin");
    }
}
