//! Per-user card decks for the story mode's luck mechanic. A deck is 52
//! cards plus two Jokers; face cards and Aces count as successes, Jokers as
//! failures, and the Queen of Hearts adds the player's charm.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

const SUITS: [&str; 4] = ["Clubs", "Diamonds", "Hearts", "Spades"];
const RANKS: [&str; 13] = [
    "Ace", "2", "3", "4", "5", "6", "7", "8", "9", "10", "Jack", "Queen", "King",
];
const SUCCESS_RANKS: [&str; 4] = ["Ace", "Jack", "Queen", "King"];

const FAILURE_MESSAGES: [&str; 2] = [
    "It couldn't be too bad, could it?",
    "Maybe you'll just slip on a banana peel.",
];

const CRITICAL_FAILURE_MESSAGES: [&str; 3] = [
    "Pray to your gods.",
    "Aw man, am I gonna die?",
    "This is funny in a cosmic sort of way.",
];

#[derive(Debug, Clone)]
struct Card {
    rank: &'static str,
    suit: &'static str,
    description: String,
}

impl Card {
    fn is_success(&self) -> bool {
        SUCCESS_RANKS.contains(&self.rank)
    }

    fn is_failure(&self) -> bool {
        self.rank == "Joker"
    }

    fn is_queen_of_hearts(&self) -> bool {
        self.rank == "Queen" && self.suit == "Hearts"
    }
}

#[derive(Debug)]
pub(crate) struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    fn new() -> Self {
        let mut cards: Vec<Card> = RANKS
            .iter()
            .flat_map(|rank| {
                SUITS.iter().map(move |suit| Card {
                    rank,
                    suit,
                    description: format!("{rank} of {suit}"),
                })
            })
            .collect();
        cards.push(Card {
            rank: "Joker",
            suit: "Red",
            description: "Red Joker".to_string(),
        });
        cards.push(Card {
            rank: "Joker",
            suit: "Black",
            description: "Black Joker".to_string(),
        });
        cards.shuffle(&mut rand::thread_rng());
        Self { cards }
    }

    fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    fn remaining(&self) -> usize {
        self.cards.len()
    }
}

/// All users' decks. Lives behind the tool executor's mutex; decks are
/// created lazily on first draw.
#[derive(Debug, Default)]
pub(crate) struct DeckTable {
    decks: HashMap<String, Deck>,
}

impl DeckTable {
    pub(crate) fn cards_left(&self, user_id: &str) -> String {
        match self.decks.get(user_id) {
            None => format!("You don't have a deck, {user_id}. Stop trying to trick me."),
            Some(deck) => format!(
                "You have {} cards remaining, {user_id}.",
                deck.remaining()
            ),
        }
    }

    pub(crate) fn reload(&mut self, user_id: &str) -> String {
        self.decks.insert(user_id.to_string(), Deck::new());
        format!("A new deck of cards has been started for {user_id}.")
    }

    pub(crate) fn draw_cards(&mut self, num_cards: u32, user_id: &str) -> String {
        let deck = self
            .decks
            .entry(user_id.to_string())
            .or_insert_with(Deck::new);

        let mut successes = 0u32;
        let mut failures = 0u32;
        let mut queen_of_hearts = false;
        let mut lines = vec![format!("Drawing {num_cards} card(s) for {user_id}...")];

        for _ in 0..num_cards {
            // Decks are reloaded on exhaustion below, so a draw always hits.
            let card = match deck.draw() {
                Some(card) => card,
                None => break,
            };
            if card.is_success() {
                successes += 1;
            }
            if card.is_failure() {
                failures += 1;
            }
            if card.is_queen_of_hearts() {
                queen_of_hearts = true;
            }
            lines.push(format!(
                "Drew: {}. Cards left: {}",
                card.description,
                deck.remaining()
            ));
            if deck.remaining() == 0 {
                lines.push("Out of cards! Getting a new deck...".to_string());
                *deck = Deck::new();
            }
        }

        let mut rng = rand::thread_rng();
        lines.push(format!("```Total number of Successes: {successes}\n"));
        if queen_of_hearts {
            lines.push("Queen of Hearts! Add your charm to the number of successes!\n".to_string());
        }
        match failures {
            0 => lines.push("No failures, phew.\n".to_string()),
            1 => lines.push(format!(
                "1 failure. {}\n",
                FAILURE_MESSAGES[rng.gen_range(0..FAILURE_MESSAGES.len())]
            )),
            _ => lines.push(format!(
                "{failures} failures. {}\n",
                CRITICAL_FAILURE_MESSAGES[rng.gen_range(0..CRITICAL_FAILURE_MESSAGES.len())]
            )),
        }
        lines.push("```".to_string());

        lines.join("\r\n")
    }
}

pub(crate) fn roll_dice(sides: u32) -> String {
    if sides == 0 {
        return "A zero-sided die? Nice try.".to_string();
    }
    let roll = rand::thread_rng().gen_range(1..=sides);
    format!("Rolled a {roll} on a {sides}-sided die.")
}
