//! Card effect table for the running-count game.
//!
//! Every play moves a shared count that starts at zero. Going past the
//! room's count limit is a rule violation that costs the player their hand.
//!
//! | Rank      | Effect                                          |
//! |-----------|-------------------------------------------------|
//! | 1 (ace)   | count ±1, sign chosen by `is_add`               |
//! | 2..=8     | count + rank                                    |
//! | 9         | hold                                            |
//! | 10        | count ±10, sign chosen by `is_add`              |
//! | 11 (jack) | reverse the direction of play                   |
//! | 12 (queen)| skip the next player, or hand the turn to a target |
//! | 13 (king) | count jumps straight to the limit               |

use serde::{Deserialize, Serialize};

use super::entities::Card;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardEffect {
    Add { amount: u32 },
    Subtract { amount: u32 },
    Hold,
    Reverse,
    Skip,
    /// Turn goes to the player named in the play request.
    Redirect,
    SetToLimit,
}

impl CardEffect {
    /// Effect of playing `card`. `targeted` is whether the request named a
    /// target player; only the queen cares.
    pub fn of(card: Card, is_add: bool, targeted: bool) -> Self {
        match card.rank {
            1 if is_add => Self::Add { amount: 1 },
            1 => Self::Subtract { amount: 1 },
            9 => Self::Hold,
            10 if is_add => Self::Add { amount: 10 },
            10 => Self::Subtract { amount: 10 },
            11 => Self::Reverse,
            12 if targeted => Self::Redirect,
            12 => Self::Skip,
            13 => Self::SetToLimit,
            rank => Self::Add {
                amount: u32::from(rank),
            },
        }
    }

    /// Count after applying this effect, or the count the play would have
    /// reached if it breaks the limit.
    pub fn next_count(self, count: u32, limit: u32) -> Result<u32, u32> {
        let next = match self {
            Self::Add { amount } => count.saturating_add(amount),
            Self::Subtract { amount } => count.saturating_sub(amount),
            Self::SetToLimit => limit,
            Self::Hold | Self::Reverse | Self::Skip | Self::Redirect => count,
        };
        if next > limit { Err(next) } else { Ok(next) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Pattern;

    fn card(rank: u8) -> Card {
        Card::new(rank, Pattern::Spade)
    }

    #[test]
    fn test_plain_ranks_add_their_value() {
        for rank in 2..=8 {
            assert_eq!(
                CardEffect::of(card(rank), false, false),
                CardEffect::Add {
                    amount: u32::from(rank)
                }
            );
        }
    }

    #[test]
    fn test_ace_and_ten_follow_is_add() {
        assert_eq!(
            CardEffect::of(card(1), true, false),
            CardEffect::Add { amount: 1 }
        );
        assert_eq!(
            CardEffect::of(card(1), false, false),
            CardEffect::Subtract { amount: 1 }
        );
        assert_eq!(
            CardEffect::of(card(10), true, false),
            CardEffect::Add { amount: 10 }
        );
        assert_eq!(
            CardEffect::of(card(10), false, false),
            CardEffect::Subtract { amount: 10 }
        );
    }

    #[test]
    fn test_face_cards() {
        assert_eq!(CardEffect::of(card(9), true, true), CardEffect::Hold);
        assert_eq!(CardEffect::of(card(11), true, false), CardEffect::Reverse);
        assert_eq!(CardEffect::of(card(12), false, false), CardEffect::Skip);
        assert_eq!(CardEffect::of(card(12), false, true), CardEffect::Redirect);
        assert_eq!(CardEffect::of(card(13), false, false), CardEffect::SetToLimit);
    }

    #[test]
    fn test_next_count() {
        assert_eq!(CardEffect::Add { amount: 8 }.next_count(90, 100), Ok(98));
        assert_eq!(CardEffect::Add { amount: 8 }.next_count(95, 100), Err(103));
        assert_eq!(CardEffect::Subtract { amount: 10 }.next_count(4, 100), Ok(0));
        assert_eq!(CardEffect::SetToLimit.next_count(12, 100), Ok(100));
        assert_eq!(CardEffect::Hold.next_count(100, 100), Ok(100));
        assert_eq!(CardEffect::Add { amount: 1 }.next_count(100, 100), Err(101));
    }
}
