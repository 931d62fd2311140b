use crate::types::{
    CardInstance, CardKind, ExploitEffect, GameView, Location, Seat, Target, TurnPlan,
};

// Targeting and legality rules. Everything in this module is a pure function
// of the snapshot and the provisional plan; the planner and the UI both query
// it before every proposed mutation, and nothing here mutates state.

/// An action the local player wants to queue for this turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    /// Play a meme from hand into our kitchen. Hard cap of one per turn.
    PlayToKitchen { card_id: String },
    /// Post a card from our kitchen to the feed. Free.
    PostToFeed { card_id: String },
    /// Cast an exploit from hand, optionally at a discrete target.
    CastExploit {
        card_id: String,
        target: Option<Target>,
    },
}

impl ActionKind {
    pub fn card_id(&self) -> &str {
        match self {
            ActionKind::PlayToKitchen { card_id }
            | ActionKind::PostToFeed { card_id }
            | ActionKind::CastExploit { card_id, .. } => card_id,
        }
    }
}

/// Which zone/ownership combinations an exploit effect kind may target.
/// Derived from the effect's variant alone, never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetProfile {
    pub enemy_kitchen_card: bool,
    pub enemy_feed_card: bool,
    pub ally_kitchen_card: bool,
    pub ally_feed_card: bool,
    pub feed_slot: bool,
    pub enemy_kitchen_zone: bool,
    pub feed_zone: bool,
    pub requires_target: bool,
}

/// Total mapping over the closed set of exploit effect kinds. Adding a kind
/// makes this match fail to compile until a profile is chosen for it.
pub fn target_profile(effect: &ExploitEffect) -> TargetProfile {
    match effect {
        // Single-target damage reaches any enemy card or a feed slot.
        ExploitEffect::Damage(_) => TargetProfile {
            enemy_kitchen_card: true,
            enemy_feed_card: true,
            feed_slot: true,
            requires_target: true,
            ..Default::default()
        },
        // Removal and debuffs want a discrete enemy card.
        ExploitEffect::Debuff(_) | ExploitEffect::Execute | ExploitEffect::Silence => {
            TargetProfile {
                enemy_kitchen_card: true,
                enemy_feed_card: true,
                requires_target: true,
                ..Default::default()
            }
        }
        // Buffs apply to our own cards wherever they sit.
        ExploitEffect::Boost(_) | ExploitEffect::Protect | ExploitEffect::Double => TargetProfile {
            ally_kitchen_card: true,
            ally_feed_card: true,
            requires_target: true,
            ..Default::default()
        },
        // Area damage hits the whole enemy kitchen, no discrete target.
        ExploitEffect::AreaDamageKitchen(_) => TargetProfile {
            enemy_kitchen_zone: true,
            ..Default::default()
        },
        // Feed manipulation keys on a slot index.
        ExploitEffect::PinSlot(_) | ExploitEffect::MoveUp(_) | ExploitEffect::NukeBelow(_) => {
            TargetProfile {
                feed_slot: true,
                requires_target: true,
                ..Default::default()
            }
        }
        // Zone-wide feed effects, no discrete target.
        ExploitEffect::LockFeed | ExploitEffect::ShuffleFeed | ExploitEffect::WipeBottom(_) => {
            TargetProfile {
                feed_zone: true,
                ..Default::default()
            }
        }
        // Self-effects and direct opponent effects need no target at all.
        ExploitEffect::ResurrectLast
        | ExploitEffect::DiscountNext
        | ExploitEffect::SpawnShitposts(_)
        | ExploitEffect::Tax(_)
        | ExploitEffect::ManaBurn(_) => TargetProfile::default(),
    }
}

/// Zones a queued action would land in, for UI highlighting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllowedZones {
    pub kitchen: bool,
    pub feed: bool,
    pub enemy: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayCheck {
    pub playable: bool,
    pub zones: AllowedZones,
}

impl PlayCheck {
    pub fn rejected() -> Self {
        PlayCheck {
            playable: false,
            zones: AllowedZones::default(),
        }
    }
}

/// Mana remaining after subtracting the discounted cost of everything already
/// queued. Recomputed on every call; queued spend feeds back into legality, so
/// this must never be cached across plan mutations.
pub fn available_mana(plan: &TurnPlan, game: &GameView, seat: &Seat) -> u8 {
    let Some(player) = game.player(seat) else {
        return 0;
    };
    let mut spent: u32 = 0;
    for id in &plan.plays_to_kitchen {
        if let Some(card) = find_card(&player.hand, id) {
            spent += discounted_cost(card, player.cost_discount) as u32;
        }
    }
    for exploit in &plan.exploits {
        if let Some(card) = find_card(&player.hand, &exploit.card_id) {
            spent += discounted_cost(card, player.cost_discount) as u32;
        }
    }
    (player.mana as u32).saturating_sub(spent) as u8
}

/// Decide whether `action` may be queued on top of `plan` right now.
pub fn can_play(action: &ActionKind, plan: &TurnPlan, game: &GameView, seat: &Seat) -> PlayCheck {
    let Some(player) = game.player(seat) else {
        return PlayCheck::rejected();
    };
    let budget = available_mana(plan, game, seat);

    match action {
        ActionKind::PlayToKitchen { card_id } => {
            let Some(card) = find_card(&player.hand, card_id) else {
                return PlayCheck::rejected();
            };
            if !matches!(card.class, CardKind::Meme(_)) {
                return PlayCheck::rejected();
            }
            // One meme from hand per turn, regardless of mana.
            let playable = plan.plays_to_kitchen.is_empty()
                && discounted_cost(card, player.cost_discount) <= budget;
            PlayCheck {
                playable,
                zones: AllowedZones {
                    kitchen: playable,
                    ..Default::default()
                },
            }
        }
        ActionKind::PostToFeed { card_id } => {
            // Posting is free and never mana-gated; it only needs the card to
            // actually be in our kitchen.
            let playable = find_card(&player.kitchen, card_id).is_some();
            PlayCheck {
                playable,
                zones: AllowedZones {
                    feed: playable,
                    ..Default::default()
                },
            }
        }
        ActionKind::CastExploit { card_id, target } => {
            let Some(card) = find_card(&player.hand, card_id) else {
                return PlayCheck::rejected();
            };
            let CardKind::Exploit(effect) = &card.class else {
                return PlayCheck::rejected();
            };
            if discounted_cost(card, player.cost_discount) > budget {
                return PlayCheck::rejected();
            }
            let profile = target_profile(effect);
            let playable = if profile.requires_target {
                match target {
                    Some(t) => target_is_legal(&profile, t, game, seat),
                    None => any_legal_target(&profile, game, seat),
                }
            } else {
                true
            };
            PlayCheck {
                playable,
                zones: AllowedZones {
                    kitchen: profile.ally_kitchen_card,
                    feed: profile.ally_feed_card || profile.feed_slot || profile.feed_zone,
                    enemy: profile.enemy_kitchen_card
                        || profile.enemy_feed_card
                        || profile.enemy_kitchen_zone,
                },
            }
        }
    }
}

/// True when the exploit's profile covers the target card's zone/ownership
/// combination (enemy-kitchen, enemy-feed, ally-kitchen, ally-feed).
pub fn can_use_exploit_on_card(effect: &ExploitEffect, card: &CardInstance, seat: &Seat) -> bool {
    let profile = target_profile(effect);
    let ally = &card.owner == seat;
    match (&card.location, ally) {
        (Location::Kitchen, true) => profile.ally_kitchen_card,
        (Location::Kitchen, false) => profile.enemy_kitchen_card,
        (Location::Feed(_), true) => profile.ally_feed_card,
        (Location::Feed(_), false) => profile.enemy_feed_card,
        _ => false,
    }
}

pub fn can_use_exploit_on_slot(effect: &ExploitEffect) -> bool {
    target_profile(effect).feed_slot
}

fn target_is_legal(profile: &TargetProfile, target: &Target, game: &GameView, seat: &Seat) -> bool {
    match target {
        Target::Card(id) => {
            let opponent = seat.other();
            let candidate = game
                .player(seat)
                .and_then(|p| find_card(&p.kitchen, id))
                .or_else(|| game.player(&opponent).and_then(|p| find_card(&p.kitchen, id)))
                .or_else(|| find_card(&game.feed, id));
            match candidate {
                Some(card) => card_matches_profile(profile, card, seat),
                None => false,
            }
        }
        Target::FeedSlot(slot) => profile.feed_slot && *slot < game.feed.len(),
        Target::AnyKitchen | Target::EnemyKitchen => profile.enemy_kitchen_zone,
    }
}

fn card_matches_profile(profile: &TargetProfile, card: &CardInstance, seat: &Seat) -> bool {
    let ally = &card.owner == seat;
    match (&card.location, ally) {
        (Location::Kitchen, true) => profile.ally_kitchen_card,
        (Location::Kitchen, false) => profile.enemy_kitchen_card,
        (Location::Feed(_), true) => profile.ally_feed_card,
        (Location::Feed(_), false) => profile.enemy_feed_card,
        _ => false,
    }
}

/// Does at least one legal target exist for this profile right now?
fn any_legal_target(profile: &TargetProfile, game: &GameView, seat: &Seat) -> bool {
    let opponent = seat.other();
    if profile.enemy_kitchen_card
        && game.player(&opponent).is_some_and(|p| !p.kitchen.is_empty())
    {
        return true;
    }
    if profile.ally_kitchen_card && game.player(seat).is_some_and(|p| !p.kitchen.is_empty()) {
        return true;
    }
    if profile.enemy_feed_card && game.feed.iter().any(|c| c.owner == opponent) {
        return true;
    }
    if profile.ally_feed_card && game.feed.iter().any(|c| &c.owner == seat) {
        return true;
    }
    if profile.feed_slot && !game.feed.is_empty() {
        return true;
    }
    false
}

fn find_card<'a>(cards: &'a [CardInstance], id: &str) -> Option<&'a CardInstance> {
    cards.iter().find(|c| c.instance_id == id)
}

fn discounted_cost(card: &CardInstance, discount: i32) -> u8 {
    (card.cost as i32 - discount).max(0) as u8
}
