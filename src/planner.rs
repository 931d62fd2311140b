use crate::legality::{self, ActionKind, PlayCheck};
use crate::types::{ExploitAction, GameView, PostAction, Seat, TurnPlan};

/// The local player's in-progress turn plan.
///
/// Every mutation is validated through the legality engine first; a rejected
/// mutation leaves the plan untouched. Once a commit has been sent for the
/// current turn the plan is locked until the coordinator resets it.
#[derive(Debug, Default)]
pub struct Planner {
    plan: TurnPlan,
    locked: bool,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self) -> &TurnPlan {
        &self.plan
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Queue an action. Re-queuing a card replaces its earlier entry, so an
    /// exploit aimed at a new target overwrites the old aim; the legality
    /// check runs against the plan *without* that earlier entry so the card's
    /// own cost is not double-counted.
    pub fn queue(&mut self, action: ActionKind, game: &GameView, seat: &Seat) -> PlayCheck {
        if self.locked {
            return PlayCheck::rejected();
        }
        let mut trial = self.plan.clone();
        strip_card(&mut trial, action.card_id());
        let check = legality::can_play(&action, &trial, game, seat);
        if !check.playable {
            return check;
        }
        match action {
            ActionKind::PlayToKitchen { card_id } => trial.plays_to_kitchen.push(card_id),
            ActionKind::PostToFeed { card_id } => trial.posts.push(PostAction { card_id }),
            ActionKind::CastExploit { card_id, target } => {
                trial.exploits.push(ExploitAction { card_id, target })
            }
        }
        self.plan = trial;
        check
    }

    /// Remove a card from the plan, whichever list it sits in. No-op while
    /// locked.
    pub fn remove(&mut self, card_id: &str) {
        if self.locked {
            return;
        }
        strip_card(&mut self.plan, card_id);
    }

    /// Record or clear the BASED stakes intent for this turn's plan.
    pub fn set_based(&mut self, based: bool) {
        if self.locked {
            return;
        }
        self.plan.based = based;
    }

    /// Clear everything and release the lock. Invoked on turn advancement,
    /// on a confirmed reveal, and when leaving the match.
    pub fn reset(&mut self) {
        self.plan = TurnPlan::default();
        self.locked = false;
    }

    /// Mana left for further queuing, recomputed from the current plan.
    pub fn available_mana(&self, game: &GameView, seat: &Seat) -> u8 {
        legality::available_mana(&self.plan, game, seat)
    }
}

fn strip_card(plan: &mut TurnPlan, card_id: &str) {
    plan.plays_to_kitchen.retain(|id| id != card_id);
    plan.posts.retain(|p| p.card_id != card_id);
    plan.exploits.retain(|e| e.card_id != card_id);
}
