//! Coach chat: the conversational plan-mutation protocol.
//!
//! The chat keeps a linear transcript of alternating user/model turns. Every
//! user turn is sent with the full prior transcript and a system instruction
//! that carries the current plan context and the update contract: when, and
//! only when, the user explicitly asks for a schedule change, the model must
//! embed a JSON array of day records between two `<<<PLAN_UPDATE>>>` markers
//! in addition to its prose reply.
//!
//! A turn never fails: transport errors become a visible model turn, and a
//! malformed embedded block leaves the reply as-is with a short technical
//! annotation. The transcript only ever grows.

use crate::endpoint::{CoachEndpoint, Content, GenerateContentRequest};
use crate::store::PlanStore;
use crate::{generate, merge, ChatTurn, Plan};

/// The literal delimiter bracketing an embedded schedule update
pub const PLAN_UPDATE_MARKER: &str = "<<<PLAN_UPDATE>>>";

const UNREACHABLE_REPLY: &str =
    "The coach is unreachable right now. Your message is kept in the conversation; try again in a moment.";

/// What one chat turn produced
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The model's reply as it should be displayed
    pub reply: String,
    /// How many day mutations were applied, when the reply embedded an update
    pub applied_days: Option<usize>,
}

/// One coach conversation about one plan
#[derive(Debug, Default)]
pub struct CoachChat {
    turns: Vec<ChatTurn>,
}

impl CoachChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a conversation from a persisted transcript
    pub fn with_history(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    fn system_instruction(plan: &Plan) -> String {
        format!(
            "You are the user's running coach. The current plan: goal \"{}\", \
             starting {}, race on {}.\n\
             Answer training questions conversationally.\n\
             If, and only if, the user explicitly asks you to change the \
             schedule, also emit the changed days as a JSON array of objects \
             with string fields \"date\" (YYYY-MM-DD) and \"plannedActivity\", \
             wrapped between two {marker} markers. Do not emit the markers \
             otherwise.",
            plan.goal,
            plan.start_date,
            plan.race_date,
            marker = PLAN_UPDATE_MARKER
        )
    }

    /// Send one user message and return the turn's outcome
    ///
    /// Both the user turn and the model's reply (or the error stand-in) are
    /// appended to the transcript; nothing is ever retracted. The caller must
    /// not submit another turn while this one is outstanding.
    pub fn send(
        &mut self,
        endpoint: &CoachEndpoint,
        store: &PlanStore,
        plan: &Plan,
        message: &str,
    ) -> TurnOutcome {
        self.turns.push(ChatTurn::user(message));

        let request = GenerateContentRequest {
            contents: self.turns.iter().map(Content::from_turn).collect(),
            system_instruction: Some(Content::text(None, Self::system_instruction(plan))),
            generation_config: None,
        };

        let text = match endpoint.generate(&request) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Chat turn failed: {}", e);
                self.turns.push(ChatTurn::model(UNREACHABLE_REPLY));
                return TurnOutcome {
                    reply: UNREACHABLE_REPLY.into(),
                    applied_days: None,
                };
            }
        };

        let outcome = self.apply_embedded_update(store, plan, &text);
        self.turns.push(ChatTurn::model(outcome.reply.clone()));
        outcome
    }

    /// Detect, parse and apply an embedded update block
    fn apply_embedded_update(&self, store: &PlanStore, plan: &Plan, text: &str) -> TurnOutcome {
        let Some((stripped, payload)) = extract_update_block(text) else {
            return TurnOutcome {
                reply: text.to_string(),
                applied_days: None,
            };
        };

        let Some(proposals) = generate::parse_planned_days(&payload) else {
            // The block didn't parse; the conversation continues with the
            // reply untouched apart from a technical note.
            return TurnOutcome {
                reply: format!("{}\n\n(The embedded schedule update could not be read.)", text),
                applied_days: None,
            };
        };

        let batch = merge::plan_update_batch(plan, &proposals);
        let count = batch.len();
        if let Err(e) = store.commit(batch) {
            tracing::warn!("Chat update batch rejected: {}", e);
            return TurnOutcome {
                reply: format!("{}\n\n(The schedule update could not be saved.)", stripped),
                applied_days: None,
            };
        }

        TurnOutcome {
            reply: format!("{}\n\n(Schedule updated: {} days.)", stripped, count),
            applied_days: Some(count),
        }
    }
}

/// Split a reply into its prose (block removed) and the bracketed payload
///
/// Only the first marker pair counts; anything after a second pair stays in
/// the prose.
pub fn extract_update_block(text: &str) -> Option<(String, String)> {
    let start = text.find(PLAN_UPDATE_MARKER)?;
    let after_start = start + PLAN_UPDATE_MARKER.len();
    let end = text[after_start..].find(PLAN_UPDATE_MARKER)?;

    let payload = text[after_start..after_start + end].trim().to_string();
    let mut stripped = String::new();
    stripped.push_str(&text[..start]);
    stripped.push_str(&text[after_start + end + PLAN_UPDATE_MARKER.len()..]);

    Some((stripped.trim().to_string(), payload))
}
