//! Core game logic and state management
//!
//! This module contains the main game struct and logic for managing a Kanji
//! Zoo session: player tracking, the round lifecycle (question window,
//! reveal, advance), scoring, pause/resume, and the ordered stream of events
//! fanned out to all connected participants.
//!
//! The game is a plain value with no transport or runtime dependency: event
//! delivery goes through an injected [`Gateway`] and deferred actions are
//! requested through a `schedule` closure, so the whole state machine can be
//! driven deterministically in tests. Inbound events that miss their
//! preconditions (a duplicate answer, a pause while already paused, an
//! answer from an unknown sender) are silently ignored; a stale client
//! retrying an action must never corrupt shared state.

use std::{collections::HashMap, time::Duration};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use super::{
    catalog::{Catalog, CatalogItem},
    leaderboard::{self, Entry},
    names::{self, NameStyle},
    question::{Question, QuestionGenerator},
    score,
    session::{Gateway, Id},
};
use crate::timer::TimerSlot;

/// The phase a game session is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for players; the initial and reset state
    Lobby,
    /// A game is running (a round may be paused)
    Active,
    /// Final standings are showing; terminal until the next start
    Results,
}

/// Which of an item's two rounds is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStep {
    /// The kanji/animal recognition round
    Kanji,
    /// The follow-up reading round for the same item
    Hiragana,
}

/// The recorded result of a player's answer for the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    /// Whether the submitted option was the correct one
    pub correct: bool,
    /// Points awarded (zero for a wrong answer)
    pub points: u64,
}

/// A connected participant's game state
#[derive(Debug, Clone)]
pub struct Player {
    /// Cleaned display name
    name: String,
    /// Total points accumulated this game
    score: u64,
    /// Whether this player has answered the current round
    answered: bool,
    /// Outcome of this player's answer for the current round
    last_answer: Option<AnswerOutcome>,
    /// Monotonic join ordinal; keeps leaderboard ties stable in join order
    joined: u64,
}

impl Player {
    /// The player's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The player's total score
    pub fn score(&self) -> u64 {
        self.score
    }

    /// The outcome of the player's answer for the current round, if any
    pub fn last_answer(&self) -> Option<AnswerOutcome> {
        self.last_answer
    }
}

/// Errors that can occur when adding players
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The game has reached the maximum number of allowed players
    #[error("maximum number of players reached")]
    MaximumPlayers,
}

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the time limit for answering a question
fn validate_time_limit(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::round::MIN_TIME_LIMIT },
        { crate::constants::round::MAX_TIME_LIMIT },
    >("time_limit", val)
}

/// Validates the duration the correct answer stays on screen
fn validate_reveal_time(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::round::MIN_REVEAL_TIME },
        { crate::constants::round::MAX_REVEAL_TIME },
    >("reveal_time", val)
}

/// Configuration options for a game session
///
/// Defaults to the reference constants; custom values should be checked with
/// [`Validate::validate`] before constructing a game.
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Options {
    /// Time players have to answer each question
    #[garde(custom(|v, _| validate_time_limit(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub time_limit: Duration,
    /// Time the correct answer stays on screen between rounds
    #[garde(custom(|v, _| validate_reveal_time(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub reveal_time: Duration,
    /// Number of catalog items covered by one game (two rounds each)
    #[garde(range(min = 1, max = crate::constants::catalog::MAX_ITEMS_PER_GAME))]
    pub items_per_game: usize,
    /// Style for names generated when a player joins with an empty name
    #[garde(dive)]
    pub name_style: NameStyle,
}

impl Default for Options {
    /// The reference configuration: 10 s questions, 3.5 s reveal, 10 items
    fn default() -> Self {
        Self {
            time_limit: crate::constants::round::TIME_LIMIT,
            reveal_time: crate::constants::round::REVEAL_TIME,
            items_per_game: crate::constants::catalog::ITEMS_PER_GAME,
            name_style: NameStyle::default(),
        }
    }
}

/// Messages received from players
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// An answer to the current question, by option id
    Answer(String),
}

/// Messages received from the game host
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingHostMessage {
    /// Reset all scores and begin round 1 (valid from any phase)
    Start,
    /// Freeze the current question's timer
    Pause,
    /// Unfreeze the current question's timer
    Resume,
    /// Return to the lobby, zeroing all scores
    Stop,
    /// Equivalent to [`IncomingHostMessage::Stop`]
    Reset,
}

/// Messages received from participants, categorized by sender role
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Messages from active players
    Player(IncomingPlayerMessage),
    /// Messages from the game host
    Host(IncomingHostMessage),
}

/// Alarm messages for the session's timed events
///
/// Every alarm carries the epoch token handed out when its timer was armed;
/// [`Game::receive_alarm`] refuses tokens from timers that have since been
/// cancelled or superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The question's answer window has ended
    TimeExpired {
        /// Token of the timer this firing belongs to
        epoch: u64,
    },
    /// The answer reveal has been shown long enough
    AdvanceAfterReveal {
        /// Token of the timer this firing belongs to
        epoch: u64,
    },
}

/// Events produced by the game and fanned out to participants
///
/// All variants are broadcast to everyone except [`UpdateMessage::Joined`]
/// and [`UpdateMessage::AnswerResult`], which go to one sender.
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Confirms a join, telling the new player the current phase
    Joined {
        /// The session's current phase
        phase: Phase,
    },
    /// The full list of player names, in join order
    PlayerList(Vec<String>),
    /// The current ranked standings
    Leaderboard(Vec<Entry>),
    /// A game has started; scores are reset
    GameStarted,
    /// A new kanji-round question
    NewQuestion {
        /// The question to display
        question: Question,
        /// 1-based ordinal of this question within the game
        question_number: usize,
        /// Total number of questions the game will ask
        total: usize,
        /// The answer window
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        time_limit: Duration,
    },
    /// A new hiragana-round question for the same item
    HiraganaQuestion {
        /// The question to display
        question: Question,
        /// 1-based ordinal of this question within the game
        question_number: usize,
        /// Total number of questions the game will ask
        total: usize,
        /// The answer window
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        time_limit: Duration,
    },
    /// The answer window has closed
    TimeUp,
    /// The full reveal of the round's subject, all four facets
    ShowAnswer(CatalogItem),
    /// The sender's own answer outcome
    AnswerResult(AnswerOutcome),
    /// The host paused the game
    GamePaused,
    /// The host resumed the game
    GameResumed {
        /// Time left on the re-armed question timer
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        time_remaining: Duration,
    },
    /// The session returned to the lobby
    GameReset,
    /// The game finished; final standings
    GameOver(Vec<Entry>),
}

impl UpdateMessage {
    /// Converts the message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// The authoritative state of one game session
///
/// Owns the players, the round lifecycle, and the single pending-timer slot.
/// All mutation goes through the handler methods, which a runtime must call
/// from a single serialized queue; see [`crate::runtime`].
#[derive(Debug)]
pub struct Game {
    /// The quiz content this session draws from
    catalog: Catalog,
    /// Session configuration
    options: Options,
    /// Current phase
    phase: Phase,
    /// Connected players, keyed by connection id
    players: HashMap<Id, Player>,
    /// Question builder and used-item bookkeeping
    generator: QuestionGenerator,
    /// The round's question, while one is live or revealing
    current_question: Option<Question>,
    /// When the current question was broadcast
    question_start: Option<SystemTime>,
    /// 1-based count of questions asked this game
    question_ordinal: usize,
    /// Which of the item's two rounds is being played
    round_step: RoundStep,
    /// Number of items fully completed this game
    item_index: usize,
    /// Whether the host has paused the game
    paused: bool,
    /// Time left on the question window when the game was paused
    remaining_at_pause: Option<Duration>,
    /// Whether the round is in its reveal window
    revealing: bool,
    /// The one pending deferred action
    timer: TimerSlot,
    /// Source of monotonic join ordinals
    join_counter: u64,
}

impl Game {
    /// Creates a new session in the lobby phase
    ///
    /// # Arguments
    ///
    /// * `catalog` - The quiz content; must satisfy the catalog's validation
    ///   (at least a full option set of items)
    /// * `options` - Session configuration, usually [`Options::default`]
    pub fn new(catalog: Catalog, options: Options) -> Self {
        Self {
            catalog,
            options,
            phase: Phase::Lobby,
            players: HashMap::new(),
            generator: QuestionGenerator::default(),
            current_question: None,
            question_start: None,
            question_ordinal: 0,
            round_step: RoundStep::Kanji,
            item_index: 0,
            paused: false,
            remaining_at_pause: None,
            revealing: false,
            timer: TimerSlot::default(),
            join_counter: 0,
        }
    }

    /// The session's current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the host has paused the game
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The number of connected players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The total number of questions a full game asks
    pub fn total_questions(&self) -> usize {
        self.options.items_per_game * crate::constants::catalog::ROUNDS_PER_ITEM
    }

    /// Player names in join order
    fn player_names(&self) -> Vec<String> {
        self.players
            .values()
            .sorted_by_key(|player| player.joined)
            .map(|player| player.name.clone())
            .collect_vec()
    }

    /// Ranked standings of all connected players
    fn standings(&self) -> Vec<Entry> {
        leaderboard::project(
            self.players
                .iter()
                .sorted_by_key(|(_, player)| player.joined)
                .map(|(id, player)| (*id, player.name.clone(), player.score)),
        )
    }

    /// Broadcasts the current leaderboard to everyone
    fn broadcast_leaderboard<G: Gateway>(&self, gateway: &G) {
        gateway.send_to_all(&UpdateMessage::Leaderboard(self.standings()));
    }

    /// Adds a new player to the session
    ///
    /// Cleans the requested name (truncation, content filtering, generated
    /// fallback for empty names), replies to the joiner with the current
    /// phase, and broadcasts the updated roster. Late joiners entering
    /// mid-game see no current question; they wait for the next round's
    /// broadcast.
    ///
    /// # Arguments
    ///
    /// * `id` - The joining connection
    /// * `requested_name` - The raw display name from the join request
    /// * `gateway` - Outbound fan-out interface
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumPlayers`] if the player cap is reached; the
    /// session state is unchanged in that case.
    pub fn add_player<G: Gateway>(
        &mut self,
        id: Id,
        requested_name: &str,
        gateway: &G,
    ) -> Result<(), Error> {
        if self.players.len() >= crate::constants::session::MAX_PLAYER_COUNT {
            return Err(Error::MaximumPlayers);
        }

        let name = names::clean(requested_name, self.options.name_style);
        self.join_counter += 1;
        self.players.insert(
            id,
            Player {
                name,
                score: 0,
                answered: false,
                last_answer: None,
                joined: self.join_counter,
            },
        );

        gateway.send_to_one(id, &UpdateMessage::Joined { phase: self.phase });
        gateway.send_to_all(&UpdateMessage::PlayerList(self.player_names()));
        self.broadcast_leaderboard(gateway);

        Ok(())
    }

    /// Removes a player from the session
    ///
    /// Broadcasts the updated roster and re-evaluates the all-answered
    /// early-advance check: removing the one player who had not answered can
    /// itself complete the round. Unknown ids are ignored.
    ///
    /// # Arguments
    ///
    /// * `id` - The disconnecting connection
    /// * `schedule` - Callback arming deferred alarms
    /// * `gateway` - Outbound fan-out interface
    pub fn remove_player<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        id: Id,
        schedule: S,
        gateway: &G,
    ) {
        if self.players.remove(&id).is_none() {
            return;
        }

        gateway.send_to_all(&UpdateMessage::PlayerList(self.player_names()));
        self.broadcast_leaderboard(gateway);
        self.check_all_answered(schedule, gateway);
    }

    /// Handles an incoming message from a participant
    ///
    /// Messages that miss their preconditions are silently ignored.
    ///
    /// # Arguments
    ///
    /// * `sender` - The connection the message came from
    /// * `message` - The incoming message
    /// * `schedule` - Callback arming deferred alarms
    /// * `gateway` - Outbound fan-out interface
    pub fn receive_message<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        sender: Id,
        message: IncomingMessage,
        schedule: S,
        gateway: &G,
    ) {
        match message {
            IncomingMessage::Player(IncomingPlayerMessage::Answer(option_id)) => {
                self.answer(sender, &option_id, schedule, gateway);
            }
            IncomingMessage::Host(host_message) => match host_message {
                IncomingHostMessage::Start => self.start_game(schedule, gateway),
                IncomingHostMessage::Pause => self.pause(gateway),
                IncomingHostMessage::Resume => self.resume(schedule, gateway),
                IncomingHostMessage::Stop | IncomingHostMessage::Reset => {
                    self.reset_to_lobby(gateway);
                }
            },
        }
    }

    /// Handles a fired timer
    ///
    /// The alarm's epoch is checked against the timer slot; firings of
    /// cancelled or superseded timers are inert even if they were already
    /// queued when the cancellation happened.
    ///
    /// # Arguments
    ///
    /// * `alarm` - The fired alarm
    /// * `schedule` - Callback arming deferred alarms
    /// * `gateway` - Outbound fan-out interface
    pub fn receive_alarm<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        alarm: AlarmMessage,
        schedule: S,
        gateway: &G,
    ) {
        match alarm {
            AlarmMessage::TimeExpired { epoch } => {
                if self.timer.try_fire(epoch) {
                    self.on_time_expired(schedule, gateway);
                }
            }
            AlarmMessage::AdvanceAfterReveal { epoch } => {
                if self.timer.try_fire(epoch) {
                    self.after_reveal(schedule, gateway);
                }
            }
        }
    }

    /// Starts a game from any phase
    fn start_game<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule: S,
        gateway: &G,
    ) {
        self.timer.cancel();
        self.phase = Phase::Active;
        self.question_ordinal = 0;
        self.generator.reset();
        self.current_question = None;
        self.question_start = None;
        self.item_index = 0;
        self.round_step = RoundStep::Kanji;
        self.paused = false;
        self.remaining_at_pause = None;
        self.revealing = false;
        for player in self.players.values_mut() {
            player.score = 0;
            player.answered = false;
            player.last_answer = None;
        }

        gateway.send_to_all(&UpdateMessage::GameStarted);
        self.broadcast_leaderboard(gateway);
        self.advance_round(schedule, gateway);
    }

    /// Moves into the next round, or into results when all items are done
    fn advance_round<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        mut schedule: S,
        gateway: &G,
    ) {
        self.timer.cancel();
        self.revealing = false;
        for player in self.players.values_mut() {
            player.answered = false;
            player.last_answer = None;
        }

        if self.item_index >= self.options.items_per_game {
            self.phase = Phase::Results;
            self.current_question = None;
            self.question_start = None;
            gateway.send_to_all(&UpdateMessage::GameOver(self.standings()));
            return;
        }

        let question = match self.round_step {
            RoundStep::Kanji => self.generator.kanji_round(&self.catalog),
            RoundStep::Hiragana => self.generator.hiragana_round(&self.catalog),
        };
        let Some(question) = question else {
            return;
        };

        self.question_ordinal += 1;
        self.question_start = Some(SystemTime::now());

        let message = match self.round_step {
            RoundStep::Kanji => UpdateMessage::NewQuestion {
                question: question.clone(),
                question_number: self.question_ordinal,
                total: self.total_questions(),
                time_limit: self.options.time_limit,
            },
            RoundStep::Hiragana => UpdateMessage::HiraganaQuestion {
                question: question.clone(),
                question_number: self.question_ordinal,
                total: self.total_questions(),
                time_limit: self.options.time_limit,
            },
        };
        self.current_question = Some(question);
        gateway.send_to_all(&message);

        let epoch = self.timer.arm();
        schedule(AlarmMessage::TimeExpired { epoch }, self.options.time_limit);
    }

    /// Closes the answer window: reveals the answer and arms the reveal timer
    fn on_time_expired<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        mut schedule: S,
        gateway: &G,
    ) {
        self.timer.cancel();
        let Some(subject) = self.generator.subject_item(&self.catalog).cloned() else {
            return;
        };

        gateway.send_to_all(&UpdateMessage::TimeUp);
        gateway.send_to_all(&UpdateMessage::ShowAnswer(subject));

        self.revealing = true;
        let epoch = self.timer.arm();
        schedule(
            AlarmMessage::AdvanceAfterReveal { epoch },
            self.options.reveal_time,
        );
    }

    /// Moves past the reveal to the item's next round or the next item
    fn after_reveal<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule: S,
        gateway: &G,
    ) {
        self.revealing = false;
        match self.round_step {
            RoundStep::Kanji => self.round_step = RoundStep::Hiragana,
            RoundStep::Hiragana => {
                self.round_step = RoundStep::Kanji;
                self.item_index += 1;
            }
        }
        self.advance_round(schedule, gateway);
    }

    /// Records a player's answer for the current round
    fn answer<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        sender: Id,
        option_id: &str,
        schedule: S,
        gateway: &G,
    ) {
        if self.paused {
            return;
        }
        let Some(question) = &self.current_question else {
            return;
        };
        let correct = question.correct_id == option_id;

        let Some(player) = self.players.get_mut(&sender) else {
            return;
        };
        if player.answered {
            return;
        }
        player.answered = true;

        let elapsed = self
            .question_start
            .and_then(|start| start.elapsed().ok())
            .unwrap_or_default();

        let outcome = if correct {
            let points = score::points(elapsed, self.options.time_limit);
            player.score += points;
            AnswerOutcome {
                correct: true,
                points,
            }
        } else {
            AnswerOutcome {
                correct: false,
                points: 0,
            }
        };
        player.last_answer = Some(outcome);

        gateway.send_to_one(sender, &UpdateMessage::AnswerResult(outcome));
        self.broadcast_leaderboard(gateway);
        self.check_all_answered(schedule, gateway);
    }

    /// Ends the round early once every connected player has answered
    ///
    /// A no-op with no players, while paused, and during the reveal window
    /// (a late answer during the reveal must not restart it).
    fn check_all_answered<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule: S,
        gateway: &G,
    ) {
        if self.phase != Phase::Active
            || self.paused
            || self.revealing
            || self.current_question.is_none()
            || self.players.is_empty()
        {
            return;
        }

        if self.players.values().all(|player| player.answered) {
            self.timer.cancel();
            self.on_time_expired(schedule, gateway);
        }
    }

    /// Freezes the current question's timer
    fn pause<G: Gateway>(&mut self, gateway: &G) {
        if self.phase != Phase::Active || self.paused {
            return;
        }

        let elapsed = self
            .question_start
            .and_then(|start| start.elapsed().ok())
            .unwrap_or_default();
        self.remaining_at_pause = Some(self.options.time_limit.saturating_sub(elapsed));
        self.paused = true;
        self.timer.cancel();

        gateway.send_to_all(&UpdateMessage::GamePaused);
    }

    /// Unfreezes the game, re-arming the timer for the stored remainder
    ///
    /// The question start timestamp is shifted back by the consumed portion
    /// of the window so elapsed-time accounting stays continuous across the
    /// pause.
    fn resume<G: Gateway, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        mut schedule: S,
        gateway: &G,
    ) {
        if self.phase != Phase::Active || !self.paused {
            return;
        }

        let remaining = self.remaining_at_pause.take().unwrap_or_default();
        self.paused = false;

        let consumed = self.options.time_limit.saturating_sub(remaining);
        let now = SystemTime::now();
        self.question_start = Some(now.checked_sub(consumed).unwrap_or(now));

        let epoch = self.timer.arm();
        schedule(AlarmMessage::TimeExpired { epoch }, remaining);

        let time_remaining = self
            .question_start
            .and_then(|start| start.elapsed().ok())
            .map(|elapsed| self.options.time_limit.saturating_sub(elapsed))
            .unwrap_or(remaining);
        gateway.send_to_all(&UpdateMessage::GameResumed { time_remaining });
    }

    /// Returns the session to the lobby, zeroing all player state
    ///
    /// Valid from any phase; repeated calls are safe no-ops.
    fn reset_to_lobby<G: Gateway>(&mut self, gateway: &G) {
        self.timer.cancel();
        self.phase = Phase::Lobby;
        self.question_ordinal = 0;
        self.generator.reset();
        self.current_question = None;
        self.question_start = None;
        self.item_index = 0;
        self.round_step = RoundStep::Kanji;
        self.paused = false;
        self.remaining_at_pause = None;
        self.revealing = false;
        for player in self.players.values_mut() {
            player.score = 0;
            player.answered = false;
            player.last_answer = None;
        }

        gateway.send_to_all(&UpdateMessage::GameReset);
        self.broadcast_leaderboard(gateway);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    #[derive(Debug, Clone, Default)]
    struct MockGateway {
        broadcasts: Arc<Mutex<Vec<UpdateMessage>>>,
        directs: Arc<Mutex<Vec<(Id, UpdateMessage)>>>,
    }

    impl Gateway for MockGateway {
        fn send_to_all(&self, message: &UpdateMessage) {
            self.broadcasts.lock().unwrap().push(message.clone());
        }

        fn send_to_one(&self, id: Id, message: &UpdateMessage) {
            self.directs.lock().unwrap().push((id, message.clone()));
        }
    }

    impl MockGateway {
        fn broadcasts(&self) -> Vec<UpdateMessage> {
            self.broadcasts.lock().unwrap().clone()
        }

        fn directs_to(&self, id: Id) -> Vec<UpdateMessage> {
            self.directs
                .lock()
                .unwrap()
                .iter()
                .filter(|(target, _)| *target == id)
                .map(|(_, message)| message.clone())
                .collect()
        }

        fn count_broadcasts<F: Fn(&UpdateMessage) -> bool>(&self, predicate: F) -> usize {
            self.broadcasts().iter().filter(|m| predicate(m)).count()
        }

        fn clear(&self) {
            self.broadcasts.lock().unwrap().clear();
            self.directs.lock().unwrap().clear();
        }
    }

    fn no_alarms(_: AlarmMessage, _: Duration) {}

    fn new_game(items_per_game: usize) -> Game {
        Game::new(
            Catalog::default(),
            Options {
                items_per_game,
                ..Options::default()
            },
        )
    }

    fn join(game: &mut Game, gateway: &MockGateway, name: &str) -> Id {
        let id = Id::new();
        game.add_player(id, name, gateway).unwrap();
        id
    }

    fn start(game: &mut Game, gateway: &MockGateway) -> Vec<(AlarmMessage, Duration)> {
        let mut scheduled = Vec::new();
        game.receive_message(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Start),
            |alarm, after| scheduled.push((alarm, after)),
            gateway,
        );
        scheduled
    }

    fn answer(
        game: &mut Game,
        gateway: &MockGateway,
        sender: Id,
        option_id: &str,
    ) -> Vec<(AlarmMessage, Duration)> {
        let mut scheduled = Vec::new();
        game.receive_message(
            sender,
            IncomingMessage::Player(IncomingPlayerMessage::Answer(option_id.to_owned())),
            |alarm, after| scheduled.push((alarm, after)),
            gateway,
        );
        scheduled
    }

    fn correct_id(game: &Game) -> String {
        game.current_question
            .as_ref()
            .expect("a question is live")
            .correct_id
            .clone()
    }

    fn is_question(message: &UpdateMessage) -> bool {
        matches!(
            message,
            UpdateMessage::NewQuestion { .. } | UpdateMessage::HiraganaQuestion { .. }
        )
    }

    #[test]
    fn test_join_replies_with_phase_and_broadcasts_roster() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();

        let id = join(&mut game, &gateway, "Aki");

        assert!(matches!(
            game.players.get(&id),
            Some(player) if player.name == "Aki" && player.score == 0
        ));
        assert!(
            gateway
                .directs_to(id)
                .iter()
                .any(|m| matches!(m, UpdateMessage::Joined { phase: Phase::Lobby }))
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::PlayerList(names) if names == &["Aki"])),
            1
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::Leaderboard(_))),
            1
        );
    }

    #[test]
    fn test_late_joiner_sees_active_phase() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);

        let late = join(&mut game, &gateway, "Yori");
        assert!(
            gateway
                .directs_to(late)
                .iter()
                .any(|m| matches!(m, UpdateMessage::Joined { phase: Phase::Active }))
        );
    }

    #[test]
    fn test_join_rejected_at_capacity() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();

        for i in 0..crate::constants::session::MAX_PLAYER_COUNT {
            game.players.insert(
                Id::new(),
                Player {
                    name: format!("p{i}"),
                    score: 0,
                    answered: false,
                    last_answer: None,
                    joined: i as u64,
                },
            );
        }

        assert_eq!(
            game.add_player(Id::new(), "late", &gateway),
            Err(Error::MaximumPlayers)
        );
    }

    #[test]
    fn test_start_resets_scores_and_broadcasts_first_question() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");
        game.players.get_mut(&id).unwrap().score = 500;
        gateway.clear();

        let scheduled = start(&mut game, &gateway);

        assert_eq!(game.phase(), Phase::Active);
        assert_eq!(game.players[&id].score, 0);
        assert_eq!(game.question_ordinal, 1);
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GameStarted)),
            1
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::NewQuestion { .. })),
            1
        );
        assert_eq!(scheduled.len(), 1);
        assert!(matches!(scheduled[0].0, AlarmMessage::TimeExpired { .. }));
        assert_eq!(scheduled[0].1, game.options.time_limit);
    }

    #[test]
    fn test_full_game_emits_every_question_then_results() {
        let items = 3;
        let mut game = new_game(items);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        gateway.clear();

        let mut queue: VecDeque<AlarmMessage> =
            start(&mut game, &gateway).into_iter().map(|(a, _)| a).collect();
        while let Some(alarm) = queue.pop_front() {
            let mut next = Vec::new();
            game.receive_alarm(alarm, |a, _| next.push(a), &gateway);
            queue.extend(next);
        }

        assert_eq!(game.phase(), Phase::Results);
        assert_eq!(
            gateway.count_broadcasts(is_question),
            items * crate::constants::catalog::ROUNDS_PER_ITEM
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::NewQuestion { .. })),
            items
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::HiraganaQuestion { .. })),
            items
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GameOver(_))),
            1
        );
    }

    #[test]
    fn test_correct_answer_scores_and_replies() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);
        gateway.clear();

        let option = correct_id(&game);
        answer(&mut game, &gateway, id, &option);

        let results = gateway.directs_to(id);
        let outcome = results
            .iter()
            .find_map(|m| match m {
                UpdateMessage::AnswerResult(outcome) => Some(*outcome),
                _ => None,
            })
            .expect("an answer result was sent");
        assert!(outcome.correct);
        assert!(outcome.points >= 900 && outcome.points <= 1000);
        assert_eq!(game.players[&id].score, outcome.points);
        assert_eq!(game.players[&id].last_answer(), Some(outcome));
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::Leaderboard(_))),
            1
        );
    }

    #[test]
    fn test_wrong_answer_earns_nothing() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);

        answer(&mut game, &gateway, id, "not an option");

        let outcome = gateway
            .directs_to(id)
            .iter()
            .find_map(|m| match m {
                UpdateMessage::AnswerResult(outcome) => Some(*outcome),
                _ => None,
            })
            .expect("an answer result was sent");
        assert!(!outcome.correct);
        assert_eq!(outcome.points, 0);
        assert_eq!(game.players[&id].score, 0);
    }

    #[test]
    fn test_duplicate_answer_is_ignored() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");
        let other = join(&mut game, &gateway, "Yori");
        start(&mut game, &gateway);
        let option = correct_id(&game);

        answer(&mut game, &gateway, id, &option);
        let first_score = game.players[&id].score;
        answer(&mut game, &gateway, id, &option);

        assert_eq!(game.players[&id].score, first_score);
        assert_eq!(
            gateway
                .directs_to(id)
                .iter()
                .filter(|m| matches!(m, UpdateMessage::AnswerResult(_)))
                .count(),
            1
        );
        // The other player never answered, so the round is still open.
        assert!(game.players.contains_key(&other));
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::TimeUp)),
            0
        );
    }

    #[test]
    fn test_answer_from_unknown_sender_is_ignored() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);
        gateway.clear();

        let stranger = Id::new();
        let correct = correct_id(&game);
        answer(&mut game, &gateway, stranger, &correct);

        assert!(gateway.directs_to(stranger).is_empty());
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::Leaderboard(_))),
            0
        );
    }

    #[test]
    fn test_all_answered_advances_early() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let first = join(&mut game, &gateway, "Aki");
        let second = join(&mut game, &gateway, "Yori");
        start(&mut game, &gateway);
        let option = correct_id(&game);
        gateway.clear();

        answer(&mut game, &gateway, first, &option);
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::TimeUp)),
            0
        );

        let scheduled = answer(&mut game, &gateway, second, "wrong");
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::TimeUp)),
            1
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::ShowAnswer(_))),
            1
        );
        assert!(
            scheduled
                .iter()
                .any(|(a, _)| matches!(a, AlarmMessage::AdvanceAfterReveal { .. }))
        );
    }

    #[test]
    fn test_disconnect_of_last_holdout_advances_early() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let answering = join(&mut game, &gateway, "Aki");
        let leaving = join(&mut game, &gateway, "Yori");
        start(&mut game, &gateway);
        let option = correct_id(&game);
        answer(&mut game, &gateway, answering, &option);
        gateway.clear();

        let mut scheduled = Vec::new();
        game.remove_player(leaving, |a, d| scheduled.push((a, d)), &gateway);

        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::TimeUp)),
            1
        );
        assert!(
            scheduled
                .iter()
                .any(|(a, _)| matches!(a, AlarmMessage::AdvanceAfterReveal { .. }))
        );
    }

    #[test]
    fn test_disconnect_with_empty_result_does_not_advance() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let only = join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);
        gateway.clear();

        game.remove_player(only, no_alarms, &gateway);

        assert_eq!(game.player_count(), 0);
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::TimeUp)),
            0
        );
    }

    #[test]
    fn test_answer_while_paused_is_ignored() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);
        let option = correct_id(&game);
        game.receive_message(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Pause),
            no_alarms,
            &gateway,
        );
        gateway.clear();

        answer(&mut game, &gateway, id, &option);

        assert!(gateway.directs_to(id).is_empty());
        assert_eq!(game.players[&id].score, 0);
        assert!(!game.players[&id].answered);
    }

    #[test]
    fn test_pause_stores_remaining_and_resume_rearms_it() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);

        // Pretend 6 of the 10 seconds have already elapsed.
        game.question_start = Some(
            SystemTime::now()
                .checked_sub(Duration::from_secs(6))
                .unwrap(),
        );
        game.receive_message(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Pause),
            no_alarms,
            &gateway,
        );
        assert!(game.is_paused());
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GamePaused)),
            1
        );
        let stored = game.remaining_at_pause.expect("remaining time stored");
        assert!(stored > Duration::from_secs(3) && stored <= Duration::from_secs(4));

        let mut scheduled = Vec::new();
        game.receive_message(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Resume),
            |alarm, after| scheduled.push((alarm, after)),
            &gateway,
        );
        assert!(!game.is_paused());
        assert_eq!(scheduled.len(), 1);
        assert!(matches!(scheduled[0].0, AlarmMessage::TimeExpired { .. }));
        assert!(scheduled[0].1 > Duration::from_secs(3) && scheduled[0].1 <= Duration::from_secs(4));

        let resumed = gateway
            .broadcasts()
            .into_iter()
            .find_map(|m| match m {
                UpdateMessage::GameResumed { time_remaining } => Some(time_remaining),
                _ => None,
            })
            .expect("a resume was broadcast");
        assert!(resumed <= Duration::from_secs(4));
    }

    #[test]
    fn test_pause_outside_active_game_is_ignored() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();

        game.receive_message(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Pause),
            no_alarms,
            &gateway,
        );

        assert!(!game.is_paused());
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GamePaused)),
            0
        );
    }

    #[test]
    fn test_double_pause_is_ignored() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);

        for _ in 0..2 {
            game.receive_message(
                Id::new(),
                IncomingMessage::Host(IncomingHostMessage::Pause),
                no_alarms,
                &gateway,
            );
        }

        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GamePaused)),
            1
        );
    }

    #[test]
    fn test_stop_silences_stale_timer_and_returns_to_lobby() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");
        let scheduled = start(&mut game, &gateway);
        let correct = correct_id(&game);
        answer(&mut game, &gateway, id, &correct);
        gateway.clear();

        game.receive_message(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Stop),
            no_alarms,
            &gateway,
        );
        assert_eq!(game.phase(), Phase::Lobby);
        assert_eq!(game.players[&id].score, 0);
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GameReset)),
            1
        );

        // The question timer armed before the stop must be inert now.
        for (alarm, _) in scheduled {
            game.receive_alarm(alarm, no_alarms, &gateway);
        }
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::TimeUp)),
            0
        );
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::ShowAnswer(_))),
            0
        );
    }

    #[test]
    fn test_repeated_stop_is_a_safe_noop() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        start(&mut game, &gateway);

        for _ in 0..3 {
            game.receive_message(
                Id::new(),
                IncomingMessage::Host(IncomingHostMessage::Stop),
                no_alarms,
                &gateway,
            );
        }

        assert_eq!(game.phase(), Phase::Lobby);
        assert_eq!(
            gateway.count_broadcasts(|m| matches!(m, UpdateMessage::GameReset)),
            3
        );
    }

    #[test]
    fn test_answers_after_results_are_ignored() {
        let mut game = new_game(1);
        let gateway = MockGateway::default();
        let id = join(&mut game, &gateway, "Aki");

        let mut queue: VecDeque<AlarmMessage> =
            start(&mut game, &gateway).into_iter().map(|(a, _)| a).collect();
        while let Some(alarm) = queue.pop_front() {
            let mut next = Vec::new();
            game.receive_alarm(alarm, |a, _| next.push(a), &gateway);
            queue.extend(next);
        }
        assert_eq!(game.phase(), Phase::Results);
        gateway.clear();

        answer(&mut game, &gateway, id, "犬");
        assert!(gateway.directs_to(id).is_empty());
        assert_eq!(game.players[&id].score, 0);
    }

    #[test]
    fn test_hiragana_round_follows_kanji_round_for_same_item() {
        let mut game = new_game(2);
        let gateway = MockGateway::default();
        join(&mut game, &gateway, "Aki");
        let scheduled = start(&mut game, &gateway);
        let first_correct = correct_id(&game);

        // Let the question window expire, then the reveal.
        let mut queue: VecDeque<AlarmMessage> =
            scheduled.into_iter().map(|(a, _)| a).collect();
        for _ in 0..2 {
            let Some(alarm) = queue.pop_front() else { break };
            let mut next = Vec::new();
            game.receive_alarm(alarm, |a, _| next.push(a), &gateway);
            queue.extend(next);
        }

        assert_eq!(game.round_step, RoundStep::Hiragana);
        assert_eq!(correct_id(&game), first_correct);
    }

    #[test]
    fn test_update_message_serializes() {
        let message = UpdateMessage::GameStarted;
        assert!(message.to_message().contains("GameStarted"));

        let question_message = UpdateMessage::GameResumed {
            time_remaining: Duration::from_millis(1234),
        };
        assert!(question_message.to_message().contains("1234"));
    }
}
