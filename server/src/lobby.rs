//! Lobby lifecycle: `Waiting -> Countdown -> InProgress -> Waiting`.
//!
//! The lobby owns no timers of its own. It stores deadlines and the server
//! loop calls [`Lobby::poll`] with the current time; every transition clears
//! the deadlines it no longer needs, so a cancelled countdown can never fire
//! later.

use crate::config::LobbyConfig;
use log::info;
use shared::{LobbyStatus, LobbyView, Participant, RejectReason, MAX_NICKNAME_LEN};
use std::time::{Duration, Instant};

/// Something the server loop has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    CountdownStarted,
    /// Whole seconds left, emitted once per second.
    CountdownTick(u32),
    CountdownCancelled,
    /// The countdown finished; these participants become players.
    StartGame(Vec<Participant>),
}

pub struct Lobby {
    config: LobbyConfig,
    status: LobbyStatus,
    participants: Vec<Participant>,
    wait_deadline: Option<Instant>,
    countdown_deadline: Option<Instant>,
    announced: Option<u32>,
}

impl Lobby {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            config: config.normalized(),
            status: LobbyStatus::Waiting,
            participants: Vec::new(),
            wait_deadline: None,
            countdown_deadline: None,
            announced: None,
        }
    }

    pub fn status(&self) -> LobbyStatus {
        self.status
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn is_participant(&self, id: u32) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn has_pending_wait(&self) -> bool {
        self.wait_deadline.is_some()
    }

    /// Adds a participant, possibly kicking off the countdown.
    pub fn join(
        &mut self,
        id: u32,
        nickname: &str,
        now: Instant,
    ) -> Result<Vec<LobbyEvent>, RejectReason> {
        if self.status == LobbyStatus::InProgress {
            return Err(RejectReason::GameInProgress);
        }
        if self.is_participant(id) {
            return Err(RejectReason::AlreadyJoined);
        }
        let nickname = validate_nickname(nickname)?;
        if self.participants.len() >= self.config.max_players {
            return Err(RejectReason::LobbyFull);
        }
        if self
            .participants
            .iter()
            .any(|p| p.nickname.eq_ignore_ascii_case(&nickname))
        {
            return Err(RejectReason::NicknameTaken);
        }

        info!("{} joined the lobby as {}", id, nickname);
        self.participants.push(Participant { id, nickname });

        let mut events = Vec::new();
        if self.status == LobbyStatus::Waiting {
            if self.participants.len() >= self.config.max_players {
                events.push(self.start_countdown(now));
            } else if self.participants.len() >= self.config.min_players
                && self.wait_deadline.is_none()
            {
                self.wait_deadline = Some(now + self.config.wait_time);
            }
        }
        Ok(events)
    }

    /// Removes a participant. Returns `None` if `id` was not in the lobby.
    pub fn leave(&mut self, id: u32) -> Option<Vec<LobbyEvent>> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        let participant = self.participants.remove(index);
        info!("{} ({}) left the lobby", participant.nickname, id);

        let mut events = Vec::new();
        if self.participants.len() < self.config.min_players {
            self.wait_deadline = None;
            if self.status == LobbyStatus::Countdown {
                info!("Countdown cancelled, not enough players");
                self.reset_to_waiting();
                events.push(LobbyEvent::CountdownCancelled);
            }
        }
        Some(events)
    }

    /// Fires whatever deadlines have passed by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<LobbyEvent> {
        let mut events = Vec::new();
        match self.status {
            LobbyStatus::Waiting => {
                if self.wait_deadline.is_some_and(|deadline| now >= deadline) {
                    events.push(self.start_countdown(now));
                }
            }
            LobbyStatus::Countdown => {
                let Some(deadline) = self.countdown_deadline else {
                    return events;
                };
                if now >= deadline {
                    events.push(self.begin_game());
                } else {
                    let remaining = whole_seconds(deadline - now);
                    if self.announced != Some(remaining) {
                        self.announced = Some(remaining);
                        events.push(LobbyEvent::CountdownTick(remaining));
                    }
                }
            }
            LobbyStatus::InProgress => {}
        }
        events
    }

    /// Returns to `Waiting` with an empty roster after a game ends.
    pub fn finish_game(&mut self) {
        self.participants.clear();
        self.reset_to_waiting();
    }

    pub fn countdown_remaining(&self, now: Instant) -> Option<u32> {
        match (self.status, self.countdown_deadline) {
            (LobbyStatus::Countdown, Some(deadline)) => {
                Some(whole_seconds(deadline.saturating_duration_since(now)))
            }
            _ => None,
        }
    }

    pub fn view(&self, now: Instant) -> LobbyView {
        LobbyView {
            status: self.status,
            participants: self.participants.clone(),
            countdown_remaining: self.countdown_remaining(now),
        }
    }

    fn start_countdown(&mut self, now: Instant) -> LobbyEvent {
        info!(
            "Starting {}s countdown with {} players",
            self.config.countdown.as_secs(),
            self.participants.len()
        );
        self.status = LobbyStatus::Countdown;
        self.wait_deadline = None;
        self.countdown_deadline = Some(now + self.config.countdown);
        self.announced = Some(whole_seconds(self.config.countdown));
        LobbyEvent::CountdownStarted
    }

    /// Moves straight to `InProgress`, handing the roster over.
    pub fn begin_game(&mut self) -> LobbyEvent {
        self.status = LobbyStatus::InProgress;
        self.wait_deadline = None;
        self.countdown_deadline = None;
        self.announced = None;
        LobbyEvent::StartGame(std::mem::take(&mut self.participants))
    }

    fn reset_to_waiting(&mut self) {
        self.status = LobbyStatus::Waiting;
        self.wait_deadline = None;
        self.countdown_deadline = None;
        self.announced = None;
    }
}

fn whole_seconds(duration: Duration) -> u32 {
    duration.as_secs_f64().ceil() as u32
}

fn validate_nickname(raw: &str) -> Result<String, RejectReason> {
    let nickname = raw.trim();
    let length = nickname.chars().count();
    if length == 0 || length > MAX_NICKNAME_LEN || nickname.chars().any(char::is_control) {
        return Err(RejectReason::InvalidNickname);
    }
    Ok(nickname.to_string())
}
