use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two seats in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerId {
    Player1,
    Player2,
}

impl PlayerId {
    pub const ALL: [PlayerId; 2] = [PlayerId::Player1, PlayerId::Player2];

    pub fn other(self) -> PlayerId {
        match self {
            PlayerId::Player1 => PlayerId::Player2,
            PlayerId::Player2 => PlayerId::Player1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerId::Player1 => "player1",
            PlayerId::Player2 => "player2",
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player1" => Ok(PlayerId::Player1),
            "player2" => Ok(PlayerId::Player2),
            other => Err(format!("unknown player id `{other}`")),
        }
    }
}

/// Globally unique card instance id, `"{owner}_c{seq:03}"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(owner: PlayerId, sequence: u32) -> Self {
        Self(format!("{}_c{:03}", owner.as_str(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Owner encoded in the id prefix, if the id is well formed.
    pub fn owner(&self) -> Option<PlayerId> {
        let (prefix, _) = self.0.split_once("_c")?;
        prefix.parse().ok()
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for CardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Public,
    OwnerOnly,
    TemporarilyRevealed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Ready,
    Playing,
    Finished,
    Archived,
}

impl SessionStatus {
    fn rank(self) -> u8 {
        match self {
            SessionStatus::Waiting => 0,
            SessionStatus::Ready => 1,
            SessionStatus::Playing => 2,
            SessionStatus::Finished => 3,
            SessionStatus::Archived => 4,
        }
    }

    pub fn accepts_actions(self) -> bool {
        !matches!(self, SessionStatus::Finished | SessionStatus::Archived)
    }

    /// Moves forward to `next` unless that would regress.
    pub fn advance_to(&mut self, next: SessionStatus) {
        if next.rank() > self.rank() {
            *self = next;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialCondition {
    Poisoned,
    Burned,
    Asleep,
    Paralyzed,
    Confused,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialConditions {
    pub poisoned: bool,
    pub burned: bool,
    pub asleep: bool,
    pub paralyzed: bool,
    pub confused: bool,
}

impl SpecialConditions {
    fn slot(&mut self, condition: SpecialCondition) -> &mut bool {
        match condition {
            SpecialCondition::Poisoned => &mut self.poisoned,
            SpecialCondition::Burned => &mut self.burned,
            SpecialCondition::Asleep => &mut self.asleep,
            SpecialCondition::Paralyzed => &mut self.paralyzed,
            SpecialCondition::Confused => &mut self.confused,
        }
    }

    pub fn set(&mut self, condition: SpecialCondition) {
        *self.slot(condition) = true;
    }

    pub fn clear(&mut self, condition: SpecialCondition) {
        *self.slot(condition) = false;
    }

    pub fn clear_all(&mut self) {
        *self = SpecialConditions::default();
    }

    pub fn is_set(&self, condition: SpecialCondition) -> bool {
        match condition {
            SpecialCondition::Poisoned => self.poisoned,
            SpecialCondition::Burned => self.burned,
            SpecialCondition::Asleep => self.asleep,
            SpecialCondition::Paralyzed => self.paralyzed,
            SpecialCondition::Confused => self.confused,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinFace {
    Heads,
    Tails,
}

/// A value kept once per seat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerPlayer<T> {
    pub player1: T,
    pub player2: T,
}

impl<T> PerPlayer<T> {
    pub fn new(player1: T, player2: T) -> Self {
        Self { player1, player2 }
    }

    pub fn get(&self, player: PlayerId) -> &T {
        match player {
            PlayerId::Player1 => &self.player1,
            PlayerId::Player2 => &self.player2,
        }
    }

    pub fn get_mut(&mut self, player: PlayerId) -> &mut T {
        match player {
            PlayerId::Player1 => &mut self.player1,
            PlayerId::Player2 => &mut self.player2,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &T)> {
        [
            (PlayerId::Player1, &self.player1),
            (PlayerId::Player2, &self.player2),
        ]
        .into_iter()
    }
}
