use serde::{Deserialize, Serialize};

pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 400.0;
pub const BALL_SIZE: f32 = 10.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 80.0;
pub const PADDLE_MARGIN: f32 = 20.0;
pub const PADDLE_STEP: f32 = 20.0;
pub const BALL_SPEED: f32 = 8.0;
pub const WIN_SCORE: u32 = 5;
pub const TICK_HZ: u32 = 30;

/// X of the left paddle's left edge; the face the ball bounces off is at
/// `PADDLE_A_X + PADDLE_WIDTH`.
pub const PADDLE_A_X: f32 = PADDLE_MARGIN;
/// X of the right paddle's left edge.
pub const PADDLE_B_X: f32 = FIELD_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH;

/// The two playable paddle slots in a session. `A` defends the left side,
/// `B` the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    A,
    B,
}

impl Role {
    pub fn opponent(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Waiting,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDir {
    Up,
    Down,
}

/// Continuous game state. Positions are the top-left corner of each shape in
/// field pixels; velocities are in pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameVars {
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_dx: f32,
    pub ball_dy: f32,
    pub paddle_a: f32,
    pub paddle_b: f32,
    pub score_a: u32,
    pub score_b: u32,
}

impl GameVars {
    pub fn new() -> Self {
        Self {
            ball_x: (FIELD_WIDTH - BALL_SIZE) / 2.0,
            ball_y: (FIELD_HEIGHT - BALL_SIZE) / 2.0,
            ball_dx: BALL_SPEED,
            ball_dy: BALL_SPEED,
            paddle_a: (FIELD_HEIGHT - PADDLE_HEIGHT) / 2.0,
            paddle_b: (FIELD_HEIGHT - PADDLE_HEIGHT) / 2.0,
            score_a: 0,
            score_b: 0,
        }
    }

    pub fn score(&self, role: Role) -> u32 {
        match role {
            Role::A => self.score_a,
            Role::B => self.score_b,
        }
    }

    pub fn add_point(&mut self, role: Role) {
        match role {
            Role::A => self.score_a += 1,
            Role::B => self.score_b += 1,
        }
    }
}

impl Default for GameVars {
    fn default() -> Self {
        Self::new()
    }
}

/// Full-state payload handed to joiners and attached to lifecycle broadcasts,
/// so late joiners and spectators see consistent state rather than deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: SessionStatus,
    pub vars: GameVars,
    pub player_a: Option<String>,
    pub player_b: Option<String>,
    pub spectators: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server
    Join {
        session_id: String,
        display_name: Option<String>,
        spectator: bool,
        user_id: Option<i64>,
    },
    QuickMatch,
    Input {
        direction: MoveDir,
    },
    RematchRequest,
    RematchAccept,
    RematchDecline,
    /// Keep-alive so idle spectators are not swept as inactive.
    Ping,
    Disconnect,

    // Server -> client
    Joined {
        role: Option<Role>,
        snapshot: Snapshot,
    },
    QuickMatched {
        session_id: String,
        waiting: bool,
    },
    PlayersUpdated {
        player_a: Option<String>,
        player_b: Option<String>,
        spectators: u32,
    },
    StateUpdate {
        vars: GameVars,
    },
    GameStarted {
        snapshot: Snapshot,
    },
    GameResumed {
        snapshot: Snapshot,
    },
    RematchStarted {
        snapshot: Snapshot,
    },
    GameEnded {
        winner: Role,
        score_a: u32,
        score_b: u32,
    },
    RematchRequested {
        role: Role,
    },
    RematchDeclined {
        role: Role,
    },
}
