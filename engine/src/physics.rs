//! Pure per-tick simulation of the ball and the discrete paddle-move rule.
//!
//! Each tick applies, in order: position integration, lossless top/bottom
//! wall reflection, independent AABB paddle checks, and the side-exit scoring
//! rule. Paddle movement is not part of the tick: it is applied immediately
//! when an input event arrives, so a fast player can move several times
//! between ticks.

use rand::Rng;
use shared::{
    GameVars, MoveDir, Role, BALL_SIZE, BALL_SPEED, FIELD_HEIGHT, FIELD_WIDTH, PADDLE_A_X,
    PADDLE_B_X, PADDLE_HEIGHT, PADDLE_STEP, PADDLE_WIDTH,
};

/// Optional rally acceleration: multiplies ball speed on every paddle bounce,
/// capped at `max_speed` per axis. The baseline engine keeps post-bounce
/// speed constant; this is only applied when explicitly configured.
#[derive(Debug, Clone, Copy)]
pub struct RallyAccel {
    pub factor: f32,
    pub max_speed: f32,
}

/// Advances the continuous state by one fixed tick. Returns the role that
/// scored during this tick, if any.
pub fn step(vars: &mut GameVars, accel: Option<RallyAccel>) -> Option<Role> {
    vars.ball_x += vars.ball_dx;
    vars.ball_y += vars.ball_dy;

    // Perfect bounce off the top and bottom walls.
    if vars.ball_y < 0.0 {
        vars.ball_y = 0.0;
        vars.ball_dy = -vars.ball_dy;
    } else if vars.ball_y + BALL_SIZE > FIELD_HEIGHT {
        vars.ball_y = FIELD_HEIGHT - BALL_SIZE;
        vars.ball_dy = -vars.ball_dy;
    }

    // Each paddle is checked independently; the direction guard ensures the
    // horizontal velocity flips at most once per overlap event.
    if vars.ball_dx < 0.0 && overlaps_paddle(vars, PADDLE_A_X, vars.paddle_a) {
        vars.ball_x = PADDLE_A_X + PADDLE_WIDTH;
        vars.ball_dx = -vars.ball_dx;
        apply_accel(vars, accel);
    }
    if vars.ball_dx > 0.0 && overlaps_paddle(vars, PADDLE_B_X, vars.paddle_b) {
        vars.ball_x = PADDLE_B_X - BALL_SIZE;
        vars.ball_dx = -vars.ball_dx;
        apply_accel(vars, accel);
    }

    // Side exit: the opposite role scores and the ball is re-served from the
    // field midpoint with its horizontal direction flipped.
    if vars.ball_x < 0.0 {
        vars.add_point(Role::B);
        reset_ball(vars);
        Some(Role::B)
    } else if vars.ball_x + BALL_SIZE > FIELD_WIDTH {
        vars.add_point(Role::A);
        reset_ball(vars);
        Some(Role::A)
    } else {
        None
    }
}

/// Moves a paddle by one discrete step, clamped to the field.
pub fn apply_move(vars: &mut GameVars, role: Role, direction: MoveDir) {
    let paddle = match role {
        Role::A => &mut vars.paddle_a,
        Role::B => &mut vars.paddle_b,
    };
    match direction {
        MoveDir::Up => *paddle -= PADDLE_STEP,
        MoveDir::Down => *paddle += PADDLE_STEP,
    }
    *paddle = paddle.clamp(0.0, FIELD_HEIGHT - PADDLE_HEIGHT);
}

fn overlaps_paddle(vars: &GameVars, paddle_x: f32, paddle_y: f32) -> bool {
    vars.ball_x <= paddle_x + PADDLE_WIDTH
        && vars.ball_x + BALL_SIZE >= paddle_x
        && vars.ball_y <= paddle_y + PADDLE_HEIGHT
        && vars.ball_y + BALL_SIZE >= paddle_y
}

fn apply_accel(vars: &mut GameVars, accel: Option<RallyAccel>) {
    if let Some(a) = accel {
        vars.ball_dx = (vars.ball_dx * a.factor).clamp(-a.max_speed, a.max_speed);
        vars.ball_dy = (vars.ball_dy * a.factor).clamp(-a.max_speed, a.max_speed);
    }
}

fn reset_ball(vars: &mut GameVars) {
    // Horizontal direction flips relative to the exit direction; vertical
    // sign is a fresh coin flip. Speed returns to the base magnitude.
    let dx_sign = if vars.ball_dx < 0.0 { 1.0 } else { -1.0 };
    let dy_sign = if rand::thread_rng().gen_bool(0.5) {
        1.0
    } else {
        -1.0
    };
    vars.ball_x = (FIELD_WIDTH - BALL_SIZE) / 2.0;
    vars.ball_y = (FIELD_HEIGHT - BALL_SIZE) / 2.0;
    vars.ball_dx = dx_sign * BALL_SPEED;
    vars.ball_dy = dy_sign * BALL_SPEED;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_ball_stays_within_vertical_bounds() {
        let mut vars = GameVars::new();
        // Pure vertical motion so no point can be scored.
        vars.ball_dx = 0.0;
        vars.ball_dy = BALL_SPEED;

        for _ in 0..10_000 {
            let scored = step(&mut vars, None);
            assert!(scored.is_none());
            assert!(vars.ball_y >= 0.0);
            assert!(vars.ball_y <= FIELD_HEIGHT - BALL_SIZE);
        }
    }

    #[test]
    fn test_wall_reflection_is_lossless() {
        let mut vars = GameVars::new();
        vars.ball_dx = 0.0;
        vars.ball_y = 2.0;
        vars.ball_dy = -BALL_SPEED;

        step(&mut vars, None);

        assert_approx_eq!(vars.ball_y, 0.0);
        assert_approx_eq!(vars.ball_dy, BALL_SPEED);
    }

    #[test]
    fn test_paddle_hit_flips_dx_exactly_once() {
        let mut vars = GameVars::new();
        vars.paddle_a = 150.0;
        vars.ball_x = PADDLE_A_X + PADDLE_WIDTH + 4.0;
        vars.ball_y = 180.0;
        vars.ball_dx = -BALL_SPEED;
        vars.ball_dy = 0.0;

        step(&mut vars, None);

        // Reflected and clamped to the paddle face.
        assert_approx_eq!(vars.ball_x, PADDLE_A_X + PADDLE_WIDTH);
        assert_approx_eq!(vars.ball_dx, BALL_SPEED);

        // The next tick moves the ball away without a second flip.
        step(&mut vars, None);
        assert_approx_eq!(vars.ball_dx, BALL_SPEED);
        assert!(vars.ball_x > PADDLE_A_X + PADDLE_WIDTH);
    }

    #[test]
    fn test_right_paddle_hit_reflects() {
        let mut vars = GameVars::new();
        vars.paddle_b = 150.0;
        vars.ball_x = PADDLE_B_X - BALL_SIZE - 4.0;
        vars.ball_y = 180.0;
        vars.ball_dx = BALL_SPEED;
        vars.ball_dy = 0.0;

        step(&mut vars, None);

        assert_approx_eq!(vars.ball_x, PADDLE_B_X - BALL_SIZE);
        assert_approx_eq!(vars.ball_dx, -BALL_SPEED);
    }

    #[test]
    fn test_left_exit_scores_for_right_side() {
        let mut vars = GameVars::new();
        // Keep the ball clear of the left paddle's vertical extent.
        vars.paddle_a = 0.0;
        vars.ball_x = 0.0;
        vars.ball_y = 200.0;
        vars.ball_dx = -BALL_SPEED;
        vars.ball_dy = 0.0;

        let scored = step(&mut vars, None);

        assert_eq!(scored, Some(Role::B));
        assert_eq!(vars.score_b, 1);
        assert_eq!(vars.score_a, 0);
        assert_approx_eq!(vars.ball_x, (FIELD_WIDTH - BALL_SIZE) / 2.0);
        assert_approx_eq!(vars.ball_y, (FIELD_HEIGHT - BALL_SIZE) / 2.0);
        assert_approx_eq!(vars.ball_dx.abs(), BALL_SPEED);
        assert_approx_eq!(vars.ball_dy.abs(), BALL_SPEED);
        // The exit direction flips for the serve.
        assert!(vars.ball_dx > 0.0);
    }

    #[test]
    fn test_right_exit_scores_for_left_side() {
        let mut vars = GameVars::new();
        vars.paddle_b = 0.0;
        vars.ball_x = FIELD_WIDTH - BALL_SIZE;
        vars.ball_y = 300.0;
        vars.ball_dx = BALL_SPEED;
        vars.ball_dy = 0.0;

        let scored = step(&mut vars, None);

        assert_eq!(scored, Some(Role::A));
        assert_eq!(vars.score_a, 1);
        assert!(vars.ball_dx < 0.0);
    }

    #[test]
    fn test_scores_are_monotonic_over_long_run() {
        let mut vars = GameVars::new();
        let (mut last_a, mut last_b) = (0, 0);

        for _ in 0..5_000 {
            step(&mut vars, None);
            assert!(vars.score_a >= last_a);
            assert!(vars.score_b >= last_b);
            last_a = vars.score_a;
            last_b = vars.score_b;
        }
    }

    #[test]
    fn test_apply_move_steps_and_clamps() {
        let mut vars = GameVars::new();
        let start = vars.paddle_a;

        apply_move(&mut vars, Role::A, MoveDir::Up);
        assert_approx_eq!(vars.paddle_a, start - PADDLE_STEP);

        for _ in 0..100 {
            apply_move(&mut vars, Role::A, MoveDir::Up);
        }
        assert_approx_eq!(vars.paddle_a, 0.0);

        for _ in 0..100 {
            apply_move(&mut vars, Role::B, MoveDir::Down);
        }
        assert_approx_eq!(vars.paddle_b, FIELD_HEIGHT - PADDLE_HEIGHT);
    }

    #[test]
    fn test_rally_accel_speeds_up_and_caps() {
        let accel = RallyAccel {
            factor: 2.0,
            max_speed: 12.0,
        };
        let mut vars = GameVars::new();
        vars.paddle_a = 150.0;
        vars.ball_x = PADDLE_A_X + PADDLE_WIDTH + 4.0;
        vars.ball_y = 180.0;
        vars.ball_dx = -BALL_SPEED;
        vars.ball_dy = 0.0;

        step(&mut vars, Some(accel));

        assert_approx_eq!(vars.ball_dx, 12.0);
    }
}
