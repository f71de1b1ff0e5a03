/// Nominal time step applied per frame. Not derived from measured frame time.
pub const DEFAULT_FRAME_QUANTUM: f64 = 0.16;

/// Per-channel oscillation speeds, multiplied by the frame quantum each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRates {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Default for ColorRates {
    fn default() -> Self {
        Self {
            red: 0.01,
            green: 0.05,
            blue: 0.03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rising,
    Falling,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Rising => 1.0,
            Direction::Falling => -1.0,
        }
    }

    fn flipped(self) -> Self {
        match self {
            Direction::Rising => Direction::Falling,
            Direction::Falling => Direction::Rising,
        }
    }
}

/// One oscillating color channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    pub value: f64,
    pub direction: Direction,
}

impl Channel {
    pub fn new(value: f64, direction: Direction) -> Self {
        Self { value, direction }
    }

    /// Steps the channel once.
    ///
    /// The bounds test uses the post-step value and the value is never
    /// clamped, so a channel overshoots `[0, 1]` for exactly one step before
    /// its direction turns around.
    pub fn advance(self, rate: f64, quantum: f64) -> Self {
        let value = self.value + rate * quantum * self.direction.sign();
        let direction = if value > 1.0 || value < 0.0 {
            self.direction.flipped()
        } else {
            self.direction
        };
        Self { value, direction }
    }
}

/// Red, green and blue channels driving the clear color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

impl Default for AnimationState {
    /// Black, with every channel rising.
    fn default() -> Self {
        Self {
            red: Channel::new(0.0, Direction::Rising),
            green: Channel::new(0.0, Direction::Rising),
            blue: Channel::new(0.0, Direction::Rising),
        }
    }
}

impl AnimationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure per-frame update shared by every render variant.
    pub fn advance(self, rates: &ColorRates, quantum: f64) -> Self {
        Self {
            red: self.red.advance(rates.red, quantum),
            green: self.green.advance(rates.green, quantum),
            blue: self.blue.advance(rates.blue, quantum),
        }
    }

    /// Clear color with opaque alpha.
    pub fn clear_color(&self) -> [f64; 4] {
        [self.red.value, self.green.value, self.blue.value, 1.0]
    }

    /// Contrasting fill color: each channel inverted, opaque alpha.
    pub fn inverse_color(&self) -> [f32; 4] {
        [
            (1.0 - self.red.value) as f32,
            (1.0 - self.green.value) as f32,
            (1.0 - self.blue.value) as f32,
            1.0,
        ]
    }
}
