/// Fixed size circular buffer, each push overwrites the oldest slot.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: Vec<f32>,
    index: usize,
    filled: usize,
}

impl RollingWindow {
    /// `size` must be at least 1
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size.max(1)],
            index: 0,
            filled: 0,
        }
    }

    pub fn push(&mut self, value: f32) {
        self.values[self.index] = value;
        self.index = (self.index + 1) % self.values.len();
        self.filled = (self.filled + 1).min(self.values.len());
    }

    /// mean over the whole window, slots not written yet count as zero
    pub fn average(&self) -> f32 {
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// mean over the slots written so far
    pub fn filled_average(&self) -> Option<f32> {
        if self.filled == 0 {
            return None;
        }
        if self.filled == self.values.len() {
            return Some(self.average());
        }
        // before wrapping around the written slots are 0..filled
        Some(self.values[..self.filled].iter().sum::<f32>() / self.filled as f32)
    }
}
