/// Car resets accumulated during the current lap. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetCounter {
    value: u32,
}

impl ResetCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self) {
        self.value = self.value.saturating_add(1);
    }

    pub fn decrement(&mut self) {
        self.value = self.value.saturating_sub(1);
    }

    pub fn reset(&mut self, value: u32) {
        self.value = value;
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}
