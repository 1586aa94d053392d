pub struct Math {}

impl Math {
    pub fn mean(nums: &[f64]) -> f64 {
        if nums.is_empty() {
            return 0.0;
        }
        let sum: f64 = nums.iter().sum();
        sum / nums.len() as f64
    }

    /// # round to whole milliseconds
    /// round a millisecond value to the nearest integer, halves away from zero
    pub fn round_to_ms(value: f64) -> u64 {
        if value <= 0.0 {
            return 0;
        }
        value.round() as u64
    }
}
