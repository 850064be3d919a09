//! Stereo balance - head of the chain, currently a pass-through

use crate::stage::{ignore_parameter, Stage};

#[derive(Debug, Default)]
pub struct StereoBalance {
    enabled: bool,
    destroyed: bool,
}

impl StereoBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserved flag; has no audible effect yet
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Stage for StereoBalance {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "enabled" => self.set_enabled(value >= 0.5),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {}

    fn destroy(&mut self) {
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "stereoBalance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_either_way() {
        let mut balance = StereoBalance::new();
        let mut block = vec![0.5, -0.25];
        balance.process(&mut block);
        assert_eq!(block, vec![0.5, -0.25]);

        balance.set_parameter("enabled", 1.0);
        assert!(balance.is_enabled());
        balance.process(&mut block);
        assert_eq!(block, vec![0.5, -0.25]);
    }
}
