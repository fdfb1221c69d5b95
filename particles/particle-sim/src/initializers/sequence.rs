//! Sheet sequence initializers

use std::any::Any;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::operator::{Initializer, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// How [`RandomSequence`] walks its range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SequenceOrder {
    /// Independent draw per particle
    #[default]
    Random,
    /// Every value once per round, in random order
    Shuffle,
    /// `min, min + 1, ..., max`, then wrap
    Linear,
}

/// Sequence range, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomSequenceConfig {
    pub min: i32,
    pub max: i32,
    pub order: SequenceOrder,
}

#[derive(Debug, Default)]
struct SequenceCursor {
    order: Vec<i32>,
    current: usize,
}

impl SequenceCursor {
    fn next(&mut self, config: &RandomSequenceConfig, state: &mut ParticleState) -> i32 {
        if self.order.is_empty() || self.current >= self.order.len() {
            self.refill(config, state);
        }
        let value = self.order.get(self.current).copied().unwrap_or(config.min);
        self.current += 1;
        value
    }

    fn refill(&mut self, config: &RandomSequenceConfig, state: &mut ParticleState) {
        self.order = (config.min..=config.max.max(config.min)).collect();
        self.current = 0;
        if config.order == SequenceOrder::Shuffle {
            for i in (1..self.order.len()).rev() {
                let j = state.random.random_int(0, i as i32) as usize;
                self.order.swap(i, j.min(i));
            }
        }
    }
}

/// Picks a sheet sequence per particle
#[derive(Debug, Clone, Default)]
pub struct RandomSequence {
    config: RandomSequenceConfig,
}

impl RandomSequence {
    pub fn new(config: RandomSequenceConfig) -> Self {
        Self { config }
    }

    fn clamp(&self, state: &ParticleState, sequence: i32) -> i32 {
        match state.sheet().map(|sheet| sheet.sequence_count()) {
            Some(count) if count > 0 => sequence.clamp(0, count as i32 - 1),
            _ => sequence,
        }
    }
}

impl OperatorInfo for RandomSequence {
    fn name(&self) -> &'static str {
        "Sequence Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::SEQUENCE_NUMBER
    }

    fn create_context(&self) -> Option<Box<dyn Any + Send + Sync>> {
        match self.config.order {
            SequenceOrder::Random => None,
            SequenceOrder::Shuffle | SequenceOrder::Linear => {
                Some(Box::new(SequenceCursor::default()))
            }
        }
    }
}

impl Initializer for RandomSequence {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        for particle in start..start + count {
            let sequence = match ctx.data_mut::<SequenceCursor>() {
                Some(cursor) => cursor.next(&self.config, state),
                None => state.random.random_int(self.config.min, self.config.max),
            };
            let sequence = self.clamp(state, sequence);
            state
                .store
                .set_float(ParticleAttribute::SequenceNumber, particle, sequence as f32);
        }
    }
}

/// Playback rate used to turn a sequence into a lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct SequenceLifetimeConfig {
    pub frames_per_second: f32,
}

impl Default for SequenceLifetimeConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 30.0,
        }
    }
}

/// Sets the lifetime so a particle lives for exactly one play of its
/// sequence
#[derive(Debug, Clone, Default)]
pub struct SequenceLifetime {
    config: SequenceLifetimeConfig,
}

impl SequenceLifetime {
    pub fn new(config: SequenceLifetimeConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for SequenceLifetime {
    fn name(&self) -> &'static str {
        "Lifetime From Sequence"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::LIFE_DURATION
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::SEQUENCE_NUMBER
    }
}

impl Initializer for SequenceLifetime {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let fps = self.config.frames_per_second;
        let Some(sheet) = state.sheet().cloned() else {
            return;
        };
        if fps == 0.0 {
            return;
        }

        for particle in start..start + count {
            let sequence = state
                .store
                .float(ParticleAttribute::SequenceNumber, particle)
                .max(0.0) as usize;
            let span = sheet.frame_span(sequence);
            let lifetime = if span != 0.0 { span / fps } else { 1.0 };
            state
                .store
                .set_float(ParticleAttribute::LifeDuration, particle, lifetime);
        }
    }

    fn init_multiple_override(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sequence: &RandomSequence, count: usize) -> Vec<i32> {
        let mut state = ParticleState::for_tests(AttributeMask::SEQUENCE_NUMBER, 32);
        let mut data = sequence.create_context();
        let mut ctx = OperatorContext::new(data.as_deref_mut(), None, false);
        let range = state.spawn(count);
        sequence.init_scalar(&mut state, range.start, range.len(), AttributeMask::all(), &mut ctx);
        (0..count)
            .map(|p| state.store.float(ParticleAttribute::SequenceNumber, p) as i32)
            .collect()
    }

    #[test]
    fn test_linear_wraps() {
        let sequence = RandomSequence::new(RandomSequenceConfig {
            min: 2,
            max: 4,
            order: SequenceOrder::Linear,
        });
        assert_eq!(run(&sequence, 7), vec![2, 3, 4, 2, 3, 4, 2]);
    }

    #[test]
    fn test_shuffle_visits_every_value_per_round() {
        let sequence = RandomSequence::new(RandomSequenceConfig {
            min: 0,
            max: 5,
            order: SequenceOrder::Shuffle,
        });
        let values = run(&sequence, 12);
        for round in values.chunks(6) {
            let mut sorted = round.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn test_random_within_range() {
        let sequence = RandomSequence::new(RandomSequenceConfig {
            min: 1,
            max: 3,
            order: SequenceOrder::Random,
        });
        assert!(run(&sequence, 20).iter().all(|s| (1..=3).contains(s)));
    }

    #[test]
    fn test_lifetime_without_sheet_is_untouched() {
        let mut state = ParticleState::for_tests(
            AttributeMask::SEQUENCE_NUMBER | AttributeMask::LIFE_DURATION,
            4,
        );
        state.spawn(1);
        state.store.set_float(ParticleAttribute::LifeDuration, 0, 3.0);
        SequenceLifetime::default().init_scalar(
            &mut state,
            0,
            1,
            AttributeMask::all(),
            &mut OperatorContext::detached(),
        );
        assert_eq!(state.store.float(ParticleAttribute::LifeDuration, 0), 3.0);
    }
}
