use rand::Rng;


/// Outcome of one sampling decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleDecision {
    /// Record this trace's spans with full payload.
    Sampled,
    /// Record structure only, no tags or enrichment.
    NotSampled,
    /// No opinion; extracted flags or collector-side config decide.
    Defer,
}


/// Bernoulli rate sampler, decided once per trace at root-span creation.
///
/// A rate at or above `1.0` always defers so that unconditional sampling
/// can be configured downstream; a rate at or below `0.0` never samples.
#[derive(Clone, Copy, Debug)]
pub struct Sampler {
    rate: f64,
}

impl Sampler {
    pub fn new(rate: f64) -> Sampler {
        Sampler { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Draw an independent decision with probability `rate` of `Sampled`.
    pub fn decide(&self) -> SampleDecision {
        if self.rate <= 0.0 {
            return SampleDecision::NotSampled;
        }
        if self.rate >= 1.0 {
            return SampleDecision::Defer;
        }
        if rand::thread_rng().gen::<f64>() < self.rate {
            SampleDecision::Sampled
        } else {
            SampleDecision::NotSampled
        }
    }
}
