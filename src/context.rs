use rand::Rng;


/// Sampling decision flags carried without span identity.
///
/// A tri-state `sampled` flag distinguishes an explicit upstream decision
/// from "no opinion, defer to the local sampler".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplingFlags {
    sampled: Option<bool>,
    debug: bool,
}

impl SamplingFlags {
    /// Flags carrying no decision at all.
    pub fn empty() -> SamplingFlags {
        SamplingFlags::default()
    }

    /// Flags with an explicit positive sampling decision.
    pub fn sampled() -> SamplingFlags {
        SamplingFlags {
            sampled: Some(true),
            debug: false,
        }
    }

    /// Flags with an explicit negative sampling decision.
    pub fn not_sampled() -> SamplingFlags {
        SamplingFlags {
            sampled: Some(false),
            debug: false,
        }
    }

    /// Build flags from raw parts.
    pub fn new(sampled: Option<bool>, debug: bool) -> SamplingFlags {
        SamplingFlags { sampled, debug }
    }

    /// The sampling decision, if one was made.
    pub fn is_sampled(&self) -> Option<bool> {
        self.sampled
    }

    /// The debug flag forces collection regardless of sampling.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// True when neither a decision nor the debug flag is present.
    pub fn is_empty(&self) -> bool {
        self.sampled.is_none() && !self.debug
    }
}


/// Propagatable identity of one span within a trace.
///
/// The trace ID is fixed for the whole trace while each span receives its
/// own 64-bit ID. Contexts are immutable once created: child contexts are
/// derived with `TraceContext::child_of`, never by mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: u128,
    span_id: u64,
    parent_id: Option<u64>,
    flags: SamplingFlags,
}

impl TraceContext {
    /// Create the root context of a brand new trace.
    pub fn new_root(flags: SamplingFlags) -> TraceContext {
        let mut rng = rand::thread_rng();
        TraceContext {
            trace_id: rng.gen::<u128>(),
            span_id: rng.gen::<u64>(),
            parent_id: None,
            flags,
        }
    }

    /// Derive the context of a direct child span.
    ///
    /// The child shares the parent's trace ID and sampling flags and
    /// records the parent's span ID for linkage.
    pub fn child_of(parent: &TraceContext) -> TraceContext {
        TraceContext {
            trace_id: parent.trace_id,
            span_id: rand::thread_rng().gen::<u64>(),
            parent_id: Some(parent.span_id),
            flags: parent.flags,
        }
    }

    /// Rebuild a context from propagated parts.
    pub fn with_ids(
        trace_id: u128,
        span_id: u64,
        parent_id: Option<u64>,
        flags: SamplingFlags,
    ) -> TraceContext {
        TraceContext {
            trace_id,
            span_id,
            parent_id,
            flags,
        }
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.parent_id
    }

    pub fn flags(&self) -> SamplingFlags {
        self.flags
    }

    /// True only for an explicit positive decision.
    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled() == Some(true) || self.flags.is_debug()
    }

    /// Canonical 32 character lower-hex trace ID.
    pub fn trace_id_hex(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    /// Canonical 16 character lower-hex span ID.
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// Canonical 16 character lower-hex parent span ID, if any.
    pub fn parent_id_hex(&self) -> Option<String> {
        self.parent_id.map(|id| format!("{:016x}", id))
    }
}
