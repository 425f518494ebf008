use crate::carrier::MapCarrier;
use crate::context::SamplingFlags;
use crate::context::TraceContext;


const TRACE_ID_KEY: &str = "x-b3-traceid";
const SPAN_ID_KEY: &str = "x-b3-spanid";
const PARENT_SPAN_ID_KEY: &str = "x-b3-parentspanid";
const SAMPLED_KEY: &str = "x-b3-sampled";
const DEBUG_FLAG_KEY: &str = "x-b3-flags";


/// Outcome of extracting trace state from a carrier.
///
/// Extraction never fails hard: malformed or missing identifiers degrade
/// to the sampling flags that could still be read. "Nothing found" is
/// `Flags` with empty flags, which callers can detect with
/// `Extraction::is_empty`.
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction {
    /// All required identifiers were present and well formed.
    Context(TraceContext),
    /// Identifiers were absent or malformed; only flags were usable.
    Flags(SamplingFlags),
}

impl Extraction {
    /// True when the carrier held no usable trace state at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Extraction::Context(_) => false,
            Extraction::Flags(flags) => flags.is_empty(),
        }
    }
}


/// Write a context into a carrier using the canonical B3 keys.
pub fn inject(context: &TraceContext, carrier: &mut dyn MapCarrier) {
    carrier.set(TRACE_ID_KEY, &context.trace_id_hex());
    carrier.set(SPAN_ID_KEY, &context.span_id_hex());
    if let Some(parent) = context.parent_id_hex() {
        carrier.set(PARENT_SPAN_ID_KEY, &parent);
    }
    match context.flags().is_sampled() {
        Some(true) => carrier.set(SAMPLED_KEY, "1"),
        Some(false) => carrier.set(SAMPLED_KEY, "0"),
        None => (),
    }
    if context.flags().is_debug() {
        carrier.set(DEBUG_FLAG_KEY, "1");
    }
}

/// Read trace state back out of a carrier.
///
/// Returns a full `TraceContext` when trace and span IDs are present and
/// well formed, sampling flags otherwise. A malformed parent ID is
/// treated as absent rather than invalidating the whole context.
pub fn extract(carrier: &dyn MapCarrier) -> Extraction {
    let flags = extract_flags(carrier);
    let trace_id = carrier.get(TRACE_ID_KEY).and_then(|id| parse_trace_id(&id));
    let span_id = carrier.get(SPAN_ID_KEY).and_then(|id| parse_span_id(&id));
    match (trace_id, span_id) {
        (Some(trace_id), Some(span_id)) => {
            let parent_id = carrier
                .get(PARENT_SPAN_ID_KEY)
                .and_then(|id| parse_span_id(&id));
            Extraction::Context(TraceContext::with_ids(
                trace_id, span_id, parent_id, flags,
            ))
        }
        _ => Extraction::Flags(flags),
    }
}

fn extract_flags(carrier: &dyn MapCarrier) -> SamplingFlags {
    let sampled = carrier
        .get(SAMPLED_KEY)
        .and_then(|value| match value.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        });
    let debug = carrier
        .get(DEBUG_FLAG_KEY)
        .map(|value| value.trim() == "1")
        .unwrap_or(false);
    SamplingFlags::new(sampled, debug)
}

/// Trace IDs are 32 (128-bit) or 16 (64-bit legacy) lower-hex characters.
fn parse_trace_id(value: &str) -> Option<u128> {
    let value = value.trim();
    match value.len() {
        16 | 32 => u128::from_str_radix(value, 16).ok(),
        _ => None,
    }
}

fn parse_span_id(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.len() != 16 {
        return None;
    }
    u64::from_str_radix(value, 16).ok()
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::super::context::SamplingFlags;
    use super::super::context::TraceContext;

    use super::extract;
    use super::inject;
    use super::Extraction;


    fn roundtrip(context: &TraceContext) -> Extraction {
        let mut map: HashMap<String, String> = HashMap::new();
        inject(context, &mut map);
        extract(&map)
    }


    #[test]
    fn roundtrip_full_context() {
        let context = TraceContext::with_ids(
            0x463ac35c9f6413ad48485a3953bb6124,
            0x0020000000000001,
            Some(0x0010000000000001),
            SamplingFlags::sampled(),
        );
        match roundtrip(&context) {
            Extraction::Context(extracted) => assert_eq!(extracted, context),
            other => panic!("expected a full context, got {:?}", other),
        }
    }

    #[test]
    fn roundtrip_not_sampled() {
        let context = TraceContext::new_root(SamplingFlags::not_sampled());
        match roundtrip(&context) {
            Extraction::Context(extracted) => {
                assert_eq!(extracted.flags().is_sampled(), Some(false));
            }
            other => panic!("expected a full context, got {:?}", other),
        }
    }

    #[test]
    fn unknown_sampling_extracts_as_unknown() {
        let context = TraceContext::new_root(SamplingFlags::empty());
        match roundtrip(&context) {
            Extraction::Context(extracted) => {
                assert_eq!(extracted.flags().is_sampled(), None);
            }
            other => panic!("expected a full context, got {:?}", other),
        }
    }

    #[test]
    fn empty_carrier_extracts_empty_flags() {
        let map: HashMap<String, String> = HashMap::new();
        let extraction = extract(&map);
        assert!(extraction.is_empty());
        assert_eq!(extraction, Extraction::Flags(SamplingFlags::empty()));
    }

    #[test]
    fn flags_only_carrier() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(String::from("X-B3-Sampled"), String::from("1"));
        let extraction = extract(&map);
        assert!(!extraction.is_empty());
        assert_eq!(extraction, Extraction::Flags(SamplingFlags::sampled()));
    }

    #[test]
    fn debug_flag_survives() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(String::from("x-b3-flags"), String::from("1"));
        match extract(&map) {
            Extraction::Flags(flags) => assert!(flags.is_debug()),
            other => panic!("expected flags, got {:?}", other),
        }
    }

    #[test]
    fn malformed_ids_degrade_to_flags() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(String::from("x-b3-traceid"), String::from("not-hex"));
        map.insert(String::from("x-b3-spanid"), String::from("0020000000000001"));
        map.insert(String::from("x-b3-sampled"), String::from("0"));
        let extraction = extract(&map);
        assert_eq!(extraction, Extraction::Flags(SamplingFlags::not_sampled()));
    }

    #[test]
    fn missing_span_id_degrades_to_flags() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(
            String::from("x-b3-traceid"),
            String::from("463ac35c9f6413ad48485a3953bb6124"),
        );
        match extract(&map) {
            Extraction::Flags(_) => (),
            other => panic!("expected flags, got {:?}", other),
        }
    }

    #[test]
    fn malformed_parent_is_ignored() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(
            String::from("x-b3-traceid"),
            String::from("463ac35c9f6413ad48485a3953bb6124"),
        );
        map.insert(String::from("x-b3-spanid"), String::from("0020000000000001"));
        map.insert(String::from("x-b3-parentspanid"), String::from("xyz"));
        match extract(&map) {
            Extraction::Context(context) => assert!(context.parent_id().is_none()),
            other => panic!("expected a context, got {:?}", other),
        }
    }

    #[test]
    fn short_trace_id_is_accepted() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert(String::from("x-b3-traceid"), String::from("0000000000000001"));
        map.insert(String::from("x-b3-spanid"), String::from("0000000000000002"));
        match extract(&map) {
            Extraction::Context(context) => {
                assert_eq!(context.trace_id(), 1);
                assert_eq!(context.span_id(), 2);
            }
            other => panic!("expected a context, got {:?}", other),
        }
    }
}
