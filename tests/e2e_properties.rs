//! Property tests for field invariants: set limits, enum membership and
//! the boolean / timestamp round trips between representations.

use gizmo::{Field, FieldKind, FieldOptions, Representation, SetOutcome, Value};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_attempt_past_set_max_is_noop(set_max in 0u32..8, values in prop::collection::vec(any::<i64>(), 0..8)) {
        let mut field = Field::integer(Value::Null, FieldOptions::default().with_set_max(set_max));
        for (i, v) in values.iter().take(set_max as usize).enumerate() {
            prop_assert!(field.set(*v).is_accepted(), "attempt {} rejected", i + 1);
        }
        for _ in values.len().min(set_max as usize)..set_max as usize {
            let _ = field.set(0);
        }

        let before = field.value();
        let outcome = field.set(12345);
        prop_assert!(!outcome.is_accepted());
        prop_assert_eq!(field.value(), before);
    }

    #[test]
    fn prop_changed_iff_raw_differs(initial in "[a-z]{1,6}", next in "[a-z]{1,6}") {
        let mut field = Field::string(initial.as_str(), FieldOptions::default());
        prop_assert!(!field.changed());
        let _ = field.set(next.as_str());
        prop_assert_eq!(field.changed(), initial != next);
    }

    #[test]
    fn prop_enum_only_accepts_members(candidate in "[a-e]") {
        let allowed = ["a", "c", "e"];
        let mut field = Field::enumeration(allowed, Value::Null, FieldOptions::default()).unwrap();
        let before = field.value();
        let outcome = field.set(candidate.as_str());

        if allowed.contains(&candidate.as_str()) {
            prop_assert_eq!(outcome, SetOutcome::Accepted);
            prop_assert_eq!(field.value(), Value::from(candidate.as_str()));
        } else {
            prop_assert!(!outcome.is_accepted());
            prop_assert_eq!(field.value(), before);
        }
    }

    #[test]
    fn prop_timestamp_native_stable_through_transport(millis in 1_000i64..4_102_444_800_000) {
        let field = Field::time_stamp(Value::Int(millis), FieldOptions::default());
        let native = field.value_as(Representation::Native);
        let transport = field.value_as(Representation::Transport);

        let reloaded = Field::time_stamp(transport, FieldOptions::default());
        prop_assert_eq!(reloaded.value_as(Representation::Native), native.clone());

        // native seconds scaled back up lose at most the sub-second part
        let seconds = native.as_int().unwrap();
        let rescaled = Field::time_stamp(Value::Int(seconds * 1000), FieldOptions::default());
        prop_assert_eq!(rescaled.value_as(Representation::Native), native);
        prop_assert!(millis - seconds * 1000 < 1000);
    }

    #[test]
    fn prop_integer_transport_matches_native(n in -1_000_000i64..1_000_000) {
        let field = Field::new(FieldKind::Integer, Value::from(n.to_string()), FieldOptions::default());
        prop_assert_eq!(field.value_as(Representation::Transport), field.value_as(Representation::Native));
    }
}

#[test]
fn test_boolean_transport_round_trip() {
    for literal in ["true", "false"] {
        let transport = Field::boolean(literal, FieldOptions::default()).value_as(Representation::Transport);
        let native = Field::boolean(transport.clone(), FieldOptions::default()).value_as(Representation::Native);
        let again = Field::boolean(native, FieldOptions::default()).value_as(Representation::Transport);
        assert_eq!(again, transport);
        assert_eq!(transport, Value::from(literal));
    }
}
