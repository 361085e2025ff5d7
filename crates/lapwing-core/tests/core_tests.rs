#![cfg(test)]

// ============================================================
// LAP LEDGER
// ============================================================

mod ledger_tests {
    use lapwing_core::{DetectionOutcome, LapLedger, TimingParams, MAX_LAPS};

    const TIMING: TimingParams = TimingParams {
        min_lap_time_ms: 170,
        grace_period_ms: 30,
    };

    mod debounce {
        use super::*;

        #[test]
        fn detections_within_min_lap_time_should_not_register_a_lap() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 0, -80, &TIMING);
            ledger.record_detection(0, 100, -70, &TIMING);

            assert_eq!(ledger.lap_count(), 0, "100ms after the boundary is within the 170ms window");
        }

        #[test]
        fn detection_past_min_lap_time_should_register_a_lap() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 0, -80, &TIMING);
            ledger.record_detection(0, 100, -70, &TIMING);
            let outcome = ledger.record_detection(0, 250, -75, &TIMING);

            assert_eq!(outcome, DetectionOutcome::NewLap(1));
            assert_eq!(ledger.lap_count(), 1);
            assert_eq!(ledger.current().start_offset_ms, 250, "new lap starts at the crossing");
        }

        #[test]
        fn debounce_should_measure_from_lap_boundary_not_last_seen() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 0, -80, &TIMING);
            // seen at 100, but the boundary is still at 0
            ledger.record_detection(0, 100, -70, &TIMING);
            let outcome = ledger.record_detection(0, 250, -75, &TIMING);

            assert_eq!(
                outcome,
                DetectionOutcome::NewLap(1),
                "250ms from the boundary exceeds 170ms even though only 150ms passed since last seen"
            );
        }

        #[test]
        fn race_start_offset_should_shift_all_boundaries() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(1_000, 1_000, -80, &TIMING);
            let outcome = ledger.record_detection(1_000, 1_250, -75, &TIMING);

            assert_eq!(outcome, DetectionOutcome::NewLap(1));
            assert_eq!(ledger.current().start_offset_ms, 250);
        }
    }

    mod refinement {
        use super::*;

        #[test]
        fn stronger_signal_within_grace_should_move_the_boundary() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 250, -75, &TIMING);
            let outcome = ledger.record_detection(0, 260, -60, &TIMING);

            assert_eq!(outcome, DetectionOutcome::Refined);
            assert_eq!(ledger.lap_count(), 1, "refinement does not add a lap");
            assert_eq!(ledger.current().start_offset_ms, 260);
        }

        #[test]
        fn weaker_signal_within_grace_should_not_move_the_boundary() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 250, -75, &TIMING);
            ledger.record_detection(0, 260, -60, &TIMING);
            let outcome = ledger.record_detection(0, 265, -70, &TIMING);

            assert_eq!(outcome, DetectionOutcome::Seen);
            assert_eq!(ledger.current().start_offset_ms, 260);
        }

        #[test]
        fn stronger_signal_past_grace_should_not_move_the_boundary() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 250, -75, &TIMING);
            let outcome = ledger.record_detection(0, 300, -40, &TIMING);

            assert_eq!(outcome, DetectionOutcome::Seen, "50ms is past the 30ms grace window");
            assert_eq!(ledger.current().start_offset_ms, 250);
        }

        #[test]
        fn refinement_should_reset_last_seen_to_the_new_boundary() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 250, -75, &TIMING);
            ledger.record_detection(0, 260, -60, &TIMING);

            assert_eq!(ledger.current().last_seen_offset_ms, 0);
        }
    }

    mod manual_adjustment {
        use super::*;

        #[test]
        fn increment_should_add_a_lap_with_non_decreasing_boundary() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 250, -75, &TIMING);
            assert!(ledger.increment_manual(0, 300, &TIMING));

            assert_eq!(ledger.lap_count(), 2);
            assert!(
                ledger.current().start_offset_ms >= 250,
                "manual boundary must not precede the previous one"
            );
        }

        #[test]
        fn decrement_should_floor_at_zero() {
            let mut ledger = LapLedger::new();
            assert!(!ledger.decrement_manual());
            assert_eq!(ledger.lap_count(), 0);
        }

        #[test]
        fn decrement_then_detection_should_recount_the_lap() {
            let mut ledger = LapLedger::new();
            ledger.record_detection(0, 250, -75, &TIMING);
            assert!(ledger.decrement_manual());
            assert_eq!(ledger.lap_count(), 0);

            let outcome = ledger.record_detection(0, 500, -70, &TIMING);
            assert_eq!(outcome, DetectionOutcome::NewLap(1));
        }
    }

    mod capacity {
        use super::*;

        #[test]
        fn ledger_should_fold_detections_once_full() {
            let mut ledger = LapLedger::new();
            let mut t = 0u64;
            for _ in 0..MAX_LAPS - 1 {
                t += 200;
                assert_ne!(
                    ledger.record_detection(0, t, -70, &TIMING),
                    DetectionOutcome::LedgerFull
                );
            }
            assert_eq!(ledger.lap_count(), MAX_LAPS - 1);

            t += 200;
            assert_eq!(
                ledger.record_detection(0, t, -70, &TIMING),
                DetectionOutcome::LedgerFull
            );
            assert_eq!(ledger.lap_count(), MAX_LAPS - 1, "lap count saturates");
        }
    }

    mod snapshot_records {
        use super::*;
        use lapwing_core::Lap;

        #[test]
        fn from_records_should_reject_count_beyond_array() {
            let laps = vec![Lap::default()];
            assert!(LapLedger::from_records(laps, 1).is_none());
        }

        #[test]
        fn from_records_should_rebuild_lap_state() {
            let mut original = LapLedger::new();
            original.record_detection(0, 250, -75, &TIMING);
            original.record_detection(0, 500, -70, &TIMING);

            let rebuilt =
                LapLedger::from_records(original.laps().to_vec(), original.lap_count()).unwrap();
            assert_eq!(rebuilt.lap_count(), 2);
            assert_eq!(rebuilt.current().start_offset_ms, 500);
        }
    }
}

// ============================================================
// RACE CLOCK
// ============================================================

mod clock_tests {
    use lapwing_core::RaceClock;

    #[test]
    fn clock_should_never_move_backward() {
        let mut clock = RaceClock::new(10_000);
        assert!(!clock.set_ms(5_000), "a backward set must be refused");
        assert!(clock.now_ms() >= 10_000);
    }

    #[test]
    fn clock_should_accept_forward_sets() {
        let mut clock = RaceClock::new(10_000);
        assert!(clock.set_ms(20_000));
        assert!(clock.now_ms() >= 20_000);
    }
}

// ============================================================
// TAG REGISTRY
// ============================================================

mod registry_tests {
    use lapwing_core::{ActivationState, TagRegistry};

    fn roster() -> TagRegistry {
        TagRegistry::from_roster([
            ("aa:bb:cc:dd:ee:01".to_string(), "alpha".to_string()),
            ("aa:bb:cc:dd:ee:02".to_string(), "bravo".to_string()),
        ])
    }

    #[test]
    fn lookup_should_resolve_known_addresses() {
        let registry = roster();
        assert_eq!(registry.lookup("aa:bb:cc:dd:ee:02"), Some(1));
        assert_eq!(registry.lookup("aa:bb:cc:dd:ee:99"), None);
    }

    #[test]
    fn reset_race_should_clear_progress_but_keep_identity() {
        let mut registry = roster();
        registry.get_mut(0).activation = ActivationState::Active;
        registry.get_mut(0).connected = true;

        registry.reset_race();

        let p = registry.get(0);
        assert_eq!(p.activation, ActivationState::Unregistered);
        assert!(!p.connected);
        assert_eq!(p.name, "alpha", "identity survives a race reset");
        assert_eq!(p.ledger.lap_count(), 0);
    }
}

// ============================================================
// MESSAGE SERIALIZATION
// ============================================================

mod message_tests {
    use lapwing_core::CoordinatorMessage;

    #[test]
    fn messages_should_round_trip_through_json() {
        let msg = CoordinatorMessage::RaceStart { epoch_ms: 123_456 };
        let json = serde_json::to_string(&msg).unwrap();
        let back: CoordinatorMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, CoordinatorMessage::RaceStart { epoch_ms: 123_456 }));
    }

    #[test]
    fn unknown_message_kind_should_be_rejected() {
        let json = r#"{"kind":"SelfDestruct"}"#;
        let result: Result<CoordinatorMessage, _> = serde_json::from_str(json);
        assert!(result.is_err(), "unrecognized kinds fail deserialization instead of being silently accepted");
    }
}
