//! Property tests for the relay engine and round-robin scheduler.

use dcc_relay_decoder::{
    Bank, Operation, RelayBanks, RelayCommand, RelayMode, RelayModeEngine, RelayOutcome,
    RelayOutputs, RoundRobinMask, RoundRobinScheduler,
};
use proptest::prelude::*;

fn arb_mode() -> impl Strategy<Value = RelayMode> {
    (0u8..=255).prop_map(RelayMode::from_cv)
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![Just(Operation::Minus), Just(Operation::Plus)]
}

fn arb_command() -> impl Strategy<Value = u16> {
    prop_oneof![
        8 => (0u16..=31),
        1 => (32u16..=u16::MAX),
    ]
}

proptest! {
    /// Repeating the previous command never changes relay state.
    #[test]
    fn duplicate_is_always_suppressed(
        mode in arb_mode(),
        activation in arb_operation(),
        history in proptest::collection::vec(arb_command(), 0..32),
        command in 0u16..=31,
    ) {
        let mut engine = RelayModeEngine::new(mode, activation);
        let mut banks = RelayBanks::new();
        for c in history {
            engine.apply(c, &mut banks).unwrap();
        }

        engine.apply(command, &mut banks).unwrap();
        let before = banks;
        let rr_before = engine.round_robin_active();

        prop_assert_eq!(engine.apply(command, &mut banks).unwrap(), RelayOutcome::Duplicate);
        prop_assert_eq!(banks, before);
        prop_assert_eq!(engine.round_robin_active(), rr_before);
    }

    /// Exclusive modes never leave more than one relay set per bank.
    #[test]
    fn exclusive_modes_keep_at_most_one_per_bank(
        mode in prop_oneof![Just(RelayMode::Exclusive), Just(RelayMode::ExclusiveRelease)],
        activation in arb_operation(),
        commands in proptest::collection::vec(arb_command(), 1..64),
    ) {
        let mut engine = RelayModeEngine::new(mode, activation);
        let mut banks = RelayBanks::new();
        for c in commands {
            engine.apply(c, &mut banks).unwrap();
            prop_assert!(banks.near.count() <= 1);
            prop_assert!(banks.far.count() <= 1);
        }
    }

    /// Mode 0 activation leaves exactly that relay in its bank and stops round-robin.
    #[test]
    fn mode_zero_activation_is_exclusive(
        activation in arb_operation(),
        history in proptest::collection::vec(arb_command(), 0..32),
        relay in 0u8..16,
    ) {
        let mut engine = RelayModeEngine::new(RelayMode::Exclusive, activation);
        let mut banks = RelayBanks::new();
        for c in history {
            engine.apply(c, &mut banks).unwrap();
        }
        let command = RelayCommand::new(relay, activation).unwrap();
        if engine.previous_command() == Some(command) {
            // A repeat is suppressed; the earlier identical command already applied
            return Ok(());
        }

        engine.apply(command.bits().into(), &mut banks).unwrap();
        let target = command.target();
        let bank = banks.bank(target.bank);
        prop_assert_eq!(bank.count(), 1);
        prop_assert!(bank.is_set(target.index));
        prop_assert!(!engine.round_robin_active());
    }

    /// Independent mode: a relay is set exactly when its last command activated it.
    #[test]
    fn independent_mode_tracks_last_polarity(
        activation in arb_operation(),
        commands in proptest::collection::vec((0u8..16, arb_operation()), 1..64),
    ) {
        let mut engine = RelayModeEngine::new(RelayMode::Independent, activation);
        let mut banks = RelayBanks::new();
        let mut expected = [false; 16];

        for (relay, op) in commands {
            let bits = RelayCommand::new(relay, op).unwrap().bits();
            engine.apply(bits.into(), &mut banks).unwrap();
            expected[usize::from(relay)] = op == activation;
        }

        for relay in 0..16u8 {
            let target = RelayCommand::new(relay, Operation::Plus).unwrap().target();
            prop_assert_eq!(banks.bank(target.bank).is_set(target.index), expected[usize::from(relay)]);
        }
    }

    /// Round-robin leaves exactly one relay per bank, always inside the mask.
    #[test]
    fn round_robin_lights_one_masked_relay(
        near in 0u8..=255,
        far in 0u8..=255,
        steps in 1u32..40,
    ) {
        let near_mask = RoundRobinMask::new(near);
        let far_mask = RoundRobinMask::new(far);
        let mut scheduler = RoundRobinScheduler::new(near_mask, far_mask, 1, 0);
        let mut banks = RelayBanks::new();
        banks.set_relay(Bank::Near, 3).unwrap();

        for second in 1..=steps {
            let step = scheduler.tick(second, true, &mut banks).unwrap().unwrap();
            prop_assert_eq!(banks.near.count(), 1);
            prop_assert_eq!(banks.far.count(), 1);
            prop_assert!(near_mask.contains(step.near));
            prop_assert!(far_mask.contains(7 - step.far));
        }
    }

    /// Between steps the scheduler fires once per interval, whatever the start.
    #[test]
    fn round_robin_fires_once_per_interval(
        start in any::<u32>(),
        interval in 1u8..=30,
        periods in 1u32..8,
    ) {
        let mut scheduler = RoundRobinScheduler::new(
            RoundRobinMask::new(0xFF),
            RoundRobinMask::new(0xFF),
            interval,
            start,
        );
        let mut banks = RelayBanks::new();
        let span = u32::from(interval) * periods;

        let fired = (1..=span)
            .filter(|&s| scheduler.tick(start.wrapping_add(s), true, &mut banks).unwrap().is_some())
            .count();
        prop_assert_eq!(fired as u32, periods);
    }
}
