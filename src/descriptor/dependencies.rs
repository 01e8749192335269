//! # Dependency graph of derived maps
//!
//! Maps computed straight from pointing sets are **Tier-2** ([`DataLevel::L2`]).
//! Maps that combine other maps (spectral index, combined sensors, survival
//! correction) are **Tier-3** ([`DataLevel::L3`]) and need their inputs generated
//! first.
//!
//! [`dependencies_of`] walks an ordered table of guarded rules and applies the
//! first one whose guard matches. Each rule removes one Tier-3 feature
//! (spectral index, combined sensor or survival correction), so repeated
//! expansion always ends on descriptors with no dependencies.
//!
//! ## See also
//! * [`crate::assembly::MapAssembler::generate`] – Recursive consumer of this table.
use std::fmt;

use super::{Instrument, MapDescriptor, PrincipalData, Sensor, SpinPhase, SurvivalCorrection};

/// Processing tier of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataLevel {
    L2,
    L3,
    NotApplicable,
}

impl DataLevel {
    /// Lower-case level token (`l2`, `l3`), `None` for [`DataLevel::NotApplicable`].
    pub fn token(&self) -> Option<&'static str> {
        match self {
            DataLevel::L2 => Some("l2"),
            DataLevel::L3 => Some("l3"),
            DataLevel::NotApplicable => None,
        }
    }
}

impl fmt::Display for DataLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token().unwrap_or("n/a"))
    }
}

struct Rule {
    applies: fn(&MapDescriptor) -> bool,
    expand: fn(&MapDescriptor) -> Vec<MapDescriptor>,
}

const RULES: &[Rule] = &[
    Rule {
        applies: |d| d.principal_data() == PrincipalData::Spx,
        expand: |d| vec![d.with_principal_data(PrincipalData::Ena)],
    },
    Rule {
        applies: |d| d.sensor() == Sensor::Combined,
        expand: |d| vec![d.with_sensor(Sensor::S90), d.with_sensor(Sensor::S45)],
    },
    Rule {
        applies: |d| {
            d.survival_corrected() == SurvivalCorrection::Sp && d.spin_phase() == SpinPhase::Full
        },
        expand: |d| {
            let nsp = d.with_survival_corrected(SurvivalCorrection::Nsp);
            vec![
                nsp.with_spin_phase(SpinPhase::Ram),
                nsp.with_spin_phase(SpinPhase::Anti),
            ]
        },
    },
    Rule {
        applies: |d| d.survival_corrected() == SurvivalCorrection::Sp,
        expand: |d| vec![d.with_survival_corrected(SurvivalCorrection::Nsp)],
    },
];

/// Direct inputs of `descriptor`, in the order they must be generated.
///
/// Return
/// ----------
/// * The dependencies of the first matching rule, or an empty vector for a
///   descriptor computed from pointing sets alone.
pub fn dependencies_of(descriptor: &MapDescriptor) -> Vec<MapDescriptor> {
    RULES
        .iter()
        .find(|rule| (rule.applies)(descriptor))
        .map(|rule| (rule.expand)(descriptor))
        .unwrap_or_default()
}

/// Classify a descriptor into its processing tier.
pub fn tier_of(descriptor: &MapDescriptor) -> DataLevel {
    match descriptor.instrument() {
        Instrument::Glows | Instrument::Idex => DataLevel::NotApplicable,
        _ if descriptor.survival_corrected() == SurvivalCorrection::Sp
            || descriptor.sensor() == Sensor::Combined
            || descriptor.principal_data() == PrincipalData::Spx =>
        {
            DataLevel::L3
        }
        _ => DataLevel::L2,
    }
}

#[cfg(test)]
mod dependencies_test {
    use super::*;
    use crate::descriptor::{FrameDescriptor, MapDuration};
    use proptest::prelude::*;

    fn parse(s: &str) -> MapDescriptor {
        s.parse().unwrap()
    }

    fn encoded(descriptors: Vec<MapDescriptor>) -> Vec<String> {
        descriptors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_spectral_index_depends_on_intensity() {
        let deps = dependencies_of(&parse("hic-spx-h-hf-sp-full-hae-4deg-1yr"));
        assert_eq!(encoded(deps), vec!["hic-ena-h-hf-sp-full-hae-4deg-1yr"]);
    }

    #[test]
    fn test_combined_splits_sensors_90_first() {
        let deps = dependencies_of(&parse("hic-ena-h-hf-sp-full-hae-4deg-1yr"));
        assert_eq!(
            encoded(deps),
            vec![
                "h90-ena-h-hf-sp-full-hae-4deg-1yr",
                "h45-ena-h-hf-sp-full-hae-4deg-1yr"
            ]
        );
    }

    #[test]
    fn test_full_spin_survival_splits_in_ram_and_anti() {
        let deps = dependencies_of(&parse("h90-ena-h-hf-sp-full-hae-4deg-1yr"));
        assert_eq!(
            encoded(deps),
            vec![
                "h90-ena-h-hf-nsp-ram-hae-4deg-1yr",
                "h90-ena-h-hf-nsp-anti-hae-4deg-1yr"
            ]
        );
    }

    #[test]
    fn test_survival_drops_correction() {
        let deps = dependencies_of(&parse("ilo-ena-h-sf-sp-anti-hae-6deg-3mo"));
        assert_eq!(encoded(deps), vec!["ilo-ena-h-sf-nsp-anti-hae-6deg-3mo"]);
    }

    #[test]
    fn test_base_maps_have_no_dependencies() {
        for s in [
            "h45-ena-h-sf-nsp-ram-hae-4deg-6mo",
            "u90-ena-h-hf-nsp-full-hae-nside64-1yr",
            "ilo-ena-h-sf-nsp-full-hae-6deg-1yr",
        ] {
            let descriptor = parse(s);
            assert!(dependencies_of(&descriptor).is_empty(), "{s}");
            assert_eq!(tier_of(&descriptor), DataLevel::L2, "{s}");
        }
    }

    #[test]
    fn test_tier_of() {
        assert_eq!(
            tier_of(&parse("h90-spx-h-sf-nsp-ram-hae-4deg-6mo")),
            DataLevel::L3
        );
        assert_eq!(
            tier_of(&parse("ulc-ena-h-sf-nsp-ram-hae-4deg-6mo")),
            DataLevel::L3
        );
        assert_eq!(
            tier_of(&parse("ilo-ena-h-sf-sp-ram-hae-4deg-6mo")),
            DataLevel::L3
        );
        assert_eq!(
            tier_of(&parse("glx-ena-h-sf-sp-ram-hae-4deg-6mo")),
            DataLevel::NotApplicable
        );
        assert_eq!(
            tier_of(&parse("idx-ena-h-sf-nsp-ram-hae-4deg-6mo")),
            DataLevel::NotApplicable
        );
    }

    #[test]
    fn test_full_expansion_reaches_four_base_maps() {
        let mut frontier = vec![parse("hic-spx-h-hf-sp-full-hae-4deg-1yr")];
        let mut leaves = Vec::new();
        while let Some(descriptor) = frontier.pop() {
            let deps = dependencies_of(&descriptor);
            if deps.is_empty() {
                leaves.push(descriptor.to_string());
            } else {
                frontier.extend(deps.into_iter().rev());
            }
        }
        assert_eq!(
            leaves,
            vec![
                "h90-ena-h-hf-nsp-ram-hae-4deg-1yr",
                "h90-ena-h-hf-nsp-anti-hae-4deg-1yr",
                "h45-ena-h-hf-nsp-ram-hae-4deg-1yr",
                "h45-ena-h-hf-nsp-anti-hae-4deg-1yr",
            ]
        );
    }

    fn arb_tier3() -> impl Strategy<Value = MapDescriptor> {
        (
            prop_oneof![
                Just((Instrument::Hi, Sensor::S45)),
                Just((Instrument::Hi, Sensor::Combined)),
                Just((Instrument::Ultra, Sensor::S90)),
                Just((Instrument::Ultra, Sensor::Combined)),
                Just((Instrument::Lo, Sensor::None)),
            ],
            prop_oneof![Just(PrincipalData::Ena), Just(PrincipalData::Spx)],
            prop_oneof![Just(SurvivalCorrection::Sp), Just(SurvivalCorrection::Nsp)],
            prop_oneof![Just(SpinPhase::Ram), Just(SpinPhase::Anti), Just(SpinPhase::Full)],
        )
            .prop_map(|((instrument, sensor), pd, sp, spin)| {
                MapDescriptor::builder(instrument, sensor)
                    .principal_data(pd)
                    .survival_corrected(sp)
                    .spin_phase(spin)
                    .frame_descriptor(FrameDescriptor::Heliospheric)
                    .duration(MapDuration::Years(1))
                    .build()
                    .unwrap()
            })
    }

    proptest! {
        #[test]
        fn prop_expansion_terminates_on_tier_2_leaves(root in arb_tier3()) {
            let mut frontier = vec![(root, 0usize)];
            while let Some((descriptor, depth)) = frontier.pop() {
                prop_assert!(depth <= 3);
                let deps = dependencies_of(&descriptor);
                if deps.is_empty() {
                    prop_assert_eq!(tier_of(&descriptor), DataLevel::L2);
                } else {
                    prop_assert_eq!(tier_of(&descriptor), DataLevel::L3);
                    frontier.extend(deps.into_iter().map(|d| (d, depth + 1)));
                }
            }
        }
    }
}
