//! Solver-free forcing agents.
//!
//! Forcing agents impose external conditions on the pool: a chemostat-like
//! setpoint, a periodic sine drive, or a periodic injection. They emit the
//! same signed delta as metabolic agents, so the reducer treats every writer
//! alike. Setpoint and oscillatory agents first compute an absolute target
//! count and emit `target - current`; pulsed agents emit their configured
//! amounts directly. [`ForcingAgent::contract`] reports which of the two a
//! given agent uses.

use consortium_types::{
    AgentDelta, DeltaContract, OscillatorySpec, PulsedSpec, SetpointSpec, TargetUnit,
};

use crate::agent::ComputeContext;
use crate::error::AgentError;

/// A forcing agent of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ForcingAgent {
    /// Holds substrates at fixed targets.
    Setpoint(SetpointSpec),
    /// Drives substrate concentrations along sine waves.
    Oscillatory(OscillatorySpec),
    /// Injects fixed amounts every `period` ticks.
    Pulsed(PulsedSpec),
}

impl ForcingAgent {
    /// Validate and wrap a setpoint spec. Targets must be finite and
    /// non-negative.
    pub fn setpoint(spec: SetpointSpec) -> Result<Self, AgentError> {
        for (substrate, target) in &spec.targets {
            check(&spec.name, substrate, *target, true)?;
        }
        Ok(Self::Setpoint(spec))
    }

    /// Validate and wrap an oscillatory spec. Wave parameters must be
    /// finite.
    pub fn oscillatory(spec: OscillatorySpec) -> Result<Self, AgentError> {
        for (substrate, wave) in &spec.waves {
            for value in [
                wave.amplitude,
                wave.angular_frequency,
                wave.phase,
                wave.baseline,
            ] {
                check(&spec.name, substrate, value, false)?;
            }
        }
        Ok(Self::Oscillatory(spec))
    }

    /// Validate and wrap a pulsed spec. The period must be at least one
    /// tick and amounts must be finite.
    pub fn pulsed(spec: PulsedSpec) -> Result<Self, AgentError> {
        if spec.period == 0 {
            return Err(AgentError::ZeroPeriod(spec.name));
        }
        for (substrate, amount) in &spec.amounts {
            check(&spec.name, substrate, *amount, false)?;
        }
        Ok(Self::Pulsed(spec))
    }

    /// Agent name.
    pub fn name(&self) -> &str {
        match self {
            Self::Setpoint(spec) => &spec.name,
            Self::Oscillatory(spec) => &spec.name,
            Self::Pulsed(spec) => &spec.name,
        }
    }

    /// How this agent derives its delta.
    pub const fn contract(&self) -> DeltaContract {
        match self {
            Self::Setpoint(_) | Self::Oscillatory(_) => DeltaContract::TargetCount,
            Self::Pulsed(_) => DeltaContract::DeltaCount,
        }
    }

    /// Compute this tick's delta.
    pub fn compute(&self, ctx: &ComputeContext<'_>) -> AgentDelta {
        let pool = ctx.snapshot;
        match self {
            Self::Setpoint(spec) => spec
                .targets
                .iter()
                .map(|(substrate, target)| {
                    let target = match spec.unit {
                        TargetUnit::Counts => *target,
                        TargetUnit::Concentration => target * pool.volume(),
                    };
                    (substrate.clone(), target - pool.count(substrate))
                })
                .collect(),
            Self::Oscillatory(spec) => spec
                .waves
                .iter()
                .map(|(substrate, wave)| {
                    let target = (wave.value_at(ctx.global_time) * pool.volume()).max(0.0);
                    (substrate.clone(), target - pool.count(substrate))
                })
                .collect(),
            Self::Pulsed(spec) => {
                if spec.fires_at(ctx.tick) {
                    spec.amounts
                        .iter()
                        .map(|(substrate, amount)| (substrate.clone(), *amount))
                        .collect()
                } else {
                    AgentDelta::new()
                }
            }
        }
    }
}

fn check(agent: &str, substrate: &str, value: f64, non_negative: bool) -> Result<(), AgentError> {
    if value.is_finite() && (!non_negative || value >= 0.0) {
        Ok(())
    } else {
        Err(AgentError::InvalidParameter {
            agent: agent.to_owned(),
            field: substrate.to_owned(),
            value,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use consortium_environment::ResourcePool;
    use consortium_types::Wave;

    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn pool(volume: f64, glucose: f64) -> ResourcePool {
        ResourcePool::from_counts(volume, BTreeMap::from([(String::from("glc"), glucose)]))
            .unwrap()
    }

    fn ctx(pool: &ResourcePool, tick: u64) -> ComputeContext<'_> {
        ComputeContext {
            snapshot: pool,
            tick,
            global_time: 0.5 * f64::from(u32::try_from(tick).unwrap()),
            interval: 0.5,
        }
    }

    #[test]
    fn setpoint_restores_target_count() {
        let agent = ForcingAgent::setpoint(SetpointSpec {
            name: String::from("chemostat"),
            targets: BTreeMap::from([(String::from("glc"), 10.0)]),
            unit: TargetUnit::Counts,
        })
        .unwrap();
        let state = pool(1.0, 6.5);
        let delta = agent.compute(&ctx(&state, 3));
        assert!(approx(delta.get("glc").unwrap(), 3.5));
        assert_eq!(agent.contract(), DeltaContract::TargetCount);
    }

    #[test]
    fn setpoint_in_concentration_uses_volume() {
        let agent = ForcingAgent::setpoint(SetpointSpec {
            name: String::from("chemostat"),
            targets: BTreeMap::from([(String::from("glc"), 2.0)]),
            unit: TargetUnit::Concentration,
        })
        .unwrap();
        let state = pool(4.0, 5.0);
        let delta = agent.compute(&ctx(&state, 0));
        assert!(approx(delta.get("glc").unwrap(), 3.0));
    }

    #[test]
    fn negative_setpoint_is_rejected() {
        let result = ForcingAgent::setpoint(SetpointSpec {
            name: String::from("bad"),
            targets: BTreeMap::from([(String::from("glc"), -1.0)]),
            unit: TargetUnit::Counts,
        });
        assert!(matches!(result, Err(AgentError::InvalidParameter { .. })));
    }

    #[test]
    fn oscillatory_target_never_negative() {
        let agent = ForcingAgent::oscillatory(OscillatorySpec {
            name: String::from("wave"),
            waves: BTreeMap::from([(
                String::from("glc"),
                Wave {
                    amplitude: 5.0,
                    angular_frequency: 1.0,
                    phase: -core::f64::consts::FRAC_PI_2,
                    baseline: 1.0,
                },
            )]),
        })
        .unwrap();
        let state = pool(1.0, 3.0);
        // At t = 0 the wave sits at 1 - 5 = -4, so the target clamps to 0.
        let delta = agent.compute(&ctx(&state, 0));
        assert!(approx(delta.get("glc").unwrap(), -3.0));
    }

    #[test]
    fn oscillatory_follows_global_time() {
        let agent = ForcingAgent::oscillatory(OscillatorySpec {
            name: String::from("wave"),
            waves: BTreeMap::from([(
                String::from("glc"),
                Wave {
                    amplitude: 2.0,
                    angular_frequency: core::f64::consts::PI,
                    phase: 0.0,
                    baseline: 5.0,
                },
            )]),
        })
        .unwrap();
        let state = pool(2.0, 0.0);
        // tick 1 -> t = 0.5 -> sin(pi / 2) = 1 -> conc 7 -> count 14.
        let delta = agent.compute(&ctx(&state, 1));
        assert!(approx(delta.get("glc").unwrap(), 14.0));
    }

    #[test]
    fn pulsed_fires_on_schedule_only() {
        let agent = ForcingAgent::pulsed(PulsedSpec {
            name: String::from("injector"),
            period: 5,
            amounts: BTreeMap::from([(String::from("glc"), 80.0)]),
        })
        .unwrap();
        let state = pool(1.0, 0.0);
        assert!(agent.compute(&ctx(&state, 3)).is_empty());
        assert!(approx(agent.compute(&ctx(&state, 4)).get("glc").unwrap(), 80.0));
        assert_eq!(agent.contract(), DeltaContract::DeltaCount);
    }

    #[test]
    fn zero_period_is_rejected() {
        let result = ForcingAgent::pulsed(PulsedSpec {
            name: String::from("injector"),
            period: 0,
            amounts: BTreeMap::new(),
        });
        assert!(matches!(result, Err(AgentError::ZeroPeriod(_))));
    }
}
