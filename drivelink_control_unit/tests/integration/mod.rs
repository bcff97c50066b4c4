//! Shared fixtures for the integration tests.

mod cycle_layer;
mod enforcement;
mod mode_switch;
mod stop_dispatch;

use drivelink_common::config::ConfigLoader;
use drivelink_common::limits::store::{MachineDescription, TomlConfigStore};
use drivelink_control_unit::convert::JointConverters;
use drivelink_control_unit::handle::JointHandle;
use drivelink_control_unit::robot::RobotLayer;
use drivelink_control_unit::sources::LimitSources;
use drivelink_hal::{SimConfig, SimProbe, SimulatedActuator};

/// Simulated joints with identity unit conversion, initialized against `sources`.
pub fn sim_robot(names: &[&str], sources: &LimitSources) -> (RobotLayer, Vec<SimProbe>) {
    let mut robot = RobotLayer::new();
    let mut probes = Vec::with_capacity(names.len());
    for name in names {
        let (actuator, probe) = SimulatedActuator::with_probe(SimConfig::default());
        robot.add_joint(JointHandle::new(
            *name,
            Box::new(actuator),
            JointConverters::identity(),
            true,
        ));
        probes.push(probe);
    }
    robot.init(sources).unwrap();
    (robot, probes)
}

/// Limit sources from in-memory description and limit store documents.
pub fn sources(description: &str, limits: &str) -> LimitSources {
    LimitSources::new(
        Box::new(MachineDescription::load_str(description).unwrap()),
        Box::new(TomlConfigStore::parse(limits).unwrap()),
    )
}
