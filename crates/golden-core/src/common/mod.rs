pub mod scenarios;

pub use scenarios::{
    BUILTIN_SCENARIOS, EXAMPLES_PATH, ScenarioSpec, builtin_scenarios, filter_scenarios,
    load_scenario_manifest,
};
