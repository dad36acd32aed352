//! Model files on disk and the agents built from them.
//!
//! Loads the bundled `models/ecoli_core.yaml`, round-trips a model
//! through a JSON file, and checks that knockouts carried in an agent's
//! change set reach the solver.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use consortium_agents::{
    Agent, ComputeContext, MetabolicModel, ModelError, ModelLibrary, ModelLoader,
};
use consortium_environment::ResourcePool;
use consortium_types::{AgentSpec, Kinetics, MetabolicSpec, ModelChanges};

fn bundled_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/ecoli_core.yaml")
}

fn library() -> ModelLibrary {
    let mut library = ModelLibrary::new();
    library.load_file("ecoli_core", &bundled_model()).unwrap();
    library
}

fn spec(changes: ModelChanges) -> AgentSpec {
    AgentSpec::Metabolic(MetabolicSpec {
        name: String::from("E.coli"),
        model: String::from("ecoli_core"),
        kinetics: BTreeMap::from([(String::from("D-Glucose"), Kinetics::new(0.5, 10.0))]),
        reaction_map: BTreeMap::from([(String::from("D-Glucose"), String::from("EX_glc__D_e"))]),
        bounds: BTreeMap::new(),
        changes,
    })
}

fn pool() -> ResourcePool {
    ResourcePool::from_counts(
        1.0,
        BTreeMap::from([(String::from("D-Glucose"), 20.0), (String::from("E.coli"), 1.0)]),
    )
    .unwrap()
}

fn ctx(pool: &ResourcePool) -> ComputeContext<'_> {
    ComputeContext {
        snapshot: pool,
        tick: 0,
        global_time: 0.0,
        interval: 1.0,
    }
}

#[test]
fn bundled_model_loads() {
    let library = library();
    let model: Box<dyn MetabolicModel> = library.load("ecoli_core").unwrap();
    assert_eq!(model.id(), "ecoli_core");
    assert_eq!(model.objective_reaction(), "BIOMASS_Ecoli_core");
    assert_eq!(model.exchange_reactions().len(), 3);
}

#[test]
fn json_model_file_loads() {
    let yaml = std::fs::read_to_string(bundled_model()).unwrap();
    let model: serde_json::Value = serde_yml::from_str(&yaml).unwrap();
    let path = std::env::temp_dir().join(format!("consortium-model-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

    let mut library = ModelLibrary::new();
    let loaded = library.load_file("from_json", &path);
    std::fs::remove_file(&path).unwrap();
    loaded.unwrap();
    assert!(library.contains("from_json"));
}

#[test]
fn unknown_extension_is_rejected() {
    let mut library = ModelLibrary::new();
    assert!(matches!(
        library.load_file("x", &PathBuf::from("model.sbml")),
        Err(ModelError::UnsupportedFormat(_))
    ));
}

#[test]
fn wild_type_grows_on_glucose() {
    let library = library();
    let mut agent = Agent::from_spec(spec(ModelChanges::default()), &library).unwrap();
    let pool = pool();
    let output = agent.compute(&ctx(&pool));
    assert!(output.failure.is_none());
    assert!(output.delta.get("E.coli").unwrap() > 0.0);
    assert!(output.delta.get("D-Glucose").unwrap() < 0.0);
}

#[test]
fn gene_knockout_blocks_uptake() {
    let library = library();
    let changes = ModelChanges {
        gene_knockouts: vec![String::from("ptsG")],
        ..ModelChanges::default()
    };
    let mut agent = Agent::from_spec(spec(changes), &library).unwrap();
    let pool = pool();
    let output = agent.compute(&ctx(&pool));
    assert!(output.failure.is_none());
    assert!(output.delta.get("E.coli").unwrap().abs() < 1e-12);
    assert!(output.delta.get("D-Glucose").unwrap().abs() < 1e-12);
}

#[test]
fn each_agent_gets_its_own_model_copy() {
    let library = library();
    let mut first = library.load("ecoli_core").unwrap();
    first.knock_out_reaction("EX_glc__D_e").unwrap();
    let second = library.load("ecoli_core").unwrap();
    let bounds = second.bounds("EX_glc__D_e").unwrap();
    assert!(bounds.lower.unwrap() < 0.0);
}
