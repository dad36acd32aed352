//! A yield-based reference model and the model library.
//!
//! [`LinearYieldModel`] is not a linear-programming solver. It captures the
//! part of flux balance the coordination engine depends on: uptake bounded
//! by the exchange reactions, growth proportional to uptake, and byproduct
//! secretion proportional to growth. Models are plain serde data so they
//! can be written in YAML or JSON next to the simulation config:
//!
//! ```yaml
//! id: ecoli_core
//! objective: BIOMASS
//! reactions:
//!   EX_glc__D_e: { lower: -10, upper: 1000, exchange: true }
//!   EX_ac_e: { lower: 0, upper: 1000, exchange: true, genes: [b2296] }
//!   BIOMASS: { lower: 0, upper: 1000 }
//! yields: { EX_glc__D_e: 0.09 }
//! byproducts: { EX_ac_e: 3.0 }
//! ```
//!
//! Solving fixes knocked-out reactions at zero, takes `max(0, -lower)` as
//! the uptake of every yield reaction, sums `yield * uptake` into growth
//! capped by the objective's upper bound (scaling uptake down when the cap
//! binds), and sets every exchange flux to
//! `-uptake + coefficient * growth` clipped into its bounds.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use consortium_types::Bounds;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, SolveError};
use crate::model::{FluxSolution, MetabolicModel, ModelLoader};

/// Default upper flux bound, the usual "unconstrained" value.
const DEFAULT_UPPER: f64 = 1000.0;

const fn default_upper() -> f64 {
    DEFAULT_UPPER
}

/// One reaction of a [`LinearYieldModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionDef {
    /// Lower flux bound. Negative values on an exchange reaction allow
    /// uptake.
    #[serde(default)]
    pub lower: f64,
    /// Upper flux bound.
    #[serde(default = "default_upper")]
    pub upper: f64,
    /// Genes whose knockout disables this reaction.
    #[serde(default)]
    pub genes: Vec<String>,
    /// Whether this reaction exchanges a metabolite with the environment.
    #[serde(default)]
    pub exchange: bool,
}

impl ReactionDef {
    /// A reaction with the given bounds and no genes.
    pub const fn new(lower: f64, upper: f64, exchange: bool) -> Self {
        Self {
            lower,
            upper,
            genes: Vec::new(),
            exchange,
        }
    }
}

/// Growth-yield model: growth is a weighted sum of uptake fluxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearYieldModel {
    /// Model identifier.
    #[serde(default)]
    pub id: String,
    /// Objective (growth) reaction.
    pub objective: String,
    /// Reactions by identifier.
    pub reactions: BTreeMap<String, ReactionDef>,
    /// Growth per unit uptake, keyed by uptake reaction.
    #[serde(default)]
    pub yields: BTreeMap<String, f64>,
    /// Secretion per unit growth, keyed by exchange reaction.
    #[serde(default)]
    pub byproducts: BTreeMap<String, f64>,
    #[serde(skip)]
    knocked_out: BTreeSet<String>,
}

impl LinearYieldModel {
    /// Build a model from its parts.
    pub fn new(
        id: impl Into<String>,
        objective: impl Into<String>,
        reactions: BTreeMap<String, ReactionDef>,
        yields: BTreeMap<String, f64>,
        byproducts: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            id: id.into(),
            objective: objective.into(),
            reactions,
            yields,
            byproducts,
            knocked_out: BTreeSet::new(),
        }
    }

    /// Parse a model from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ModelError> {
        serde_yml::from_str(yaml).map_err(|e| ModelError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })
    }

    /// Read a model file, choosing the format by extension.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let is_json = match format.as_deref() {
            Some("yaml" | "yml") => false,
            Some("json") => true,
            _ => return Err(ModelError::UnsupportedFormat(path.to_path_buf())),
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_yml::from_str(&contents).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| ModelError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Check that every referenced reaction exists and every number is
    /// usable.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.reactions.contains_key(&self.objective) {
            return Err(self.unknown_reaction(&self.objective));
        }
        for (id, reaction) in &self.reactions {
            if reaction.lower.is_nan() || reaction.upper.is_nan() {
                return Err(self.invalid(format!("reaction {id} has a NaN bound")));
            }
        }
        for (id, coefficient) in self.yields.iter().chain(&self.byproducts) {
            if !self.reactions.contains_key(id) {
                return Err(self.unknown_reaction(id));
            }
            if !coefficient.is_finite() || *coefficient < 0.0 {
                return Err(self.invalid(format!("coefficient for {id} is {coefficient}")));
            }
        }
        Ok(())
    }

    fn unknown_reaction(&self, reaction: &str) -> ModelError {
        ModelError::UnknownReaction {
            model: self.id.clone(),
            reaction: reaction.to_owned(),
        }
    }

    fn invalid(&self, reason: String) -> ModelError {
        ModelError::Invalid {
            model: self.id.clone(),
            reason,
        }
    }

    /// Bounds in force for a reaction, honoring knockouts.
    fn effective_bounds(&self, id: &str, reaction: &ReactionDef) -> (f64, f64) {
        if self.knocked_out.contains(id) {
            (0.0, 0.0)
        } else {
            (reaction.lower, reaction.upper)
        }
    }
}

impl MetabolicModel for LinearYieldModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn has_reaction(&self, reaction: &str) -> bool {
        self.reactions.contains_key(reaction)
    }

    fn bounds(&self, reaction: &str) -> Result<Bounds, ModelError> {
        let def = self
            .reactions
            .get(reaction)
            .ok_or_else(|| self.unknown_reaction(reaction))?;
        let (lower, upper) = self.effective_bounds(reaction, def);
        Ok(Bounds::new(lower, upper))
    }

    fn set_bounds(&mut self, reaction: &str, bounds: Bounds) -> Result<(), ModelError> {
        if !self.reactions.contains_key(reaction) {
            return Err(self.unknown_reaction(reaction));
        }
        if let Some(def) = self.reactions.get_mut(reaction) {
            if let Some(lower) = bounds.lower {
                def.lower = lower;
            }
            if let Some(upper) = bounds.upper {
                def.upper = upper;
            }
        }
        Ok(())
    }

    fn knock_out_gene(&mut self, gene: &str) -> Result<(), ModelError> {
        let hits: Vec<String> = self
            .reactions
            .iter()
            .filter(|(_, def)| def.genes.iter().any(|g| g == gene))
            .map(|(id, _)| id.clone())
            .collect();
        if hits.is_empty() {
            return Err(ModelError::UnknownGene {
                model: self.id.clone(),
                gene: gene.to_owned(),
            });
        }
        debug!(model = %self.id, gene, reactions = hits.len(), "Gene knocked out");
        self.knocked_out.extend(hits);
        Ok(())
    }

    fn knock_out_reaction(&mut self, reaction: &str) -> Result<(), ModelError> {
        if !self.reactions.contains_key(reaction) {
            return Err(self.unknown_reaction(reaction));
        }
        self.knocked_out.insert(reaction.to_owned());
        Ok(())
    }

    fn exchange_reactions(&self) -> Vec<String> {
        self.reactions
            .iter()
            .filter(|(_, def)| def.exchange)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn objective_reaction(&self) -> &str {
        &self.objective
    }

    fn optimize(&mut self) -> Result<FluxSolution, SolveError> {
        let mut bounds = BTreeMap::new();
        for (id, def) in &self.reactions {
            let (lower, upper) = self.effective_bounds(id, def);
            if lower > upper {
                return Err(SolveError::Infeasible(format!(
                    "reaction {id} has lower bound {lower} above upper bound {upper}"
                )));
            }
            bounds.insert(id.as_str(), (lower, upper));
        }

        let (objective_lower, objective_upper) = bounds
            .get(self.objective.as_str())
            .copied()
            .unwrap_or((0.0, 0.0));

        let mut uptakes: BTreeMap<&str, f64> = BTreeMap::new();
        let mut potential = 0.0;
        for (id, coefficient) in &self.yields {
            let lower = bounds.get(id.as_str()).map_or(0.0, |(lower, _)| *lower);
            let uptake = (-lower).max(0.0);
            uptakes.insert(id.as_str(), uptake);
            potential += coefficient * uptake;
        }
        if !potential.is_finite() {
            return Err(SolveError::Unbounded(format!(
                "uptake into {} is not bounded",
                self.objective
            )));
        }

        let growth = potential.min(objective_upper);
        if growth < objective_lower {
            return Err(SolveError::Infeasible(format!(
                "growth {growth} below required {objective_lower}"
            )));
        }
        // Scale uptake back when the objective cap binds.
        let scale = if potential > 0.0 {
            growth / potential
        } else {
            0.0
        };

        let mut fluxes = BTreeMap::new();
        for (id, (lower, upper)) in &bounds {
            let uptake = uptakes.get(id).copied().unwrap_or(0.0) * scale;
            let secretion = self.byproducts.get(*id).copied().unwrap_or(0.0) * growth;
            let flux = if *id == self.objective {
                growth
            } else {
                (secretion - uptake).max(*lower).min(*upper)
            };
            fluxes.insert((*id).to_owned(), flux);
        }

        Ok(FluxSolution {
            objective_value: growth,
            fluxes,
        })
    }
}

/// Resolves model references to [`LinearYieldModel`] definitions.
///
/// Every load returns an independent clone, so agents never share a
/// model's bound state.
#[derive(Debug, Clone, Default)]
pub struct ModelLibrary {
    models: BTreeMap<String, LinearYieldModel>,
}

impl ModelLibrary {
    /// Create an empty library.
    pub const fn new() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Register a model under `reference` after validating it.
    ///
    /// A model with an empty `id` takes the reference as its id.
    pub fn register(
        &mut self,
        reference: impl Into<String>,
        mut model: LinearYieldModel,
    ) -> Result<(), ModelError> {
        let reference = reference.into();
        if model.id.is_empty() {
            model.id.clone_from(&reference);
        }
        model.validate()?;
        debug!(reference = %reference, reactions = model.reactions.len(), "Model registered");
        self.models.insert(reference, model);
        Ok(())
    }

    /// Read a model file and register it under `reference`.
    pub fn load_file(&mut self, reference: impl Into<String>, path: &Path) -> Result<(), ModelError> {
        let model = LinearYieldModel::from_file(path)?;
        self.register(reference, model)
    }

    /// Build a library from a `reference -> path` table, resolving
    /// relative paths against `base`.
    pub fn from_paths(paths: &BTreeMap<String, PathBuf>, base: &Path) -> Result<Self, ModelError> {
        let mut library = Self::new();
        for (reference, path) in paths {
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                base.join(path)
            };
            library.load_file(reference.clone(), &resolved)?;
        }
        Ok(library)
    }

    /// Whether `reference` is registered.
    pub fn contains(&self, reference: &str) -> bool {
        self.models.contains_key(reference)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelLoader for ModelLibrary {
    fn load(&self, model_ref: &str) -> Result<Box<dyn MetabolicModel>, ModelError> {
        self.models
            .get(model_ref)
            .map(|model| Box::new(model.clone()) as Box<dyn MetabolicModel>)
            .ok_or_else(|| ModelError::UnknownModel(model_ref.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn glucose_model() -> LinearYieldModel {
        LinearYieldModel::from_yaml_str(
            r"
id: toy
objective: BIOMASS
reactions:
  EX_glc: { lower: -10, upper: 1000, exchange: true }
  EX_ac: { lower: 0, upper: 1000, exchange: true, genes: [ackA] }
  BIOMASS: { lower: 0, upper: 1000 }
  PFK: { lower: -5, upper: 5, genes: [pfkA] }
yields: { EX_glc: 0.1 }
byproducts: { EX_ac: 2.0 }
",
        )
        .unwrap()
    }

    #[test]
    fn growth_follows_uptake() {
        let mut model = glucose_model();
        let solution = model.optimize().unwrap();
        assert!(approx(solution.objective_value, 1.0));
        assert!(approx(solution.flux("EX_glc"), -10.0));
        assert!(approx(solution.flux("EX_ac"), 2.0));
        assert!(approx(solution.flux("PFK"), 0.0));
    }

    #[test]
    fn closed_uptake_gives_no_growth() {
        let mut model = glucose_model();
        model.set_bounds("EX_glc", Bounds::lower(0.0)).unwrap();
        let solution = model.optimize().unwrap();
        assert!(approx(solution.objective_value, 0.0));
        assert!(approx(solution.flux("EX_glc"), 0.0));
    }

    #[test]
    fn objective_cap_scales_uptake() {
        let mut model = glucose_model();
        model
            .set_bounds("BIOMASS", Bounds {
                lower: None,
                upper: Some(0.5),
            })
            .unwrap();
        let solution = model.optimize().unwrap();
        assert!(approx(solution.objective_value, 0.5));
        assert!(approx(solution.flux("EX_glc"), -5.0));
    }

    #[test]
    fn crossed_bounds_are_infeasible() {
        let mut model = glucose_model();
        model.set_bounds("PFK", Bounds::new(3.0, 1.0)).unwrap();
        assert!(matches!(model.optimize(), Err(SolveError::Infeasible(_))));
    }

    #[test]
    fn required_growth_without_uptake_is_infeasible() {
        let mut model = glucose_model();
        model.set_bounds("BIOMASS", Bounds::lower(0.5)).unwrap();
        model.set_bounds("EX_glc", Bounds::lower(0.0)).unwrap();
        assert!(matches!(model.optimize(), Err(SolveError::Infeasible(_))));
    }

    #[test]
    fn unlimited_uptake_is_unbounded() {
        let mut model = glucose_model();
        model
            .set_bounds("EX_glc", Bounds::lower(f64::NEG_INFINITY))
            .unwrap();
        model
            .set_bounds("BIOMASS", Bounds {
                lower: None,
                upper: Some(f64::INFINITY),
            })
            .unwrap();
        assert!(matches!(model.optimize(), Err(SolveError::Unbounded(_))));
    }

    #[test]
    fn gene_knockout_disables_reaction() {
        let mut model = glucose_model();
        model.knock_out_gene("ackA").unwrap();
        let solution = model.optimize().unwrap();
        assert!(approx(solution.flux("EX_ac"), 0.0));
        assert!(approx(solution.objective_value, 1.0));
        assert!(matches!(
            model.knock_out_gene("nope"),
            Err(ModelError::UnknownGene { .. })
        ));
    }

    #[test]
    fn reaction_knockout_stops_growth() {
        let mut model = glucose_model();
        model.knock_out_reaction("EX_glc").unwrap();
        let solution = model.optimize().unwrap();
        assert!(approx(solution.objective_value, 0.0));
        let bounds = model.bounds("EX_glc").unwrap();
        assert_eq!(bounds.lower.map(|l| approx(l, 0.0)), Some(true));
    }

    #[test]
    fn unknown_reaction_is_reported() {
        let mut model = glucose_model();
        assert!(matches!(
            model.set_bounds("nope", Bounds::lower(0.0)),
            Err(ModelError::UnknownReaction { .. })
        ));
    }

    #[test]
    fn exchange_reactions_are_listed() {
        let model = glucose_model();
        assert_eq!(model.exchange_reactions(), vec!["EX_ac", "EX_glc"]);
        assert_eq!(model.objective_reaction(), "BIOMASS");
    }

    #[test]
    fn library_loads_independent_copies() {
        let mut library = ModelLibrary::new();
        library.register("toy", glucose_model()).unwrap();
        let mut first = library.load("toy").unwrap();
        let second = library.load("toy").unwrap();
        first.knock_out_reaction("EX_glc").unwrap();
        assert!(second.bounds("EX_glc").unwrap().lower.is_some_and(|l| l < 0.0));
        assert!(matches!(
            library.load("missing"),
            Err(ModelError::UnknownModel(_))
        ));
    }

    #[test]
    fn library_rejects_dangling_objective() {
        let mut library = ModelLibrary::new();
        let mut model = glucose_model();
        model.objective = String::from("GROWTH");
        assert!(library.register("bad", model).is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = LinearYieldModel::from_file(Path::new("model.sbml"));
        assert!(matches!(result, Err(ModelError::UnsupportedFormat(_))));
    }
}
