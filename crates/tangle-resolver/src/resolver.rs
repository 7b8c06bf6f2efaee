use indexmap::IndexMap;

use tangle_sat::{CancelToken, Solver, Variable};

use crate::entity::{EntityId, EntitySource};
use crate::error::Result;
use crate::generator::ConstraintGenerator;

/// The outcome of a resolution: every variable whose identifier names a
/// known entity appears, `true` meaning it must be installed.
pub type Resolution = IndexMap<EntityId, bool>;

/// Ties an entity source and a constraint generator to the core solver.
pub struct Resolver<S: EntitySource, G: ConstraintGenerator> {
    source: S,
    generator: G,
}

impl<S: EntitySource, G: ConstraintGenerator> Resolver<S, G> {
    pub fn new(source: S, generator: G) -> Self {
        Self { source, generator }
    }

    /// Generate variables, solve, and translate the selection back
    /// into a per-entity install decision.
    pub fn resolve(&self, cancel: &CancelToken) -> Result<Resolution> {
        let variables = self.generator.variables(&self.source)?;
        log::debug!("resolving {} generated variables", variables.len());

        let solver = Solver::new(&variables)?;
        let selection = solver.solve(cancel)?;
        log::info!(
            "resolved {} of {} variables for installation",
            selection.len(),
            variables.len()
        );

        let mut resolution = Resolution::new();
        for variable in &variables {
            let id = EntityId::from(variable.identifier());
            if self.source.get(&id).is_some() {
                resolution.insert(id, false);
            }
        }
        for variable in selection {
            let id = EntityId::from(variable.identifier());
            if self.source.get(&id).is_some() {
                resolution.insert(id, true);
            }
        }
        Ok(resolution)
    }
}
