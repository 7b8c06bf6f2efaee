use tangle_sat::{Constraint, Identifier, Variable};

use crate::entity::EntitySource;
use crate::error::Result;

/// A concrete solver variable keyed by an entity identifier. This is
/// the shape constraint generators produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityVariable {
    id: Identifier,
    constraints: Vec<Constraint>,
}

impl EntityVariable {
    pub fn new(id: impl Into<Identifier>, constraints: Vec<Constraint>) -> Self {
        Self {
            id: id.into(),
            constraints,
        }
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }
}

impl Variable for EntityVariable {
    fn identifier(&self) -> &Identifier {
        &self.id
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

/// Translates entities into solver variables. Implementations decide
/// which entities participate and which constraints apply, typically by
/// inspecting entity properties.
pub trait ConstraintGenerator {
    fn variables(&self, source: &dyn EntitySource) -> Result<Vec<EntityVariable>>;
}

/// Aggregates several generators by concatenating their output in
/// order; the first failure short-circuits.
#[derive(Default)]
pub struct GeneratorAggregate {
    generators: Vec<Box<dyn ConstraintGenerator>>,
}

impl GeneratorAggregate {
    pub fn new(generators: Vec<Box<dyn ConstraintGenerator>>) -> Self {
        Self { generators }
    }

    pub fn push(&mut self, generator: impl ConstraintGenerator + 'static) {
        self.generators.push(Box::new(generator));
    }
}

impl ConstraintGenerator for GeneratorAggregate {
    fn variables(&self, source: &dyn EntitySource) -> Result<Vec<EntityVariable>> {
        let mut variables = Vec::new();
        for generator in &self.generators {
            variables.extend(generator.variables(source)?);
        }
        Ok(variables)
    }
}
