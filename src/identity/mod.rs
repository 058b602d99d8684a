//! Compensation identifier resolution.
//!
//! The identifier must be resolvable whether or not the remote result is
//! available (an error before any response leaves it absent).

use std::marker::PhantomData;

use crate::mutation::Mutation;

/// Picks the identifier used to build the compensate action.
///
/// Implementations must be pure and total.
pub trait IdentityResolver<M: Mutation>: Send + Sync {
    fn resolve(&self, entity: &M::Entity, result: Option<&M::Output>) -> M::Id;
}

impl<M, F> IdentityResolver<M> for F
where
    M: Mutation,
    F: Fn(&M::Entity, Option<&M::Output>) -> M::Id + Send + Sync,
{
    fn resolve(&self, entity: &M::Entity, result: Option<&M::Output>) -> M::Id {
        self(entity, result)
    }
}

/// Default policy: the entity's own identifier, then the result's, then the
/// mutation's fallback extraction.
pub struct DefaultIdentityResolver<M> {
    _mutation: PhantomData<fn() -> M>,
}

impl<M> DefaultIdentityResolver<M> {
    pub fn new() -> Self {
        Self {
            _mutation: PhantomData,
        }
    }
}

impl<M> Default for DefaultIdentityResolver<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for DefaultIdentityResolver<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DefaultIdentityResolver")
    }
}

impl<M: Mutation> IdentityResolver<M> for DefaultIdentityResolver<M> {
    fn resolve(&self, entity: &M::Entity, result: Option<&M::Output>) -> M::Id {
        M::entity_id(entity)
            .or_else(|| result.and_then(M::output_id))
            .unwrap_or_else(|| M::fallback_id(entity))
    }
}
