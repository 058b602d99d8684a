//! Type bundle describing one kind of entity mutation.
//!
//! Every opaque value the orchestrator moves around (entity, call options,
//! remote result, request handle, action, compensation identifier) is pinned
//! by an associated type here, so adapters and hooks for the same mutation
//! agree on their signatures.

/// One kind of remote entity mutation.
///
/// Implement on a marker type:
///
/// ```rust,ignore
/// struct CreateUser;
///
/// impl Mutation for CreateUser {
///     type Entity = NewUser;
///     type Options = HttpOptions;
///     type Output = User;
///     type Request = RequestRecord;
///     type Action = StoreAction;
///     type Id = UserId;
///
///     fn output_id(user: &User) -> Option<UserId> {
///         Some(user.id.clone())
///     }
///
///     fn fallback_id(user: &NewUser) -> UserId {
///         UserId::provisional(&user.email)
///     }
/// }
/// ```
pub trait Mutation: Send + Sync + 'static {
    /// Payload supplied by the caller.
    type Entity: Send + Sync + 'static;
    /// Transport-specific configuration, passed through to the remote call.
    type Options: Send + Sync + 'static;
    /// Value returned by the remote call.
    type Output: Send + Sync + 'static;
    /// Handle produced by the request lifecycle "create" step.
    type Request: Send + Sync + 'static;
    /// Local action emitted for downstream consumers.
    type Action: Clone + Send + Sync + 'static;
    /// Identifier used to build the compensate action.
    type Id: Send + Sync + 'static;

    /// Identifier the entity already carries, if any.
    fn entity_id(_entity: &Self::Entity) -> Option<Self::Id> {
        None
    }

    /// Identifier assigned by the remote side, if any.
    fn output_id(_output: &Self::Output) -> Option<Self::Id> {
        None
    }

    /// Identity extraction used when neither the entity nor the result
    /// carries an identifier.
    fn fallback_id(entity: &Self::Entity) -> Self::Id;
}
