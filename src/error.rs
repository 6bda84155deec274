//! Error taxonomy for the plugin protocol.
//!
//! Three families, and no retry policy for any of them: every failure in
//! this subsystem indicates a structural misconfiguration, so propagation
//! is always "fail the whole run".
use bnpmix_stats::GeneratorStateError;
use thiserror::Error;

/// Fatal setup-time errors. Each variant names the offending identifier.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no prior attached to the {component} component")]
    MissingPrior { component: &'static str },
    #[error("the sampler has no {component} component installed")]
    MissingComponent { component: &'static str },
    #[error("'{id}' is not a registered {registry} type identifier")]
    UnknownTypeId {
        registry: &'static str,
        id: String,
    },
    #[error("'{name}' is not a registered message type")]
    UnknownMessageType { name: String },
    #[error("could not decode a '{type_name}' prior payload: {source}")]
    MalformedPrior {
        type_name: String,
        #[source]
        source: bincode::Error,
    },
    #[error("invalid prior for the {component} component: {reason}")]
    InvalidPrior {
        component: &'static str,
        reason: String,
    },
    #[error("expected a {expected} prior, found {found}")]
    PriorTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("no plugin module named '{name}' is registered in the runtime")]
    UnknownModule { name: String },
    #[error("plugin module '{module}' is missing the '{entry_point}' entry point")]
    MissingEntryPoint {
        module: String,
        entry_point: &'static str,
    },
    #[error("the {component} component was created but never bound to a module")]
    ModuleNotBound { component: &'static str },
}

/// Programmer errors: contract violations in driver code. The offending
/// operation aborts without mutating component state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("datum id {id} is already a member of this cluster")]
    DuplicateDatum { id: usize },
    #[error("datum id {id} is not a member of this cluster")]
    UnknownDatum { id: usize },
    #[error("{op}() not implemented for a non-conjugate hierarchy")]
    ConjugateOnly { op: &'static str },
    #[error("{op}() is only defined for marginal mixings")]
    MarginalOnly { op: &'static str },
    #[error("{op}() is only defined for conditional mixings")]
    ConditionalOnly { op: &'static str },
}

/// Protocol mismatches between the native and plugin sides. Fatal,
/// surfaced immediately.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("sequence element {index} is not convertible to f64")]
    NonNumeric { index: usize },
    #[error("expected a sequence value")]
    NotASequence,
    #[error("cannot reshape a {len}-element sequence into {n_rows} x {n_cols}")]
    ShapeMismatch {
        len: usize,
        n_rows: usize,
        n_cols: usize,
    },
    #[error("expected a {expected} from plugin entry point '{entry_point}'")]
    BadReturn {
        entry_point: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    GeneratorState(#[from] GeneratorStateError),
    #[error("could not decode a serialized chain state: {0}")]
    ChainDecode(#[source] bincode::Error),
    #[error("could not encode a chain state: {0}")]
    ChainEncode(#[source] bincode::Error),
}

/// Umbrella error for the crate's public surface.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Marshal(#[from] MarshalError),
    /// A plugin entry point reported a failure of its own.
    #[error("plugin entry point '{entry_point}' failed: {message}")]
    Plugin {
        entry_point: &'static str,
        message: String,
    },
}

impl From<GeneratorStateError> for Error {
    fn from(err: GeneratorStateError) -> Self {
        Error::Marshal(MarshalError::GeneratorState(err))
    }
}
