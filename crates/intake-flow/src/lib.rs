#![allow(missing_docs)]

pub mod error;
pub mod registry;
pub mod resolver;
pub mod session;

pub use error::{FlowError, ResolveError, SessionOutcome};
pub use registry::SessionRegistry;
pub use resolver::{
    EffectivePage, EffectiveTemplate, TemplateSelector, resolve_effective_template,
};
pub use session::{PageSummary, Session, SessionStatus};
