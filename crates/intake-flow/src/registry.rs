use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::FlowError;
use crate::session::Session;

/// Per-session serialization boundary.
///
/// Each session id maps to its own mutex, so at most one mutation is in
/// flight per session while different sessions proceed in parallel. The
/// outer map lock is held only long enough to fetch the per-session handle.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: impl Into<String>, session: Session) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.insert(session_id.into(), Arc::new(Mutex::new(session)));
    }

    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.remove(session_id).is_some()
    }

    /// Runs one operation against the named session, strictly ordered with
    /// respect to any other in-flight operation on the same id.
    pub fn with_session<T>(
        &self,
        session_id: &str,
        operation: impl FnOnce(&mut Session) -> Result<T, FlowError>,
    ) -> Result<T, FlowError> {
        let handle = {
            let sessions = self.sessions.lock().expect("session registry poisoned");
            sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| FlowError::NotFound {
                    id: session_id.to_string(),
                })?
        };
        let mut session = handle.lock().expect("session poisoned");
        operation(&mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::EffectiveTemplate;
    use chrono::Utc;
    use intake_spec::Template;
    use std::sync::Arc;

    fn empty_template() -> Arc<EffectiveTemplate> {
        Arc::new(EffectiveTemplate {
            template: Template {
                id: "t1".into(),
                name: "Empty".into(),
                description: None,
                version: 1,
                is_active: true,
                language: "en".into(),
                total_pages: 0,
                estimated_completion_minutes: 0,
                configuration: Default::default(),
                introduction_text: None,
                completion_message: None,
            },
            clinic_id: "c1".into(),
            assignment_id: "a1".into(),
            resolved_at: Utc::now(),
            pages: Vec::new(),
            orphaned_questions: Vec::new(),
        })
    }

    #[test]
    fn unknown_session_id_is_not_found() {
        let registry = SessionRegistry::new();
        let result = registry.with_session("missing", |_session| Ok(()));
        assert!(matches!(result, Err(FlowError::NotFound { id }) if id == "missing"));
    }

    #[test]
    fn insert_and_operate() {
        let registry = SessionRegistry::new();
        let session = Session::start(empty_template()).unwrap();
        registry.insert("s1", session);
        let status = registry
            .with_session("s1", |session| Ok(session.status()))
            .unwrap();
        assert_eq!(status, crate::session::SessionStatus::Completed);
        assert!(registry.remove("s1"));
    }
}
