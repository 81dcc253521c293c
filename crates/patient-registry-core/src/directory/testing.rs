//! In-process directory fake with scripted answers.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DirectoryError, DirectoryResult, PatientDirectory};
use crate::models::{PatientRecord, RegistrationRequest, ServiceReply};

/// What `today_count` answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountScript {
    Count(u32),
    Offline,
    Malformed,
    Status(u16),
}

#[derive(Debug)]
struct State {
    count: CountScript,
    register_replies: VecDeque<DirectoryResult<ServiceReply>>,
    registered: Vec<RegistrationRequest>,
    patients: Vec<PatientRecord>,
}

/// Directory that answers from a script instead of the network.
///
/// Registrations accepted by default bump a scripted count, like the real
/// service would.
#[derive(Debug)]
pub struct ScriptedDirectory {
    state: Mutex<State>,
}

impl ScriptedDirectory {
    pub fn new(count: CountScript) -> Self {
        Self {
            state: Mutex::new(State {
                count,
                register_replies: VecDeque::new(),
                registered: Vec::new(),
                patients: Vec::new(),
            }),
        }
    }

    pub fn with_count(count: u32) -> Self {
        Self::new(CountScript::Count(count))
    }

    pub fn offline() -> Self {
        Self::new(CountScript::Offline)
    }

    pub fn malformed() -> Self {
        Self::new(CountScript::Malformed)
    }

    pub fn status(status: u16) -> Self {
        Self::new(CountScript::Status(status))
    }

    /// Seed the roster returned by `list_patients`.
    pub fn with_patients(self, patients: Vec<PatientRecord>) -> Self {
        self.lock().patients = patients;
        self
    }

    /// Change what `today_count` answers from now on.
    pub fn set_count(&self, count: CountScript) {
        self.lock().count = count;
    }

    /// Queue the answer for the next `register` call.
    pub fn push_register_reply(&self, reply: DirectoryResult<ServiceReply>) {
        self.lock().register_replies.push_back(reply);
    }

    /// Every request that reached `register`, in order.
    pub fn registered(&self) -> Vec<RegistrationRequest> {
        self.lock().registered.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock already failed the test
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PatientDirectory for ScriptedDirectory {
    async fn today_count(&self) -> DirectoryResult<u32> {
        match self.lock().count {
            CountScript::Count(count) => Ok(count),
            CountScript::Offline => Err(DirectoryError::Transport("connection refused".into())),
            CountScript::Malformed => Err(DirectoryError::Malformed("missing field `count`".into())),
            CountScript::Status(status) => Err(DirectoryError::Status {
                status,
                message: None,
            }),
        }
    }

    async fn register(&self, request: &RegistrationRequest) -> DirectoryResult<ServiceReply> {
        let mut state = self.lock();
        if state.count == CountScript::Offline {
            return Err(DirectoryError::Transport("connection refused".into()));
        }
        state.registered.push(request.clone());

        let reply = state.register_replies.pop_front().unwrap_or_else(|| {
            Ok(ServiceReply {
                success: true,
                message: Some("Patient registered successfully".into()),
            })
        });

        if matches!(reply, Ok(ServiceReply { success: true, .. })) {
            if let CountScript::Count(count) = &mut state.count {
                *count += 1;
            }
        }
        reply
    }

    async fn list_patients(&self) -> DirectoryResult<Vec<PatientRecord>> {
        let state = self.lock();
        if state.count == CountScript::Offline {
            return Err(DirectoryError::Transport("connection refused".into()));
        }
        Ok(state.patients.clone())
    }

    async fn delete_patient(&self, id: &str) -> DirectoryResult<()> {
        let mut state = self.lock();
        let before = state.patients.len();
        state.patients.retain(|p| p.id != id);
        if state.patients.len() == before {
            return Err(DirectoryError::Status {
                status: 404,
                message: Some("Patient not found".into()),
            });
        }
        Ok(())
    }

    async fn health(&self) -> bool {
        self.lock().count != CountScript::Offline
    }
}
