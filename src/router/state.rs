//! Workflow state table
//!
//! ```text
//! started ─set_server─▶ server_set ─set_fd─▶ fd_set
//!                                              │
//!              ┌───────────────────────────────┤
//!              ▼                               ▼
//!      persistence_set ◀──▶ actions_added ◀──▶ middleware_added
//!              │                 │                  │
//!              └────────prepare_action──────────────┘
//!                                ▼
//!                         action_prepared ─prepare_pipeline─▶ pipeline_prepared
//!                                                                   │
//!                              finalized ◀─finalize─ message_processed ◀─process_message
//! ```

/// A place in the per-message workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Place {
    Started,
    ServerSet,
    FdSet,
    PersistenceSet,
    ActionsAdded,
    MiddlewareAdded,
    ActionPrepared,
    PipelinePrepared,
    MessageProcessed,
    Finalized,
}

impl Place {
    pub fn as_str(self) -> &'static str {
        match self {
            Place::Started => "started",
            Place::ServerSet => "server_set",
            Place::FdSet => "fd_set",
            Place::PersistenceSet => "persistence_set",
            Place::ActionsAdded => "actions_added",
            Place::MiddlewareAdded => "middleware_added",
            Place::ActionPrepared => "action_prepared",
            Place::PipelinePrepared => "pipeline_prepared",
            Place::MessageProcessed => "message_processed",
            Place::Finalized => "finalized",
        }
    }
}

/// A named workflow transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    SetServer,
    SetFd,
    SetPersistence,
    AddActions,
    AddMiddleware,
    PrepareAction,
    PreparePipeline,
    ProcessMessage,
    Finalize,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::SetServer => "set_server",
            Transition::SetFd => "set_fd",
            Transition::SetPersistence => "set_persistence",
            Transition::AddActions => "add_actions",
            Transition::AddMiddleware => "add_middleware",
            Transition::PrepareAction => "prepare_action",
            Transition::PreparePipeline => "prepare_pipeline",
            Transition::ProcessMessage => "process_message",
            Transition::Finalize => "finalize",
        }
    }

    /// The transition that has to fire before this one can
    pub fn predecessor(self) -> &'static str {
        match self {
            Transition::SetServer => "start",
            Transition::SetFd => Transition::SetServer.as_str(),
            Transition::SetPersistence | Transition::AddActions | Transition::AddMiddleware => {
                Transition::SetFd.as_str()
            }
            Transition::PrepareAction => Transition::SetPersistence.as_str(),
            Transition::PreparePipeline => Transition::PrepareAction.as_str(),
            Transition::ProcessMessage => Transition::PreparePipeline.as_str(),
            Transition::Finalize => Transition::ProcessMessage.as_str(),
        }
    }
}

/// Where `transition` leads from `place`, if it is legal there
pub fn next(place: Place, transition: Transition) -> Option<Place> {
    use Place::*;
    use Transition::*;

    match (place, transition) {
        (Started, SetServer) => Some(ServerSet),
        (ServerSet, SetFd) => Some(FdSet),

        (FdSet | ActionsAdded | MiddlewareAdded, SetPersistence) => Some(PersistenceSet),
        (FdSet | PersistenceSet | ActionsAdded | MiddlewareAdded, AddActions) => Some(ActionsAdded),
        (FdSet | PersistenceSet | ActionsAdded | MiddlewareAdded, AddMiddleware) => {
            Some(MiddlewareAdded)
        }

        (PersistenceSet | ActionsAdded | MiddlewareAdded, PrepareAction) => Some(ActionPrepared),
        (ActionPrepared, PreparePipeline) => Some(PipelinePrepared),
        (PipelinePrepared, ProcessMessage) => Some(MessageProcessed),
        (MessageProcessed, Finalize) => Some(Finalized),

        _ => None,
    }
}
