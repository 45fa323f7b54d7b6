#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Action Dispatch Core
//!
//! Client-side dispatch of actions: units of remote or local work that move through a small
//! lifecycle and deliver their result to registered callbacks exactly once.
//!
//! ## Overview
//!
//! A caller creates an [`Action`](action::Action) from a registered definition, configures
//! it (parameters, callbacks, storable/abortable/exclusive flags, an optional parent) and
//! enqueues it on the [`ActionDispatcher`](dispatch::ActionDispatcher). The dispatcher serves
//! cache hits from the [`ActionStore`](storage::ActionStore) synchronously, runs client
//! actions locally, and sends the remaining server actions to the transport in batches
//! partitioned by background and exclusive flags.
//!
//! ## Key Features
//!
//! - **Exactly-once delivery**: each terminal callback fires at most once, including under
//!   repeated finish/abort calls and late responses
//! - **Deterministic cache keys**: descriptor plus canonical parameter encoding, independent
//!   of insertion order
//! - **Correlated cancellation**: abort groups with fail-fast parent/child invariants
//! - **Reported-once failures**: local execution failures reach diagnostics at most once and
//!   never recurse through the failure-report action
//!
//! ## Module Organization
//!
//! - [`action`] - Action value object, definitions, callbacks and id allocation
//! - [`storage`] - Cache key encoder and action store
//! - [`abort`] - Abort group coordinator
//! - [`dispatch`] - Queue, transport seam and dispatcher
//! - [`diagnostics`] - Failure reporting
//! - [`component`] / [`context`] - Collaborator interfaces
//! - [`config`] - Configuration management
//! - [`events`] - Lifecycle event publishing
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use action_dispatch_core::action::{
//!     callback_fn, ActionDef, ActionDefRegistry, ActionFactory, ActionIdAllocator, ParamSchema,
//! };
//! use action_dispatch_core::config::DispatchConfig;
//! use action_dispatch_core::context::InMemoryExecutionContext;
//! use action_dispatch_core::diagnostics::QueuedFailureReporter;
//! use action_dispatch_core::dispatch::{ActionDispatcher, ActionTransport};
//! use action_dispatch_core::storage::InMemoryActionStore;
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn ActionTransport>) -> action_dispatch_core::Result<()> {
//! let registry = Arc::new(ActionDefRegistry::new());
//! registry.register(ActionDef::server(
//!     "java://Items.list",
//!     ParamSchema::new().with_param("page", "Integer"),
//! ));
//!
//! let config = DispatchConfig::from_env()?;
//! let factory = ActionFactory::new(registry, Arc::new(ActionIdAllocator::new()), &config.context_num);
//! let dispatcher = ActionDispatcher::new(
//!     config,
//!     factory,
//!     transport,
//!     Arc::new(InMemoryActionStore::default()),
//!     Arc::new(InMemoryExecutionContext::default()),
//!     Arc::new(QueuedFailureReporter::new()),
//! );
//!
//! let handle = dispatcher.create_action("java://Items.list")?;
//! handle.lock().set_callback(
//!     None,
//!     Some(callback_fn(|_, action| println!("{:?}", action.get_return_value()))),
//!     None,
//! )?;
//! dispatcher.enqueue(&handle)?;
//! dispatcher.run_until_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod abort;
pub mod action;
pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod storage;

pub use abort::{AbortGroupCoordinator, AbortGroupId};
pub use action::{
    Action, ActionDef, ActionDefRegistry, ActionFactory, ActionHandle, ActionIdAllocator,
    ActionState, StorableConfig, TerminalState,
};
pub use component::ComponentHandle;
pub use config::DispatchConfig;
pub use context::{ExecutionContext, InMemoryExecutionContext};
pub use diagnostics::{ActionFailure, DiagnosticsReporter, QueuedFailureReporter};
pub use dispatch::{ActionDispatcher, ActionResponse, ActionTransport, EnqueueOutcome};
pub use error::{ActionError, DispatchError, Result};
pub use storage::{ActionStore, InMemoryActionStore, StoredAction};
