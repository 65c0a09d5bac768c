use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::PollingCache;
use crate::command::{BinaryCommand, CommandError, CommandExecutor, CommandOutcome};
use crate::facade::{DeviceFacade, FacadeKind, FacadeReading, FieldFacade, Intent, Interpretation};

/// Facade over a binary field that can also be driven by commands.
struct Actuated {
    state: FieldFacade,
    executor: Arc<CommandExecutor>,
    command: BinaryCommand,
}

impl Actuated {
    fn new(
        executor: Arc<CommandExecutor>,
        kind: FacadeKind,
        suffix: &str,
        command: BinaryCommand,
        assume_when_offline: bool,
    ) -> Self {
        let interpretation = Interpretation::Match {
            on: command.on_literal.clone(),
        };
        let state = FieldFacade::new(
            Arc::clone(executor.cache()),
            kind,
            suffix,
            &command.field,
            interpretation,
            assume_when_offline,
        );
        Self {
            state,
            executor,
            command,
        }
    }

    async fn act(&self, want_on: bool) -> Result<CommandOutcome, CommandError> {
        self.executor.execute(&self.command, want_on).await
    }
}

pub struct Lock {
    inner: Actuated,
}

impl Lock {
    pub fn new(
        executor: Arc<CommandExecutor>,
        suffix: &str,
        command: BinaryCommand,
        assume_when_offline: bool,
    ) -> Self {
        Self {
            inner: Actuated::new(executor, FacadeKind::Lock, suffix, command, assume_when_offline),
        }
    }

    pub async fn lock(&self) -> Result<CommandOutcome, CommandError> {
        debug!(facade = %self.name(), "locking doors");
        self.inner.act(true).await
    }

    pub async fn unlock(&self) -> Result<CommandOutcome, CommandError> {
        debug!(facade = %self.name(), "unlocking doors");
        self.inner.act(false).await
    }

    pub fn is_locked(&self) -> Option<bool> {
        self.inner.state.state()
    }
}

#[async_trait]
impl DeviceFacade for Lock {
    fn kind(&self) -> FacadeKind {
        FacadeKind::Lock
    }

    fn suffix(&self) -> &str {
        self.inner.state.suffix()
    }

    fn cache(&self) -> &PollingCache {
        self.inner.state.cache()
    }

    fn read(&self) -> FacadeReading {
        self.inner.state.read()
    }

    async fn perform_action(&self, intent: Intent) -> Result<CommandOutcome, CommandError> {
        match intent {
            Intent::On => self.lock().await,
            Intent::Off => self.unlock().await,
        }
    }
}

pub struct Switch {
    inner: Actuated,
}

impl Switch {
    pub fn new(
        executor: Arc<CommandExecutor>,
        suffix: &str,
        command: BinaryCommand,
        assume_when_offline: bool,
    ) -> Self {
        Self {
            inner: Actuated::new(
                executor,
                FacadeKind::Switch,
                suffix,
                command,
                assume_when_offline,
            ),
        }
    }

    pub async fn turn_on(&self) -> Result<CommandOutcome, CommandError> {
        debug!(facade = %self.name(), "turning on");
        self.inner.act(true).await
    }

    /// Returns `Skipped` without contacting the remote when no off command exists.
    pub async fn turn_off(&self) -> Result<CommandOutcome, CommandError> {
        debug!(facade = %self.name(), "turning off");
        self.inner.act(false).await
    }

    pub fn is_on(&self) -> Option<bool> {
        self.inner.state.state()
    }
}

#[async_trait]
impl DeviceFacade for Switch {
    fn kind(&self) -> FacadeKind {
        FacadeKind::Switch
    }

    fn suffix(&self) -> &str {
        self.inner.state.suffix()
    }

    fn cache(&self) -> &PollingCache {
        self.inner.state.cache()
    }

    fn read(&self) -> FacadeReading {
        self.inner.state.read()
    }

    async fn perform_action(&self, intent: Intent) -> Result<CommandOutcome, CommandError> {
        match intent {
            Intent::On => self.turn_on().await,
            Intent::Off => self.turn_off().await,
        }
    }
}
