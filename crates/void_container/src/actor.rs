//! Single-writer container worker
//!
//! A [`ContainerHandle`] moves a container onto its own thread and
//! serializes every access through a command queue, so large adds can run
//! off the caller's thread without racing other mutations. Replies come
//! back over `tokio` oneshot channels: `.await` them inside a runtime, or
//! call `blocking_recv()` outside one.

use crate::container::Container;
use crate::error::ActorError;
use crate::item::Item;
use crate::result::AddReport;
use crate::slot::ContainerId;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// Cooperative cancellation flag, checked by the add pipeline between
/// candidate slots
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pending reply of an add submitted to a worker
pub type AddTask = oneshot::Receiver<AddReport>;

type Job = Box<dyn FnOnce(&mut Container) + Send>;

enum Command {
    Add {
        item: Item,
        count: u32,
        target_slot: Option<usize>,
        auto_stack: bool,
        cancel: Option<CancellationToken>,
        reply: oneshot::Sender<AddReport>,
    },
    Execute(Job),
    Shutdown,
}

/// Owns a container running on a dedicated worker thread
pub struct ContainerHandle {
    id: ContainerId,
    sender: Sender<Command>,
    thread: Option<JoinHandle<Container>>,
}

impl ContainerHandle {
    /// Start a worker that owns `container`
    pub fn spawn(container: Container) -> Result<Self, ActorError> {
        let id = container.id();
        let (sender, receiver) = crossbeam_channel::unbounded();

        let thread = thread::Builder::new()
            .name(format!("container-{}", id.0))
            .spawn(move || Self::worker_loop(container, receiver))?;

        log::info!("{}: worker started", id);
        Ok(Self {
            id,
            sender,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Queue an add. With a token, the add stops at the next candidate slot
    /// after cancellation and keeps what it already placed.
    pub fn add_items(
        &self,
        item: Item,
        count: u32,
        target_slot: Option<usize>,
        auto_stack: bool,
        cancel: Option<CancellationToken>,
    ) -> Result<AddTask, ActorError> {
        let (reply, task) = oneshot::channel();
        self.send(Command::Add {
            item,
            count,
            target_slot,
            auto_stack,
            cancel,
            reply,
        })?;
        Ok(task)
    }

    /// Queue an arbitrary operation on the container
    pub fn execute<R, F>(&self, f: F) -> Result<oneshot::Receiver<R>, ActorError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Container) -> R + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.send(Command::Execute(Box::new(move |container: &mut Container| {
            let _ = reply.send(f(container));
        })))?;
        Ok(result)
    }

    /// Drain queued commands, stop the worker and take the container back
    pub fn shutdown(mut self) -> Result<Container, ActorError> {
        let _ = self.sender.send(Command::Shutdown);
        let thread = self.thread.take().ok_or(ActorError::Disconnected)?;
        let container = thread.join().map_err(|_| ActorError::Panicked)?;
        log::info!("{}: worker stopped", self.id);
        Ok(container)
    }

    fn send(&self, command: Command) -> Result<(), ActorError> {
        self.sender.send(command).map_err(|_| ActorError::Disconnected)
    }

    fn worker_loop(mut container: Container, commands: Receiver<Command>) -> Container {
        for command in commands.iter() {
            match command {
                Command::Add {
                    item,
                    count,
                    target_slot,
                    auto_stack,
                    cancel,
                    reply,
                } => {
                    let report = match &cancel {
                        Some(token) => {
                            container.add_items_cancellable(&item, count, target_slot, auto_stack, token)
                        }
                        None => container.add_items_with(&item, count, target_slot, auto_stack),
                    };
                    // The caller may have dropped the task
                    let _ = reply.send(report);
                }
                Command::Execute(job) => job(&mut container),
                Command::Shutdown => break,
            }
        }
        container
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.sender.send(Command::Shutdown);
            if thread.join().is_err() {
                log::warn!("{}: worker panicked", self.id);
            }
            log::info!("{}: worker stopped", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::result::AddItemResult;

    fn handle() -> ContainerHandle {
        let container = Container::new("vault", "Vault", None).with_directory(InMemoryDirectory::shared());
        ContainerHandle::spawn(container).unwrap()
    }

    #[test]
    fn test_add_through_worker() {
        let handle = handle();
        let coin = Item::new("coin", "Coin").with_max_stack(100);

        let report = handle
            .add_items(coin, 25_000, None, true, None)
            .unwrap()
            .blocking_recv()
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.affected_slots.len(), 250);

        let total = handle
            .execute(|c| c.total_count("coin"))
            .unwrap()
            .blocking_recv()
            .unwrap();
        assert_eq!(total, 25_000);

        let container = handle.shutdown().unwrap();
        assert!(container.validate_cache());
    }

    #[test]
    fn test_cancelled_before_start() {
        let handle = handle();
        let token = CancellationToken::new();
        token.cancel();

        let report = handle
            .add_items(Item::new("coin", "Coin"), 500, None, true, Some(token))
            .unwrap()
            .blocking_recv()
            .unwrap();
        assert_eq!(report.result, AddItemResult::Cancelled);
        assert_eq!(report.added, 0);
    }

    #[test]
    fn test_commands_run_in_order() {
        let handle = handle();
        for _ in 0..10 {
            let _ = handle.add_items(Item::new("gem", "Gem"), 1, None, true, None).unwrap();
        }
        let slots = handle.execute(|c| c.slot_count()).unwrap().blocking_recv().unwrap();
        assert_eq!(slots, 1);

        drop(handle);
    }

    #[test]
    fn test_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
