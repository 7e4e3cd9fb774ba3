//! Command queue - the commands a character has lined up for its turns.
//!
//! Commands are opaque to the queue: it only orders them, hands them out, and asks
//! them to execute. A command that reports `Blocked` stays at the front of the queue
//! so it can be retried once whatever blocked it has finished.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, CommandId};

/// Where a command prefers to be placed when it is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueuePosition {
    /// Jump ahead of everything already queued.
    BeginningOfQueue,
    /// Run right after the command that is currently next.
    NextAfterBeginningOfQueue,
    /// Wait behind everything already queued.
    #[default]
    EndOfQueue,
}

impl fmt::Display for QueuePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueuePosition::BeginningOfQueue => "BeginningOfQueue",
            QueuePosition::NextAfterBeginningOfQueue => "NextAfterBeginningOfQueue",
            QueuePosition::EndOfQueue => "EndOfQueue",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of trying to execute the next queued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandExecuteResult {
    /// Nothing was queued.
    None,
    /// The command ran and left the queue.
    Activated,
    /// The command cannot run yet and remains queued.
    Blocked,
    /// The command will never run and was dropped.
    Refused,
}

/// A command a character can execute during its turn.
pub trait CharacterCommand: Send + Sync {
    fn id(&self) -> CommandId;

    /// The character that issued the command.
    fn character_id(&self) -> CharacterId;

    fn queue_position(&self) -> QueuePosition {
        QueuePosition::EndOfQueue
    }

    fn execute(&self) -> CommandExecuteResult;

    /// Short human-readable label used in logs.
    fn id_for_logs(&self) -> String {
        self.id().to_string()
    }
}

/// An ordered queue of commands for a single character.
///
/// # Invariants
///
/// - A command id appears at most once
/// - When a size limit is set, the queue never grows beyond it; the command at the
///   end of the queue is dropped to make room
#[derive(Clone, Default)]
pub struct CommandQueue {
    commands: VecDeque<Arc<dyn CharacterCommand>>,
    size_limit: Option<usize>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that holds at most `limit` commands.
    pub fn with_size_limit(limit: usize) -> Self {
        Self {
            commands: VecDeque::new(),
            size_limit: Some(limit),
        }
    }

    pub fn size_limit(&self) -> Option<usize> {
        self.size_limit
    }

    /// Append a command. Returns false if it was already queued or the queue is full.
    pub fn enqueue(&mut self, command: Arc<dyn CharacterCommand>) -> bool {
        if self.contains(command.id()) || self.is_full() {
            return false;
        }

        self.commands.push_back(command);
        true
    }

    /// Insert a command at `position` (clamped to the queue length).
    ///
    /// On a full queue the command is inserted and the last command is then dropped,
    /// so a command placed at the end of a full queue is dropped immediately.
    /// Returns false if the command was already queued or was the one dropped.
    pub fn enqueue_at(&mut self, command: Arc<dyn CharacterCommand>, position: usize) -> bool {
        let id = command.id();

        if self.contains(id) {
            return false;
        }

        let position = position.min(self.commands.len());
        self.commands.insert(position, command);

        if let Some(limit) = self.size_limit {
            while self.commands.len() > limit {
                self.commands.pop_back();
            }
        }

        self.contains(id)
    }

    /// Insert a command according to its own [`QueuePosition`] preference.
    pub fn enqueue_with_preference(&mut self, command: Arc<dyn CharacterCommand>) -> bool {
        match command.queue_position() {
            QueuePosition::BeginningOfQueue => self.enqueue_at(command, 0),
            QueuePosition::NextAfterBeginningOfQueue => {
                // Right behind the current head, or at the head of an empty queue.
                let position = if self.commands.is_empty() { 0 } else { 1 };
                self.enqueue_at(command, position)
            }
            QueuePosition::EndOfQueue => self.enqueue(command),
        }
    }

    pub fn peek_next(&self) -> Option<Arc<dyn CharacterCommand>> {
        self.commands.front().cloned()
    }

    pub fn pop_next(&mut self) -> Option<Arc<dyn CharacterCommand>> {
        self.commands.pop_front()
    }

    /// Pop the next command and execute it. A blocked command is put back at the front.
    pub fn pop_and_execute_next(&mut self) -> CommandExecuteResult {
        let Some(command) = self.commands.pop_front() else {
            return CommandExecuteResult::None;
        };

        let result = command.execute();

        if result == CommandExecuteResult::Blocked {
            self.commands.push_front(command);
        }

        result
    }

    /// Remove a command by id. Returns false if it was not queued.
    pub fn remove(&mut self, id: CommandId) -> bool {
        let before = self.commands.len();
        self.commands.retain(|command| command.id() != id);
        self.commands.len() != before
    }

    pub fn contains(&self, id: CommandId) -> bool {
        self.commands.iter().any(|command| command.id() == id)
    }

    /// Ids of every queued command, front first.
    pub fn command_ids(&self) -> Vec<CommandId> {
        self.commands.iter().map(|command| command.id()).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn is_full(&self) -> bool {
        self.size_limit
            .is_some_and(|limit| self.commands.len() >= limit)
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.commands.iter().map(|c| c.id_for_logs()).collect();

        f.debug_struct("CommandQueue")
            .field("commands", &labels)
            .field("size_limit", &self.size_limit)
            .finish()
    }
}
