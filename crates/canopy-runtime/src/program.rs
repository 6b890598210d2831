#![forbid(unsafe_code)]

//! Elm-style program loop.
//!
//! A [`Program`] owns a [`Model`], a surface, the real root node, and the
//! tree that root was last rendered from. Each [`Program::step`]:
//!
//! 1. runs tasks scheduled by earlier commands and queues their messages,
//! 2. drains up to `max_messages_per_step` messages through
//!    [`Model::update`],
//! 3. renders at most once: `view`, `diff` against the previous tree,
//!    `apply_patches`, then the new tree replaces the previous one.
//!
//! Many messages in one step therefore cost one render cycle. Listeners
//! only push onto the [`MessageQueue`], so a render never re-enters itself.
//!
//! # Example
//!
//! ```
//! use canopy_core::{Fact, Handler, VNode};
//! use canopy_render::HeadlessDom;
//! use canopy_runtime::{Cmd, Model, Program};
//!
//! struct Counter(i32);
//!
//! impl Model for Counter {
//!     type Message = i32;
//!
//!     fn update(&mut self, delta: i32) -> Cmd<i32> {
//!         self.0 += delta;
//!         Cmd::none()
//!     }
//!
//!     fn view(&self) -> VNode<i32> {
//!         VNode::element(
//!             "button",
//!             [Fact::on("click", Handler::message(1))],
//!             vec![VNode::text(self.0.to_string())],
//!         )
//!     }
//! }
//!
//! let mut program = Program::new(Counter(0), HeadlessDom::new());
//! program.init().unwrap();
//! program.send(2);
//! program.send(3);
//! let result = program.step().unwrap();
//! assert_eq!(result.messages_processed, 2);
//! let root = program.root().unwrap();
//! assert_eq!(program.surface().to_markup(root), "<button @click>5</button>");
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use canopy_core::{Dispatch, DispatchOutcome, Event, EventScope, NodeId, Surface, SurfaceError, VNode};
use canopy_diff::{Patch, count_patches, diff};
use canopy_render::{apply_patches, mount};
use tracing::{debug, info, info_span, trace};

use crate::config::ProgramConfig;
use crate::queue::MessageQueue;

/// Application state and behavior.
pub trait Model {
    type Message: 'static;

    /// Startup commands. Runs once, before the first view.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    fn view(&self) -> VNode<Self::Message>;
}

/// Side effects requested by [`Model::init`] and [`Model::update`].
pub enum Cmd<M> {
    None,
    /// Stop the program. Later steps do nothing.
    Quit,
    /// Queue a message for this or the next step.
    Msg(M),
    Batch(Vec<Cmd<M>>),
    /// Run a closure at the start of the next step; its result is queued.
    Task(Box<dyn FnOnce() -> M>),
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Self::None
    }
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Task(_) => write!(f, "Task(..)"),
        }
    }
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    /// Create a batch of commands. Empty and single batches collapse.
    pub fn batch(mut cmds: Vec<Self>) -> Self {
        if cmds.len() > 1 {
            return Self::Batch(cmds);
        }
        cmds.pop().unwrap_or(Self::None)
    }

    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + 'static,
    {
        Self::Task(Box::new(f))
    }

    /// Stable name for logging.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Quit => "Quit",
            Self::Msg(_) => "Msg",
            Self::Batch(_) => "Batch",
            Self::Task(_) => "Task",
        }
    }
}

/// Lifecycle misuse or a surface failure.
#[derive(Debug)]
pub enum ProgramError {
    /// `step` or `dispatch` before `init`.
    NotInitialized,
    /// `init` called twice.
    AlreadyInitialized,
    Surface(SurfaceError),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "program has not been initialized"),
            Self::AlreadyInitialized => write!(f, "program is already initialized"),
            Self::Surface(e) => write!(f, "surface error: {e}"),
        }
    }
}

impl std::error::Error for ProgramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Surface(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SurfaceError> for ProgramError {
    fn from(e: SurfaceError) -> Self {
        Self::Surface(e)
    }
}

/// Outcome of one [`Program::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// False once a `Quit` command ran.
    pub running: bool,
    /// Whether a diff and apply happened.
    pub rendered: bool,
    pub messages_processed: usize,
    /// Patches applied, nested ones included.
    pub patches: usize,
    /// Render cycles completed so far, the initial mount excluded.
    pub frame_idx: u64,
}

struct Mounted<Msg> {
    root: NodeId,
    tree: VNode<Msg>,
}

/// Drives a [`Model`] onto a surface.
pub struct Program<M: Model, S> {
    model: M,
    surface: S,
    config: ProgramConfig,
    queue: MessageQueue<M::Message>,
    scope: Rc<EventScope<M::Message>>,
    tasks: VecDeque<Box<dyn FnOnce() -> M::Message>>,
    mounted: Option<Mounted<M::Message>>,
    running: bool,
    frame_idx: u64,
}

impl<M: Model, S: Surface<M::Message>> Program<M, S> {
    pub fn new(model: M, surface: S) -> Self {
        Self::with_config(model, surface, ProgramConfig::default())
    }

    pub fn with_config(model: M, surface: S, config: ProgramConfig) -> Self {
        let queue = MessageQueue::new();
        let scope = EventScope::root(queue.sink());
        Self {
            model,
            surface,
            config,
            queue,
            scope,
            tasks: VecDeque::new(),
            mounted: None,
            running: true,
            frame_idx: 0,
        }
    }

    /// Run the model's startup commands and mount the first view.
    pub fn init(&mut self) -> Result<(), ProgramError> {
        if self.mounted.is_some() {
            return Err(ProgramError::AlreadyInitialized);
        }
        let cmd = self.model.init();
        self.execute(cmd);

        let tree = self.model.view();
        let root = mount(&mut self.surface, &tree, &self.scope)?;
        info!(
            nodes = tree.descendant_count() + 1,
            queued = self.queue.len(),
            "program initialized"
        );
        self.mounted = Some(Mounted { root, tree });
        Ok(())
    }

    /// Process pending work and render at most once.
    pub fn step(&mut self) -> Result<StepResult, ProgramError> {
        if self.mounted.is_none() {
            return Err(ProgramError::NotInitialized);
        }
        if !self.running {
            return Ok(self.result(false, 0, 0));
        }

        let tasks = self.tasks.len();
        while let Some(task) = self.tasks.pop_front() {
            self.queue.push(task());
        }

        let mut processed = 0;
        while processed < self.config.max_messages_per_step {
            let Some(msg) = self.queue.pop() else {
                break;
            };
            processed += 1;
            let cmd = self.model.update(msg);
            self.execute(cmd);
            if !self.running {
                break;
            }
        }
        debug!(
            tasks,
            messages = processed,
            remaining = self.queue.len(),
            "queue drained"
        );

        if !self.running {
            info!(frame_idx = self.frame_idx, "program quit");
            return Ok(self.result(false, processed, 0));
        }
        if processed == 0 && !self.config.render_when_clean {
            return Ok(self.result(false, 0, 0));
        }

        let patches = self.render_cycle()?;
        Ok(self.result(true, processed, patches))
    }

    /// Step until nothing is queued or scheduled, the program quits, or
    /// `max_steps` steps ran. Returns the number of steps taken.
    pub fn run_until_idle(&mut self, max_steps: usize) -> Result<usize, ProgramError> {
        let mut steps = 0;
        while steps < max_steps && self.running && self.has_pending_work() {
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }

    fn render_cycle(&mut self) -> Result<usize, ProgramError> {
        let _span = info_span!("render_cycle", frame_idx = self.frame_idx).entered();

        let Some(mounted) = self.mounted.as_mut() else {
            return Err(ProgramError::NotInitialized);
        };
        let next = self.model.view();
        let patches = diff(&mounted.tree, &next);
        let count = count_patches(&patches);
        if self.config.trace_patches {
            trace_patches(&patches);
        }

        mounted.root = apply_patches(
            &mut self.surface,
            mounted.root,
            &mounted.tree,
            &patches,
            &self.scope,
        )?;
        mounted.tree = next;
        self.frame_idx += 1;

        debug!(patches = count, frame_idx = self.frame_idx, "render cycle complete");
        Ok(count)
    }

    fn execute(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Msg(msg) => self.queue.push(msg),
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd);
                }
            }
            Cmd::Task(task) => self.tasks.push_back(task),
        }
    }

    fn result(&self, rendered: bool, messages_processed: usize, patches: usize) -> StepResult {
        StepResult {
            running: self.running,
            rendered,
            messages_processed,
            patches,
            frame_idx: self.frame_idx,
        }
    }

    /// Queue a message for the next step.
    pub fn send(&self, msg: M::Message) {
        self.queue.push(msg);
    }

    #[inline]
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || !self.tasks.is_empty()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Real root node, once mounted.
    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.mounted.as_ref().map(|m| m.root)
    }

    /// Tree the surface currently reflects.
    pub fn current_tree(&self) -> Option<&VNode<M::Message>> {
        self.mounted.as_ref().map(|m| &m.tree)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn queue(&self) -> &MessageQueue<M::Message> {
        &self.queue
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }
}

impl<M: Model, S: Surface<M::Message> + Dispatch> Program<M, S> {
    /// Deliver a host event to the surface. Resulting messages are queued
    /// for the next step.
    pub fn dispatch(&mut self, target: NodeId, event: &Event) -> Result<DispatchOutcome, ProgramError> {
        if self.mounted.is_none() {
            return Err(ProgramError::NotInitialized);
        }
        let outcome = self.surface.dispatch(target, event)?;
        debug!(event = event.name(), target = %target, queued = self.queue.len(), "dispatched");
        Ok(outcome)
    }
}

fn trace_patches<Msg>(patches: &[Patch<Msg>]) {
    for patch in patches {
        trace!(address = patch.address, kind = patch.kind.name(), "patch");
    }
}
