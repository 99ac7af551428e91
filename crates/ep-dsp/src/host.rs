use std::collections::HashMap;

use ep_core::traits::EmissionSink;

use crate::error::DspError;

/// Entry points a signal class exposes to the host.
///
/// Mirrors the host lifecycle: construction happens through the
/// [`ClassRegistry`], teardown is `Drop`.
pub trait SignalObject: Send {
    /// Registered class name.
    fn class_name(&self) -> &'static str;

    /// Block-size notification, sent before the first block and on every change.
    ///
    /// # Errors
    /// Class-specific; the host logs it and keeps the object.
    fn dsp(&mut self, block_size: usize) -> Result<(), DspError>;

    /// Process one input block.
    ///
    /// CONTRAT : temps réel, ne doit PAS allouer ni bloquer.
    ///
    /// # Errors
    /// The block is dropped by the object.
    fn perform(&mut self, block: &[f32]) -> Result<(), DspError>;

    /// `true` if the object has a deferred callback waiting.
    fn clock_pending(&self) -> bool;

    /// Deferred callback, run by the host after `perform`, never concurrently.
    fn tick(&mut self, sink: &mut dyn EmissionSink);
}

/// Constructor stored in the registry: creation arguments in, object out.
pub type Constructor =
    Box<dyn Fn(&[f32]) -> Result<Box<dyn SignalObject>, DspError> + Send + Sync>;

/// Table of signal classes known to a host.
///
/// # Example
/// ```
/// use ep_dsp::host::ClassRegistry;
/// let mut registry = ClassRegistry::new();
/// ep_dsp::envpeak::setup(&mut registry);
/// assert!(registry.contains("envpeak~"));
/// ```
#[derive(Default)]
pub struct ClassRegistry {
    classes: HashMap<&'static str, Constructor>,
}

impl ClassRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class. A second registration under the same name replaces the first.
    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        if self.classes.insert(name, constructor).is_some() {
            log::warn!("Classe {name} redéfinie");
        }
    }

    /// `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Build an instance of `name`.
    ///
    /// # Errors
    /// [`DspError::UnknownClass`] if `name` is not registered, or the
    /// constructor's own error.
    pub fn instantiate(&self, name: &str, args: &[f32]) -> Result<Box<dyn SignalObject>, DspError> {
        let constructor = self
            .classes
            .get(name)
            .ok_or_else(|| DspError::UnknownClass(name.to_string()))?;
        constructor(args)
    }
}

/// Handle to an object living in a [`DspGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

struct Node {
    id: ObjectId,
    object: Box<dyn SignalObject>,
    prepared_for: Option<usize>,
}

/// Minimal host: one mono input fanned out to every object, then a deferred pass.
///
/// # Example
/// ```
/// use ep_core::level::Emission;
/// use ep_dsp::host::{ClassRegistry, DspGraph};
///
/// let mut registry = ClassRegistry::new();
/// ep_dsp::envpeak::setup(&mut registry);
///
/// let mut graph = DspGraph::new();
/// graph.instantiate(&registry, "envpeak~", &[256.0, 128.0]).unwrap();
/// graph.set_block_size(64).unwrap();
///
/// let mut out: Vec<Emission> = Vec::new();
/// graph.run_block(&[0.5; 64]).unwrap();
/// graph.run_deferred(&mut out);
/// assert_eq!(out.len(), 1);
/// ```
#[derive(Default)]
pub struct DspGraph {
    nodes: Vec<Node>,
    block_size: Option<usize>,
    next_id: u64,
}

impl DspGraph {
    /// Create an empty graph with no block size yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from the registry and add it to the graph.
    ///
    /// # Errors
    /// Construction errors; nothing is added in that case.
    pub fn instantiate(
        &mut self,
        registry: &ClassRegistry,
        name: &str,
        args: &[f32],
    ) -> Result<ObjectId, DspError> {
        let object = registry.instantiate(name, args).inspect_err(|e| {
            log::error!("{name} : création impossible ({e})");
        })?;
        Ok(self.add(object))
    }

    /// Add an object. If a block size is already set the object is notified now.
    pub fn add(&mut self, mut object: Box<dyn SignalObject>) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let mut prepared_for = None;
        if let Some(n) = self.block_size {
            match object.dsp(n) {
                Ok(()) => prepared_for = Some(n),
                Err(e) => log::error!("{} : {e}", object.class_name()),
            }
        }

        self.nodes.push(Node {
            id,
            object,
            prepared_for,
        });
        id
    }

    /// Announce the block size to every object not already prepared for it.
    ///
    /// # Errors
    /// [`DspError::InvalidBlockSize`] for zero, otherwise the first object
    /// error. Every object is still notified.
    pub fn set_block_size(&mut self, block_size: usize) -> Result<(), DspError> {
        if block_size == 0 {
            return Err(DspError::InvalidBlockSize(block_size));
        }
        self.block_size = Some(block_size);

        let mut first_err = None;
        for node in &mut self.nodes {
            if node.prepared_for == Some(block_size) {
                continue;
            }
            match node.object.dsp(block_size) {
                Ok(()) => node.prepared_for = Some(block_size),
                Err(e) => {
                    log::error!("{} : {e}", node.object.class_name());
                    node.prepared_for = None;
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Run one block through every object.
    ///
    /// # Errors
    /// [`DspError::NotPrepared`] before any block size, otherwise the first
    /// object error. Remaining objects still run.
    pub fn run_block(&mut self, input: &[f32]) -> Result<(), DspError> {
        if self.block_size.is_none() {
            return Err(DspError::NotPrepared);
        }
        let mut first_err = None;
        for node in &mut self.nodes {
            if let Err(e) = node.object.perform(input) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Deferred pass: fire every pending clock. Returns how many fired.
    pub fn run_deferred(&mut self, sink: &mut dyn EmissionSink) -> usize {
        let mut fired = 0;
        for node in &mut self.nodes {
            if node.object.clock_pending() {
                node.object.tick(sink);
                fired += 1;
            }
        }
        fired
    }

    /// Tear an object down. Pending deferred callbacks are cancelled by its `Drop`.
    pub fn free(&mut self, id: ObjectId) -> bool {
        let Some(pos) = self.nodes.iter().position(|n| n.id == id) else {
            return false;
        };
        let node = self.nodes.remove(pos);
        log::debug!("{} libéré", node.object.class_name());
        true
    }

    /// Current block size.
    #[must_use]
    pub fn block_size(&self) -> Option<usize> {
        self.block_size
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if the graph holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Re-chunks a stream of arbitrary-sized buffers into fixed host blocks.
///
/// Pré-alloué : `push` n'alloue jamais.
///
/// # Example
/// ```
/// use ep_dsp::host::BlockFramer;
/// let mut framer = BlockFramer::new(4);
/// let mut blocks = 0;
/// framer.push(&[0.0; 10], |_| { blocks += 1; Ok::<(), ()>(()) }).unwrap();
/// assert_eq!(blocks, 2);
/// assert_eq!(framer.pending(), 2);
/// ```
#[derive(Debug)]
pub struct BlockFramer {
    buf: Vec<f32>,
    block_size: usize,
}

impl BlockFramer {
    /// Create a framer for `block_size` (at least 1).
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            buf: Vec::with_capacity(block_size),
            block_size,
        }
    }

    /// Append samples, calling `on_block` for every completed block.
    ///
    /// # Errors
    /// Stops at and returns the first error of `on_block`.
    pub fn push<E>(
        &mut self,
        samples: &[f32],
        mut on_block: impl FnMut(&[f32]) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.block_size - self.buf.len()).min(rest.len());
            self.buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.buf.len() == self.block_size {
                let result = on_block(&self.buf);
                self.buf.clear();
                result?;
            }
        }
        Ok(())
    }

    /// Zero-pad and deliver a trailing partial block, if any.
    ///
    /// # Errors
    /// Returns the error of `on_block`.
    pub fn finish<E>(&mut self, on_block: impl FnOnce(&[f32]) -> Result<(), E>) -> Result<(), E> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.buf.resize(self.block_size, 0.0);
        let result = on_block(&self.buf);
        self.buf.clear();
        result
    }

    /// Samples waiting for the next block.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Block size in samples.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
