//! # Instruction Decoder
//!
//! Classifies instruction words with a compiled [`DecodeGraph`] and reports
//! each one to an ordered list of observers.
//!
//! ```text
//!   word ──▶ DecodeGraph::classify(word, isa) ──▶ Category
//!                                                    │
//!            Instruction { word, category, isa, offset }
//!                                                    │
//!            observer[0].visit ─▶ observer[1].visit ─▶ ...
//! ```
//!
//! ## Instruction-set switches
//!
//! The decoder keeps a sticky [`Isa`]. It changes through [`Decoder::set_isa`],
//! [`Decoder::decode_as`] or the switch map of [`Decoder::decode_range`], and
//! every change is forwarded to every observer before the next visit.
//!
//! ## Offsets
//!
//! The decoder is a stream: each decoded word advances its position by four
//! bytes, and [`Instruction::offset`] is the position the word was decoded
//! at. [`Decoder::set_position`] moves the stream.

#[allow(clippy::module_name_repetitions)]
pub mod a64_tables;
mod category;
#[allow(clippy::cast_possible_truncation)]
mod compiled;
#[allow(clippy::module_name_repetitions)]
mod graph;
#[allow(clippy::cast_possible_truncation)]
mod instruction;
mod node;
mod observer;
mod table;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

pub use category::{Category, Isa};
pub use compiled::{CompiledNode, NodeId, Sampler};
pub use graph::{DecodeGraph, DecodeGraphBuilder};
pub use instruction::Instruction;
pub use node::{DecodeNode, NodeKind, NodePattern, generate_mask_value_pair, generate_ordered_pattern};
pub use observer::{DecoderObserver, Dispatcher, SharedObserver};
pub use table::{DecodePattern, MAX_PATTERNS, MAX_SAMPLED_BITS, OTHERWISE, TableError};

use observer::same_observer;

pub struct Decoder {
    graph: Arc<DecodeGraph>,
    observers: Vec<SharedObserver>,
    isa: Isa,
    position: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// A decoder over the bootstrap A64/C64 graph, starting in A64.
    #[must_use]
    pub fn new() -> Self {
        Self::with_graph(DecodeGraph::shared())
    }

    #[must_use]
    pub const fn with_graph(graph: Arc<DecodeGraph>) -> Self {
        Self {
            graph,
            observers: Vec::new(),
            isa: Isa::A64,
            position: 0,
        }
    }

    #[must_use]
    pub const fn graph(&self) -> &Arc<DecodeGraph> {
        &self.graph
    }

    #[must_use]
    pub const fn isa(&self) -> Isa {
        self.isa
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    pub const fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Switches the sticky instruction set. Observers only hear about actual
    /// changes.
    pub fn set_isa(&mut self, isa: Isa) {
        if isa == self.isa {
            return;
        }
        tracing::debug!(from = %self.isa, to = %isa, "instruction set switched");
        self.isa = isa;
        for observer in &self.observers {
            observer.borrow_mut().set_isa(isa);
        }
    }

    /// Classifies `word` with the current instruction set and visits every
    /// observer in registration order.
    pub fn decode(&mut self, word: u32) -> Category {
        let category = self.graph.classify(word, self.isa);
        let instruction = Instruction::new(word, category, self.isa, self.position);
        self.position += 4;

        for observer in &self.observers {
            observer.borrow_mut().visit(&instruction);
        }
        category
    }

    /// Switches to `isa` (sticky) and decodes `word`.
    pub fn decode_as(&mut self, word: u32, isa: Isa) -> Category {
        self.set_isa(isa);
        self.decode(word)
    }

    /// Decodes little-endian words from `bytes`. `isa_switches` maps byte
    /// offsets, relative to the start of `bytes`, to the instruction set in
    /// effect from the first word starting at or after that offset.
    ///
    /// Returns the number of decoded words. Trailing bytes that do not form
    /// a whole word are skipped.
    pub fn decode_range(&mut self, bytes: &[u8], isa_switches: Option<&BTreeMap<usize, Isa>>) -> usize {
        let mut switches = isa_switches.into_iter().flatten().peekable();
        let mut chunks = bytes.chunks_exact(4);
        let mut count = 0;

        for (index, chunk) in chunks.by_ref().enumerate() {
            let offset = index * 4;
            while let Some((_, &isa)) = switches.next_if(|(at, _)| **at <= offset) {
                self.set_isa(isa);
            }
            self.decode(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            count += 1;
        }

        let trailing = chunks.remainder().len();
        if trailing != 0 {
            tracing::warn!(trailing, "ignoring bytes after the last whole instruction word");
        }
        count
    }

    /// Registers `observer` after every other one.
    pub fn append_observer(&mut self, observer: SharedObserver) {
        observer.borrow_mut().set_isa(self.isa);
        self.observers.push(observer);
    }

    /// Registers `observer` before every other one.
    pub fn prepend_observer(&mut self, observer: SharedObserver) {
        observer.borrow_mut().set_isa(self.isa);
        self.observers.insert(0, observer);
    }

    /// Registers `observer` right before the first occurrence of
    /// `registered`, or last if `registered` is not an observer.
    pub fn insert_observer_before<T: ?Sized>(&mut self, observer: SharedObserver, registered: &Rc<RefCell<T>>) {
        match self.find_observer(registered) {
            Some(index) => self.insert_at(index, observer),
            None => self.append_observer(observer),
        }
    }

    /// Registers `observer` right after the first occurrence of
    /// `registered`, or last if `registered` is not an observer.
    pub fn insert_observer_after<T: ?Sized>(&mut self, observer: SharedObserver, registered: &Rc<RefCell<T>>) {
        match self.find_observer(registered) {
            Some(index) => self.insert_at(index + 1, observer),
            None => self.append_observer(observer),
        }
    }

    /// Unregisters every occurrence of `observer`.
    pub fn remove_observer<T: ?Sized>(&mut self, observer: &Rc<RefCell<T>>) {
        self.observers.retain(|registered| !same_observer(registered, observer));
    }

    #[must_use]
    pub fn observers(&self) -> &[SharedObserver] {
        &self.observers
    }

    fn find_observer<T: ?Sized>(&self, observer: &Rc<RefCell<T>>) -> Option<usize> {
        self.observers
            .iter()
            .position(|registered| same_observer(registered, observer))
    }

    fn insert_at(&mut self, index: usize, observer: SharedObserver) {
        observer.borrow_mut().set_isa(self.isa);
        self.observers.insert(index, observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Appends its tag and every visited word to a shared log.
    struct Tagged {
        tag: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl DecoderObserver for Tagged {
        fn visit(&mut self, instruction: &Instruction) {
            self.log
                .borrow_mut()
                .push(format!("{}:{:#x}", self.tag, instruction.word));
        }

        fn set_isa(&mut self, isa: Isa) {
            self.log.borrow_mut().push(format!("{}:{isa}", self.tag));
        }
    }

    fn tagged(tag: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Rc<RefCell<Tagged>> {
        Rc::new(RefCell::new(Tagged {
            tag,
            log: Rc::clone(log),
        }))
    }

    #[test]
    fn observers_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = tagged("a", &log);
        let b = tagged("b", &log);

        let mut decoder = Decoder::new();
        decoder.append_observer(a.clone());
        decoder.append_observer(b.clone());
        decoder.append_observer(a.clone());
        log.borrow_mut().clear();

        decoder.decode(0xD503_201F);
        assert_eq!(*log.borrow(), vec!["a:0xd503201f", "b:0xd503201f", "a:0xd503201f"]);

        decoder.remove_observer(&a);
        assert_eq!(decoder.observers().len(), 1);
    }

    #[test]
    fn relative_insertion() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b, c, d) = (tagged("a", &log), tagged("b", &log), tagged("c", &log), tagged("d", &log));

        let mut decoder = Decoder::new();
        decoder.append_observer(a.clone());
        decoder.append_observer(b.clone());
        decoder.insert_observer_before(c.clone(), &b);
        decoder.insert_observer_after(d.clone(), &a);
        decoder.prepend_observer(b.clone());
        log.borrow_mut().clear();

        decoder.decode(0);
        assert_eq!(*log.borrow(), vec!["b:0x0", "a:0x0", "d:0x0", "c:0x0", "b:0x0"]);

        // Unknown anchors append.
        let e = tagged("e", &log);
        let stranger = tagged("stranger", &log);
        decoder.insert_observer_before(e, &stranger);
        assert_eq!(decoder.observers().len(), 6);
    }

    #[test]
    fn isa_switches_reach_observers_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut decoder = Decoder::new();
        decoder.append_observer(tagged("a", &log));
        assert_eq!(*log.borrow(), vec!["a:a64"]);

        decoder.set_isa(Isa::A64);
        assert_eq!(log.borrow().len(), 1);

        assert_eq!(decoder.decode_as(0xC240_0020, Isa::C64), Category::CapabilityBranchMemory);
        // Sticky.
        assert_eq!(decoder.decode(0xD61F_0020), Category::CapabilityBranchRegister);
        assert_eq!(
            *log.borrow(),
            vec!["a:a64", "a:c64", "a:0xc2400020", "a:0xd61f0020"]
        );
    }

    #[test]
    fn decodes_ranges_with_switches() {
        let words = [0xD61F_0020_u32, 0xD61F_0020, 0xD61F_0020];
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.push(0xAA);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let dispatcher = Dispatcher::new().on_unhandled(move |i| sink.borrow_mut().push((i.offset, i.category)));

        let mut decoder = Decoder::new();
        decoder.append_observer(Rc::new(RefCell::new(dispatcher)));

        let switches = BTreeMap::from([(4, Isa::C64), (8, Isa::A64)]);
        assert_eq!(decoder.decode_range(&bytes, Some(&switches)), 3);
        assert_eq!(
            *seen.borrow(),
            vec![
                (0, Category::UnconditionalBranchRegister),
                (4, Category::CapabilityBranchRegister),
                (8, Category::UnconditionalBranchRegister),
            ]
        );
        assert_eq!(decoder.position(), 12);
        assert_eq!(decoder.isa(), Isa::A64);
    }
}
