use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use isa::decoder::{Category, DecodeGraph, DecodePattern, Decoder, DecoderObserver, Dispatcher, Instruction, Isa};
use pretty_assertions::assert_eq;
use rand::{RngCore, SeedableRng, rngs::StdRng};

type Log = Rc<RefCell<Vec<(&'static str, Category)>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

impl DecoderObserver for Recorder {
    fn visit(&mut self, instruction: &Instruction) {
        self.log.borrow_mut().push((self.name, instruction.category));
    }
}

fn recorder(name: &'static str, log: &Log) -> Rc<RefCell<Recorder>> {
    Rc::new(RefCell::new(Recorder {
        name,
        log: Rc::clone(log),
    }))
}

fn random_words(seed: u64, count: usize) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.next_u32()).collect()
}

#[test]
fn classification_is_deterministic() {
    let shared = DecodeGraph::shared();
    let fresh = DecodeGraph::a64();
    for word in random_words(7, 10_000) {
        for isa in Isa::ALL {
            assert_eq!(shared.classify(word, isa), fresh.classify(word, isa), "{word:#010x} {isa}");
        }
    }
}

#[test]
fn graph_is_shared_across_threads() {
    let graph = DecodeGraph::shared();
    let words = Arc::new(random_words(11, 4_096));
    let expected: Vec<Category> = words.iter().map(|&w| graph.classify(w, Isa::C64)).collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            let words = Arc::clone(&words);
            thread::spawn(move || words.iter().map(|&w| graph.classify(w, Isa::C64)).collect::<Vec<_>>())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn custom_tables_drive_a_decoder() {
    let tables = &[DecodePattern {
        name: "Top",
        sampled_bits: &[31],
        mapping: &[("1", "MoveWide"), ("0", "Bitfield")],
    }];
    let graph = DecodeGraph::builder(tables).root(Isa::A64, "Top").build().unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let unhandled = Rc::new(RefCell::new(0));
    let dispatcher = {
        let seen = Rc::clone(&seen);
        let unhandled = Rc::clone(&unhandled);
        Dispatcher::new()
            .on(Category::MoveWide, move |instruction| seen.borrow_mut().push(instruction.offset))
            .on_unhandled(move |_| *unhandled.borrow_mut() += 1)
    };

    let mut decoder = Decoder::with_graph(Arc::new(graph));
    decoder.append_observer(Rc::new(RefCell::new(dispatcher)));
    for word in [0x8000_0000, 0x0000_0001, 0xFFFF_FFFF] {
        decoder.decode(word);
    }

    assert_eq!(*seen.borrow(), vec![0, 8]);
    assert_eq!(*unhandled.borrow(), 1);
}

#[test]
fn observers_run_in_registration_order() {
    let log = Log::default();
    let a = recorder("a", &log);
    let b = recorder("b", &log);
    let c = recorder("c", &log);

    let mut decoder = Decoder::new();
    decoder.append_observer(b.clone());
    decoder.prepend_observer(a.clone());
    decoder.insert_observer_after(c.clone(), &b);
    decoder.decode(0xD65F_03C0);

    decoder.remove_observer(&b);
    decoder.decode(0xD503_201F);

    assert_eq!(
        *log.borrow(),
        vec![
            ("a", Category::UnconditionalBranchRegister),
            ("b", Category::UnconditionalBranchRegister),
            ("c", Category::UnconditionalBranchRegister),
            ("a", Category::System),
            ("c", Category::System),
        ]
    );
}

#[test]
fn instruction_set_switches_apply_from_their_offset() {
    // blr [c1, #32] in the capability space, twice.
    let word: u32 = 0xC241_0021;
    let bytes: Vec<u8> = [word, word].iter().flat_map(|w| w.to_le_bytes()).collect();

    let log = Log::default();
    let mut decoder = Decoder::new();
    decoder.append_observer(recorder("r", &log));

    let switches = BTreeMap::from([(4, Isa::C64)]);
    assert_eq!(decoder.decode_range(&bytes, Some(&switches)), 2);
    assert_eq!(decoder.isa(), Isa::C64);
    assert_eq!(
        *log.borrow(),
        vec![("r", Category::Unallocated), ("r", Category::CapabilityBranchMemory)]
    );
}
